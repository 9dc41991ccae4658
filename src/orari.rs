/*!
Degree programs, cohorts, academic years, classrooms, courses and the
lessons that make up a timetable.
*/
use serde::{Deserialize, Serialize};
use time::Time;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CorsoLaurea {
    pub id: i64,
    pub nome: String,
}

/// A cohort within a degree program (students split by surname range, say).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Resto {
    pub id: i64,
    pub nome: String,
    pub corso_laurea: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnnoDidattico {
    pub id: i64,
    /// Label, like `"2023-2024"`.
    pub anno: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Aula {
    pub id: i64,
    pub edificio: String,
    pub nome: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Corso {
    pub id: i64,
    pub nome: String,
    pub corso_laurea: i64,
    pub anno_didattico: i64,
}

/// Teaching days, in weekday order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Giorno {
    Lunedi,
    Martedi,
    Mercoledi,
    Giovedi,
    Venerdi,
    Sabato,
}

impl std::fmt::Display for Giorno {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Giorno::Lunedi    => "Lunedi",
            Giorno::Martedi   => "Martedi",
            Giorno::Mercoledi => "Mercoledi",
            Giorno::Giovedi   => "Giovedi",
            Giorno::Venerdi   => "Venerdi",
            Giorno::Sabato    => "Sabato",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for Giorno {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Lunedi"    => Ok(Giorno::Lunedi),
            "Martedi"   => Ok(Giorno::Martedi),
            "Mercoledi" => Ok(Giorno::Mercoledi),
            "Giovedi"   => Ok(Giorno::Giovedi),
            "Venerdi"   => Ok(Giorno::Venerdi),
            "Sabato"    => Ok(Giorno::Sabato),
            _ => Err(format!("{:?} is not a valid Giorno.", s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Lezione {
    pub id: i64,
    pub semestre: i16,
    pub giorno: Giorno,
    pub ora_inizio: Time,
    pub ora_fine: Time,
    pub corso: i64,
    pub resto: i64,
    pub aula: i64,
}

/// Order lessons by day, then by start time.
pub fn sort_lezioni(lezioni: &mut [Lezione]) {
    lezioni.sort_by(|a, b|
        a.giorno.cmp(&b.giorno).then(a.ora_inizio.cmp(&b.ora_inizio))
    );
}

/// The `{id, nome}` shape the JSON query endpoints reply with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IdNome {
    pub id: i64,
    pub nome: String,
}

impl From<&Resto> for IdNome {
    fn from(r: &Resto) -> IdNome {
        IdNome { id: r.id, nome: r.nome.clone() }
    }
}

impl From<&AnnoDidattico> for IdNome {
    fn from(a: &AnnoDidattico) -> IdNome {
        IdNome { id: a.id, nome: a.anno.clone() }
    }
}

impl From<&Corso> for IdNome {
    fn from(c: &Corso) -> IdNome {
        IdNome { id: c.id, nome: c.nome.clone() }
    }
}
