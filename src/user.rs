/*!
Database users.

There are two disjoint kinds of user: technical/administrative staff
(`PersonaleTA`) and academic personnel (`Accademico`, which covers students,
lecturers and program coordinators). Both are looked up by email.
*/
use std::io::Read;

use serde::{Deserialize, Serialize};
use time::Date;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Tipo {
    Studente,
    Docente,
    Coordinatore,
}

impl std::fmt::Display for Tipo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Tipo::Studente     => "Studente",
            Tipo::Docente      => "Docente",
            Tipo::Coordinatore => "Coordinatore",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for Tipo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Studente"     => Ok(Tipo::Studente),
            "Docente"      => Ok(Tipo::Docente),
            "Coordinatore" => Ok(Tipo::Coordinatore),
            _ => Err(format!("{:?} is not a valid Tipo.", s)),
        }
    }
}

/// Technical/administrative staff member.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PersonaleTA {
    /// Assigned on database insertion.
    #[serde(default)]
    pub id: i64,
    pub nome: String,
    pub cognome: String,
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
}

/// Student, lecturer or coordinator.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Accademico {
    pub matricola: String,
    pub nome: String,
    pub cognome: String,
    #[serde(default)]
    pub data_nascita: Option<Date>,
    pub email: String,
    /// `None` until the account has had a password set.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub iscrizione: Option<Date>,
    pub tipo: Tipo,
    #[serde(default)]
    pub attivato: bool,
    /// Id of the degree program this user belongs to, if any.
    #[serde(default)]
    pub corso_laurea: Option<i64>,
    #[serde(default)]
    pub dipartimento: Option<String>,
}

fn blank_means_none(s: Option<&str>) -> Option<&str> {
    match s {
        Some(s) => match s.trim() {
            "" => None,
            x => Some(x),
        },
        None => None,
    }
}

impl Accademico {
    /**
    Accademico .csv rows should look like this

    ```csv
    #matricola, cognome, nome,  email,              tipo,     dipartimento
    0512100001, Rossi,   Mario, m.rossi@unisa.it,   Docente,  Informatica
    0512100002, Bianchi, Anna,  a.bianchi@unisa.it, Studente,
    ```

    Newly-read users are not activated and have no password.
    */
    pub fn from_csv_line(
        row: &csv::StringRecord
    ) -> Result<Accademico, String> {
        log::trace!("Accademico::from_csv_line( {:?} ) called.", row);

        let matricola = match blank_means_none(row.get(0)) {
            Some(s) => s.to_owned(),
            None => { return Err("no matricola".into()); },
        };
        let cognome = match blank_means_none(row.get(1)) {
            Some(s) => s.to_owned(),
            None => { return Err("no last name".into()); },
        };
        let nome = match blank_means_none(row.get(2)) {
            Some(s) => s.to_owned(),
            None => { return Err("no first name".into()); },
        };
        let email = match blank_means_none(row.get(3)) {
            Some(s) => s.to_owned(),
            None => { return Err("no email address".into()); },
        };
        let tipo: Tipo = match blank_means_none(row.get(4)) {
            Some(s) => s.parse()?,
            None => { return Err("no tipo".into()); },
        };
        let dipartimento = blank_means_none(row.get(5)).map(|s| s.to_owned());

        let acc = Accademico {
            matricola,
            nome,
            cognome,
            data_nascita: None,
            email,
            password: None,
            iscrizione: None,
            tipo,
            attivato: false,
            corso_laurea: None,
            dipartimento,
        };
        Ok(acc)
    }

    pub fn vec_from_csv_reader<R: Read>(r: R) -> Result<Vec<Accademico>, String> {
        log::trace!("Accademico::vec_from_csv_reader(...) called.");

        let mut csv_reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .flexible(true)
            .has_headers(false)
            .from_reader(r);

        let mut accademici: Vec<Accademico> = Vec::new();

        for (n, res) in csv_reader.records().enumerate() {
            let record = res.map_err(|e| match e.position() {
                Some(p) => format!("Error on line {}: {}", p.line(), &e),
                None => format!("Error in CSV record {}: {}", &n, &e),
            })?;

            match Accademico::from_csv_line(&record) {
                Ok(acc) => { accademici.push(acc); },
                Err(e) => {
                    let estr = match record.position() {
                        Some(p) => format!("Error on line {}: {}", p.line(), &e),
                        None => format!("Error in CSV record {}: {}", &n, &e),
                    };
                    return Err(estr);
                },
            }
        }

        log::trace!(
            "Accademico::vec_from_csv_reader() returns {} Accademici.",
            accademici.len()
        );
        Ok(accademici)
    }
}

/// A user of either kind.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Utente {
    PersonaleTA(PersonaleTA),
    Accademico(Accademico),
}

impl Utente {
    pub fn email(&self) -> &str {
        match self {
            Utente::PersonaleTA(p) => &p.email,
            Utente::Accademico(a) => &a.email,
        }
    }

    pub fn password(&self) -> Option<&str> {
        match self {
            Utente::PersonaleTA(p) => p.password.as_deref(),
            Utente::Accademico(a) => a.password.as_deref(),
        }
    }

    pub fn nome(&self) -> &str {
        match self {
            Utente::PersonaleTA(p) => &p.nome,
            Utente::Accademico(a) => &a.nome,
        }
    }

    pub fn cognome(&self) -> &str {
        match self {
            Utente::PersonaleTA(p) => &p.cognome,
            Utente::Accademico(a) => &a.cognome,
        }
    }

    /// Short label for the kind of user, suitable for display.
    pub fn kind(&self) -> String {
        match self {
            Utente::PersonaleTA(_) => "PersonaleTA".to_owned(),
            Utente::Accademico(a) => a.tipo.to_string(),
        }
    }

    pub fn is_personale_ta(&self) -> bool {
        matches!(self, Utente::PersonaleTA(_))
    }
}

impl From<PersonaleTA> for Utente {
    fn from(p: PersonaleTA) -> Utente { Utente::PersonaleTA(p) }
}

impl From<Accademico> for Utente {
    fn from(a: Accademico) -> Utente { Utente::Accademico(a) }
}
