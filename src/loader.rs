/*!
Loading timetable data from a TOML file.

The web interface never writes programs, cohorts, rooms, courses or
lessons; they come in through `popdb orari`. Everything is referred to
by name in the file:

```toml
[[corsi_laurea]]
nome = "Informatica"
resti = ["Resto 0", "Resto 1"]
anni = ["2023-2024"]

[[aule]]
edificio = "F3"
nome = "P4"

[[corsi]]
nome = "Basi di Dati"
corso_laurea = "Informatica"
anno = "2023-2024"

[[lezioni]]
corso_laurea = "Informatica"
corso = "Basi di Dati"
resto = "Resto 0"
semestre = 1
giorno = "Lunedi"
ora_inizio = "09:00"
ora_fine = "11:00"
edificio = "F3"
aula = "P4"
```

The whole file is checked before anything is written.
*/
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::Deserialize;
use time::{macros::format_description, Time};

use crate::orari::{Giorno, Lezione};
use crate::store::{DbError, Store};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] DbError),
}

#[derive(Debug, Deserialize)]
pub struct CorsoLaureaEntry {
    pub nome: String,
    #[serde(default)]
    pub resti: Vec<String>,
    #[serde(default)]
    pub anni: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AulaEntry {
    pub edificio: String,
    pub nome: String,
}

#[derive(Debug, Deserialize)]
pub struct CorsoEntry {
    pub nome: String,
    pub corso_laurea: String,
    pub anno: String,
}

#[derive(Debug, Deserialize)]
pub struct LezioneEntry {
    pub corso_laurea: String,
    pub corso: String,
    pub resto: String,
    pub semestre: i16,
    pub giorno: Giorno,
    /// `"HH:MM"`
    pub ora_inizio: String,
    pub ora_fine: String,
    pub edificio: String,
    pub aula: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrariFile {
    #[serde(default)]
    pub corsi_laurea: Vec<CorsoLaureaEntry>,
    #[serde(default)]
    pub aule: Vec<AulaEntry>,
    #[serde(default)]
    pub corsi: Vec<CorsoEntry>,
    #[serde(default)]
    pub lezioni: Vec<LezioneEntry>,
}

impl OrariFile {
    pub fn from_toml(text: &str) -> Result<Self, LoadError> {
        toml::from_str(text)
            .map_err(|e| LoadError::Invalid(format!("Unable to deserialize timetable file: {}", &e)))
    }
}

/// How many of each thing `load_orari()` inserted.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub corsi_laurea: usize,
    pub resti: usize,
    pub anni: usize,
    pub aule: usize,
    pub corsi: usize,
    pub lezioni: usize,
}

impl std::fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f, "{} corsi di laurea, {} resti, {} anni, {} aule, {} corsi, {} lezioni",
            &self.corsi_laurea, &self.resti, &self.anni,
            &self.aule, &self.corsi, &self.lezioni
        )
    }
}

/// The inserts a timetable load needs. Each returns the new row's id.
#[async_trait]
pub trait OrariWriter: Send + Sync {
    async fn insert_corso_laurea(&self, nome: &str) -> Result<i64, DbError>;
    async fn insert_resto(&self, nome: &str, corso_laurea: i64) -> Result<i64, DbError>;
    /// A label already present is reused and linked to `corso_laurea`.
    async fn insert_anno(&self, anno: &str, corso_laurea: i64) -> Result<i64, DbError>;
    async fn insert_aula(&self, edificio: &str, nome: &str) -> Result<i64, DbError>;
    async fn insert_corso(&self, nome: &str, corso_laurea: i64, anno_didattico: i64) -> Result<i64, DbError>;
    async fn insert_lezione(&self, lez: &Lezione) -> Result<i64, DbError>;
}

#[async_trait]
impl OrariWriter for Store {
    async fn insert_corso_laurea(&self, nome: &str) -> Result<i64, DbError> {
        Store::insert_corso_laurea(self, nome).await
    }

    async fn insert_resto(&self, nome: &str, corso_laurea: i64) -> Result<i64, DbError> {
        Store::insert_resto(self, nome, corso_laurea).await
    }

    async fn insert_anno(&self, anno: &str, corso_laurea: i64) -> Result<i64, DbError> {
        Store::insert_anno(self, anno, corso_laurea).await
    }

    async fn insert_aula(&self, edificio: &str, nome: &str) -> Result<i64, DbError> {
        Store::insert_aula(self, edificio, nome).await
    }

    async fn insert_corso(&self, nome: &str, corso_laurea: i64, anno_didattico: i64) -> Result<i64, DbError> {
        Store::insert_corso(self, nome, corso_laurea, anno_didattico).await
    }

    async fn insert_lezione(&self, lez: &Lezione) -> Result<i64, DbError> {
        Store::insert_lezione(self, lez).await
    }
}

fn invalid(msg: String) -> LoadError { LoadError::Invalid(msg) }

fn parse_ora(s: &str) -> Result<Time, LoadError> {
    Time::parse(s.trim(), format_description!("[hour]:[minute]"))
        .map_err(|e| invalid(format!("{:?} is not a valid HH:MM time: {}", s, &e)))
}

fn non_blank(s: &str, what: &str) -> Result<(), LoadError> {
    if s.trim().is_empty() {
        return Err(invalid(format!("Blank {}.", what)));
    }
    Ok(())
}

/// Resolves the names in `f`, returning each lesson's start and end times.
fn check(f: &OrariFile) -> Result<Vec<(Time, Time)>, LoadError> {
    let mut resti: HashSet<(&str, &str)> = HashSet::new();
    let mut anni: HashSet<(&str, &str)> = HashSet::new();
    let mut programs: HashSet<&str> = HashSet::new();
    for cl in f.corsi_laurea.iter() {
        non_blank(&cl.nome, "corso di laurea name")?;
        if !programs.insert(cl.nome.as_str()) {
            return Err(invalid(format!("Corso di laurea {:?} appears more than once.", &cl.nome)));
        }
        for r in cl.resti.iter() {
            non_blank(r, "resto name")?;
            if !resti.insert((cl.nome.as_str(), r.as_str())) {
                return Err(invalid(format!("Resto {:?} appears more than once in {}.", r, &cl.nome)));
            }
        }
        for a in cl.anni.iter() {
            non_blank(a, "anno label")?;
            anni.insert((cl.nome.as_str(), a.as_str()));
        }
    }

    let mut aule: HashSet<(&str, &str)> = HashSet::new();
    for a in f.aule.iter() {
        non_blank(&a.edificio, "edificio")?;
        non_blank(&a.nome, "aula name")?;
        if !aule.insert((a.edificio.as_str(), a.nome.as_str())) {
            return Err(invalid(format!("Aula {} {} appears more than once.", &a.edificio, &a.nome)));
        }
    }

    let mut corsi: HashSet<(&str, &str)> = HashSet::new();
    for c in f.corsi.iter() {
        non_blank(&c.nome, "corso name")?;
        if !anni.contains(&(c.corso_laurea.as_str(), c.anno.as_str())) {
            return Err(invalid(format!(
                "Corso {:?}: no anno {:?} in corso di laurea {:?}.",
                &c.nome, &c.anno, &c.corso_laurea
            )));
        }
        if !corsi.insert((c.corso_laurea.as_str(), c.nome.as_str())) {
            return Err(invalid(format!(
                "Corso {:?} appears more than once in {}.", &c.nome, &c.corso_laurea
            )));
        }
    }

    let mut ore: Vec<(Time, Time)> = Vec::with_capacity(f.lezioni.len());
    for (n, l) in f.lezioni.iter().enumerate() {
        let cl = l.corso_laurea.as_str();
        if !corsi.contains(&(cl, l.corso.as_str())) {
            return Err(invalid(format!("Lezione {}: no corso {:?} in {:?}.", n + 1, &l.corso, cl)));
        }
        if !resti.contains(&(cl, l.resto.as_str())) {
            return Err(invalid(format!("Lezione {}: no resto {:?} in {:?}.", n + 1, &l.resto, cl)));
        }
        if !aule.contains(&(l.edificio.as_str(), l.aula.as_str())) {
            return Err(invalid(format!(
                "Lezione {}: no aula {:?} in edificio {:?}.", n + 1, &l.aula, &l.edificio
            )));
        }
        if l.semestre < 1 {
            return Err(invalid(format!("Lezione {}: bad semestre {}.", n + 1, &l.semestre)));
        }
        let inizio = parse_ora(&l.ora_inizio)?;
        let fine = parse_ora(&l.ora_fine)?;
        if fine <= inizio {
            return Err(invalid(format!(
                "Lezione {}: ends ({}) no later than it starts ({}).",
                n + 1, &l.ora_fine, &l.ora_inizio
            )));
        }
        ore.push((inizio, fine));
    }

    Ok(ore)
}

fn id_of(ids: &HashMap<(&str, &str), i64>, key: (&str, &str)) -> Result<i64, LoadError> {
    ids.get(&key).copied()
        .ok_or_else(|| invalid(format!("Nothing inserted for {:?}.", &key)))
}

/**
Insert everything in `f`.

Nothing is written if any name fails to resolve or any time is malformed.
A store error partway through leaves whatever was already inserted.
*/
pub async fn load_orari(w: &dyn OrariWriter, f: &OrariFile) -> Result<LoadSummary, LoadError> {
    log::trace!(
        "load_orari( [ {} corsi di laurea, {} lezioni ] ) called.",
        f.corsi_laurea.len(), f.lezioni.len()
    );

    let ore = check(f)?;
    let mut summary = LoadSummary::default();

    let mut programs: HashMap<&str, i64> = HashMap::new();
    let mut resti: HashMap<(&str, &str), i64> = HashMap::new();
    let mut anni: HashMap<(&str, &str), i64> = HashMap::new();
    for cl in f.corsi_laurea.iter() {
        let cl_id = w.insert_corso_laurea(&cl.nome).await?;
        programs.insert(cl.nome.as_str(), cl_id);
        summary.corsi_laurea += 1;

        for r in cl.resti.iter() {
            resti.insert((cl.nome.as_str(), r.as_str()), w.insert_resto(r, cl_id).await?);
            summary.resti += 1;
        }
        for a in cl.anni.iter() {
            if anni.contains_key(&(cl.nome.as_str(), a.as_str())) {
                continue;
            }
            anni.insert((cl.nome.as_str(), a.as_str()), w.insert_anno(a, cl_id).await?);
            summary.anni += 1;
        }
    }

    let mut aule: HashMap<(&str, &str), i64> = HashMap::new();
    for a in f.aule.iter() {
        aule.insert((a.edificio.as_str(), a.nome.as_str()), w.insert_aula(&a.edificio, &a.nome).await?);
        summary.aule += 1;
    }

    let mut corsi: HashMap<(&str, &str), i64> = HashMap::new();
    for c in f.corsi.iter() {
        let cl_id = programs.get(c.corso_laurea.as_str()).copied()
            .ok_or_else(|| invalid(format!("Nothing inserted for {:?}.", &c.corso_laurea)))?;
        let anno_id = id_of(&anni, (c.corso_laurea.as_str(), c.anno.as_str()))?;
        corsi.insert((c.corso_laurea.as_str(), c.nome.as_str()), w.insert_corso(&c.nome, cl_id, anno_id).await?);
        summary.corsi += 1;
    }

    for (l, (ora_inizio, ora_fine)) in f.lezioni.iter().zip(ore.into_iter()) {
        let lez = Lezione {
            id: 0,
            semestre: l.semestre,
            giorno: l.giorno,
            ora_inizio,
            ora_fine,
            corso: id_of(&corsi, (l.corso_laurea.as_str(), l.corso.as_str()))?,
            resto: id_of(&resti, (l.corso_laurea.as_str(), l.resto.as_str()))?,
            aula: id_of(&aule, (l.edificio.as_str(), l.aula.as_str()))?,
        };
        w.insert_lezione(&lez).await?;
        summary.lezioni += 1;
    }

    log::info!("Loaded {}.", &summary);
    Ok(summary)
}
