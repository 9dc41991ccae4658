/*!
In-memory stand-ins for the database-backed traits, so the service and
handler logic can be tested without a Postgres instance.
*/
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::macros::time;

use crate::auth::{IdentityLookup, LookupError};
use crate::catalog::Catalog;
use crate::loader::OrariWriter;
use crate::orari::*;
use crate::registry::Registry;
use crate::store::DbError;
use crate::user::*;

pub fn personale(email: &str, password: Option<&str>) -> PersonaleTA {
    PersonaleTA {
        id: 0,
        nome: "Anna".to_owned(),
        cognome: "Neri".to_owned(),
        email: email.to_owned(),
        password: password.map(|s| s.to_owned()),
        telefono: None,
    }
}

pub fn accademico(
    matricola: &str,
    email: &str,
    password: Option<&str>,
    attivato: bool,
    tipo: Tipo,
) -> Accademico {
    Accademico {
        matricola: matricola.to_owned(),
        nome: "Mario".to_owned(),
        cognome: "Rossi".to_owned(),
        data_nascita: None,
        email: email.to_owned(),
        password: password.map(|s| s.to_owned()),
        iscrizione: None,
        tipo,
        attivato,
        corso_laurea: None,
        dipartimento: None,
    }
}

enum Behavior {
    Staff(Vec<PersonaleTA>),
    Academic(Vec<Accademico>),
    NoRow,
    Broken,
}

/// An `IdentityLookup` that counts how many times it's been asked.
pub struct FakeLookup {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl FakeLookup {
    fn with(behavior: Behavior) -> Self {
        Self { behavior, calls: AtomicUsize::new(0) }
    }

    pub fn staff(users: Vec<PersonaleTA>) -> Self { Self::with(Behavior::Staff(users)) }
    pub fn academic(users: Vec<Accademico>) -> Self { Self::with(Behavior::Academic(users)) }
    /// Answers every query with `LookupError::NoRow`.
    pub fn no_row() -> Self { Self::with(Behavior::NoRow) }
    /// Answers every query with a store error.
    pub fn broken() -> Self { Self::with(Behavior::Broken) }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl IdentityLookup for FakeLookup {
    fn name(&self) -> &'static str {
        match self.behavior {
            Behavior::Staff(_) => "fake staff",
            Behavior::Academic(_) => "fake academic",
            Behavior::NoRow => "fake no-row",
            Behavior::Broken => "fake broken",
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Utente>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Staff(v) => Ok(v.iter()
                .find(|p| p.email == email)
                .map(|p| p.clone().into())),
            Behavior::Academic(v) => Ok(v.iter()
                .find(|a| a.email == email)
                .map(|a| a.clone().into())),
            Behavior::NoRow => Err(LookupError::NoRow),
            Behavior::Broken => Err(DbError::from("connection refused".to_owned()).into()),
        }
    }

    async fn find_by_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Utente>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Staff(v) => Ok(v.iter()
                .find(|p| p.email == email && p.password.as_deref() == Some(password))
                .map(|p| p.clone().into())),
            Behavior::Academic(v) => Ok(v.iter()
                .find(|a| a.email == email)
                .filter(|a| match a.password.as_deref() {
                    None => true,
                    Some(p) => p == password,
                })
                .map(|a| a.clone().into())),
            Behavior::NoRow => Err(LookupError::NoRow),
            Behavior::Broken => Err(DbError::from("connection refused".to_owned()).into()),
        }
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub corsi_laurea: Vec<CorsoLaurea>,
    pub resti: Vec<Resto>,
    pub anni: Vec<AnnoDidattico>,
    /// `(anno, corso_laurea)` pairs.
    pub anni_corsi_laurea: Vec<(i64, i64)>,
    pub aule: Vec<Aula>,
    pub corsi: Vec<Corso>,
    pub lezioni: Vec<Lezione>,
}

impl FakeCatalog {
    /**
    Two programs. Informatica has cohort "Resto 0", year "2023-2024", one
    course and three lessons for that cohort (out of order) plus one for
    another cohort. Matematica has cohort "Resto M" and nothing else.
    */
    pub fn sample() -> Self {
        let lezione = |id, giorno, ora_inizio, resto| Lezione {
            id,
            semestre: 1,
            giorno,
            ora_inizio,
            ora_fine: ora_inizio,
            corso: 1,
            resto,
            aula: 1,
        };

        FakeCatalog {
            corsi_laurea: vec![
                CorsoLaurea { id: 1, nome: "Informatica".to_owned() },
                CorsoLaurea { id: 2, nome: "Matematica".to_owned() },
            ],
            resti: vec![
                Resto { id: 1, nome: "Resto 0".to_owned(), corso_laurea: 1 },
                Resto { id: 2, nome: "Resto 1".to_owned(), corso_laurea: 1 },
                Resto { id: 3, nome: "Resto M".to_owned(), corso_laurea: 2 },
            ],
            anni: vec![
                AnnoDidattico { id: 1, anno: "2023-2024".to_owned() },
            ],
            anni_corsi_laurea: vec![(1, 1)],
            aule: vec![
                Aula { id: 1, edificio: "F3".to_owned(), nome: "P4".to_owned() },
                Aula { id: 2, edificio: "F3".to_owned(), nome: "P3".to_owned() },
                Aula { id: 3, edificio: "F2".to_owned(), nome: "F".to_owned() },
            ],
            corsi: vec![
                Corso { id: 1, nome: "Basi di Dati".to_owned(), corso_laurea: 1, anno_didattico: 1 },
            ],
            lezioni: vec![
                lezione(1, Giorno::Mercoledi, time!(9:00), 1),
                lezione(2, Giorno::Lunedi, time!(14:00), 1),
                lezione(3, Giorno::Lunedi, time!(9:00), 1),
                lezione(4, Giorno::Lunedi, time!(8:00), 2),
            ],
        }
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn corsi_laurea(&self) -> Result<Vec<CorsoLaurea>, DbError> {
        Ok(self.corsi_laurea.clone())
    }

    async fn corso_laurea_by_nome(&self, nome: &str) -> Result<Option<CorsoLaurea>, DbError> {
        Ok(self.corsi_laurea.iter().find(|c| c.nome == nome).cloned())
    }

    async fn resti_by_corso_laurea(&self, corso_laurea: i64) -> Result<Vec<Resto>, DbError> {
        Ok(self.resti.iter().filter(|r| r.corso_laurea == corso_laurea).cloned().collect())
    }

    async fn resto_by_nome(&self, nome: &str, corso_laurea: i64) -> Result<Option<Resto>, DbError> {
        Ok(self.resti.iter()
            .find(|r| r.nome == nome && r.corso_laurea == corso_laurea)
            .cloned())
    }

    async fn anni_by_corso_laurea(&self, corso_laurea: i64) -> Result<Vec<AnnoDidattico>, DbError> {
        Ok(self.anni.iter()
            .filter(|a| self.anni_corsi_laurea.contains(&(a.id, corso_laurea)))
            .cloned()
            .collect())
    }

    async fn anno_by_corso_laurea_nome(
        &self,
        corso_laurea: i64,
        anno: &str,
    ) -> Result<Option<AnnoDidattico>, DbError> {
        Ok(self.anni.iter()
            .find(|a| a.anno == anno && self.anni_corsi_laurea.contains(&(a.id, corso_laurea)))
            .cloned())
    }

    async fn lezioni(&self, corso_laurea: i64, resto: i64, anno: i64) -> Result<Vec<Lezione>, DbError> {
        Ok(self.lezioni.iter()
            .filter(|l| l.resto == resto)
            .filter(|l| self.corsi.iter().any(|c|
                c.id == l.corso && c.corso_laurea == corso_laurea && c.anno_didattico == anno
            ))
            .cloned()
            .collect())
    }

    async fn corsi_by_corso_laurea(&self, corso_laurea: i64) -> Result<Vec<Corso>, DbError> {
        Ok(self.corsi.iter().filter(|c| c.corso_laurea == corso_laurea).cloned().collect())
    }

    async fn aule(&self) -> Result<Vec<Aula>, DbError> {
        Ok(self.aule.clone())
    }

    async fn aule_by_edificio(&self, edificio: &str) -> Result<Vec<Aula>, DbError> {
        Ok(self.aule.iter().filter(|a| a.edificio == edificio).cloned().collect())
    }

    async fn edifici(&self) -> Result<Vec<String>, DbError> {
        let mut edifici: Vec<String> = self.aule.iter().map(|a| a.edificio.clone()).collect();
        edifici.sort();
        edifici.dedup();
        Ok(edifici)
    }
}

/// Records timetable inserts into a `FakeCatalog`, handing out ids from 1.
#[derive(Default)]
pub struct FakeWriter {
    catalog: Mutex<FakeCatalog>,
    writes: AtomicUsize,
}

impl FakeWriter {
    fn lock(&self) -> std::sync::MutexGuard<'_, FakeCatalog> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.catalog.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of insert calls made.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn into_catalog(self) -> FakeCatalog {
        self.catalog.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl OrariWriter for FakeWriter {
    async fn insert_corso_laurea(&self, nome: &str) -> Result<i64, DbError> {
        let mut cat = self.lock();
        let id = cat.corsi_laurea.len() as i64 + 1;
        cat.corsi_laurea.push(CorsoLaurea { id, nome: nome.to_owned() });
        Ok(id)
    }

    async fn insert_resto(&self, nome: &str, corso_laurea: i64) -> Result<i64, DbError> {
        let mut cat = self.lock();
        let id = cat.resti.len() as i64 + 1;
        cat.resti.push(Resto { id, nome: nome.to_owned(), corso_laurea });
        Ok(id)
    }

    async fn insert_anno(&self, anno: &str, corso_laurea: i64) -> Result<i64, DbError> {
        let mut cat = self.lock();
        let id = match cat.anni.iter().find(|a| a.anno == anno) {
            Some(a) => a.id,
            None => {
                let id = cat.anni.len() as i64 + 1;
                cat.anni.push(AnnoDidattico { id, anno: anno.to_owned() });
                id
            },
        };
        if !cat.anni_corsi_laurea.contains(&(id, corso_laurea)) {
            cat.anni_corsi_laurea.push((id, corso_laurea));
        }
        Ok(id)
    }

    async fn insert_aula(&self, edificio: &str, nome: &str) -> Result<i64, DbError> {
        let mut cat = self.lock();
        let id = cat.aule.len() as i64 + 1;
        cat.aule.push(Aula { id, edificio: edificio.to_owned(), nome: nome.to_owned() });
        Ok(id)
    }

    async fn insert_corso(&self, nome: &str, corso_laurea: i64, anno_didattico: i64) -> Result<i64, DbError> {
        let mut cat = self.lock();
        let id = cat.corsi.len() as i64 + 1;
        cat.corsi.push(Corso { id, nome: nome.to_owned(), corso_laurea, anno_didattico });
        Ok(id)
    }

    async fn insert_lezione(&self, lez: &Lezione) -> Result<i64, DbError> {
        let mut cat = self.lock();
        let id = cat.lezioni.len() as i64 + 1;
        cat.lezioni.push(Lezione { id, ..lez.clone() });
        Ok(id)
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    accademici: Mutex<Vec<Accademico>>,
    personale: Mutex<Vec<PersonaleTA>>,
}

impl FakeRegistry {
    pub fn with_personale(users: Vec<PersonaleTA>) -> Self {
        let reg = FakeRegistry::default();
        for (n, mut p) in users.into_iter().enumerate() {
            p.id = n as i64 + 1;
            reg.lock_personale().push(p);
        }
        reg
    }

    fn lock_accademici(&self) -> std::sync::MutexGuard<'_, Vec<Accademico>> {
        self.accademici.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_personale(&self) -> std::sync::MutexGuard<'_, Vec<PersonaleTA>> {
        self.personale.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn accademici(&self) -> Result<Vec<Accademico>, DbError> {
        Ok(self.lock_accademici().clone())
    }

    async fn accademici_by_attivazione(&self, attivato: bool) -> Result<Vec<Accademico>, DbError> {
        Ok(self.lock_accademici().iter().filter(|a| a.attivato == attivato).cloned().collect())
    }

    async fn accademico_by_matricola(&self, matricola: &str) -> Result<Option<Accademico>, DbError> {
        Ok(self.lock_accademici().iter().find(|a| a.matricola == matricola).cloned())
    }

    async fn accademico_by_email(&self, email: &str) -> Result<Option<Accademico>, DbError> {
        Ok(self.lock_accademici().iter().find(|a| a.email == email).cloned())
    }

    async fn insert_accademico(&self, a: &Accademico) -> Result<(), DbError> {
        self.lock_accademici().push(a.clone());
        Ok(())
    }

    async fn insert_accademici(&self, accademici: &[Accademico]) -> Result<usize, DbError> {
        self.lock_accademici().extend_from_slice(accademici);
        Ok(accademici.len())
    }

    async fn delete_accademico(&self, matricola: &str) -> Result<(), DbError> {
        self.lock_accademici().retain(|a| a.matricola != matricola);
        Ok(())
    }

    async fn set_attivazione(&self, matricola: &str, attivato: bool) -> Result<(), DbError> {
        for a in self.lock_accademici().iter_mut().filter(|a| a.matricola == matricola) {
            a.attivato = attivato;
        }
        Ok(())
    }

    async fn personale(&self) -> Result<Vec<PersonaleTA>, DbError> {
        Ok(self.lock_personale().clone())
    }

    async fn personale_by_email(&self, email: &str) -> Result<Option<PersonaleTA>, DbError> {
        Ok(self.lock_personale().iter().find(|p| p.email == email).cloned())
    }

    async fn insert_personale(&self, p: &PersonaleTA) -> Result<i64, DbError> {
        let mut personale = self.lock_personale();
        let id = personale.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let mut p = p.clone();
        p.id = id;
        personale.push(p);
        Ok(id)
    }

    async fn delete_personale(&self, id: i64) -> Result<(), DbError> {
        self.lock_personale().retain(|p| p.id != id);
        Ok(())
    }

    async fn emails(&self) -> Result<Vec<String>, DbError> {
        Ok(self.lock_accademici().iter().map(|a| a.email.clone()).collect())
    }
}
