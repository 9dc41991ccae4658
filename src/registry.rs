/*!
Account administration: creating, listing, activating and removing users.

The `Registry` trait is the raw data access; the free functions in this
module layer the bookkeeping rules (no duplicate emails or matricole, no
blank keys, no acting on users who don't exist) on top of it.
*/
use std::collections::HashSet;

use async_trait::async_trait;

use crate::store::{DbError, Store};
use crate::user::{Accademico, PersonaleTA};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{0}")]
    AlreadyExistentUser(String),
    #[error("{0}")]
    NotFoundUser(String),
    #[error("{0}")]
    IncorrectUserSpecification(String),
    #[error(transparent)]
    Store(#[from] DbError),
}

impl RegistryError {
    pub fn not_found() -> Self {
        RegistryError::NotFoundUser("Utente non trovato".to_owned())
    }

    /// Whether this is the caller's fault rather than the system's.
    pub fn is_rule_violation(&self) -> bool {
        !matches!(self, RegistryError::Store(_))
    }
}

#[async_trait]
pub trait Registry: Send + Sync {
    async fn accademici(&self) -> Result<Vec<Accademico>, DbError>;
    async fn accademici_by_attivazione(&self, attivato: bool) -> Result<Vec<Accademico>, DbError>;
    async fn accademico_by_matricola(&self, matricola: &str) -> Result<Option<Accademico>, DbError>;
    async fn accademico_by_email(&self, email: &str) -> Result<Option<Accademico>, DbError>;
    async fn insert_accademico(&self, a: &Accademico) -> Result<(), DbError>;
    async fn insert_accademici(&self, accademici: &[Accademico]) -> Result<usize, DbError>;
    async fn delete_accademico(&self, matricola: &str) -> Result<(), DbError>;
    async fn set_attivazione(&self, matricola: &str, attivato: bool) -> Result<(), DbError>;
    async fn personale(&self) -> Result<Vec<PersonaleTA>, DbError>;
    async fn personale_by_email(&self, email: &str) -> Result<Option<PersonaleTA>, DbError>;
    async fn insert_personale(&self, p: &PersonaleTA) -> Result<i64, DbError>;
    async fn delete_personale(&self, id: i64) -> Result<(), DbError>;
    /// Every academic email address.
    async fn emails(&self) -> Result<Vec<String>, DbError>;
}

#[async_trait]
impl Registry for Store {
    async fn accademici(&self) -> Result<Vec<Accademico>, DbError> {
        self.get_accademici().await
    }

    async fn accademici_by_attivazione(&self, attivato: bool) -> Result<Vec<Accademico>, DbError> {
        self.get_accademici_by_attivazione(attivato).await
    }

    async fn accademico_by_matricola(&self, matricola: &str) -> Result<Option<Accademico>, DbError> {
        self.get_accademico_by_matricola(matricola).await
    }

    async fn accademico_by_email(&self, email: &str) -> Result<Option<Accademico>, DbError> {
        self.get_accademico_by_email(email).await
    }

    async fn insert_accademico(&self, a: &Accademico) -> Result<(), DbError> {
        Store::insert_accademico(self, a).await
    }

    async fn insert_accademici(&self, accademici: &[Accademico]) -> Result<usize, DbError> {
        Store::insert_accademici(self, accademici).await
    }

    async fn delete_accademico(&self, matricola: &str) -> Result<(), DbError> {
        Store::delete_accademico(self, matricola).await
    }

    async fn set_attivazione(&self, matricola: &str, attivato: bool) -> Result<(), DbError> {
        Store::set_attivazione(self, matricola, attivato).await
    }

    async fn personale(&self) -> Result<Vec<PersonaleTA>, DbError> {
        self.get_personale().await
    }

    async fn personale_by_email(&self, email: &str) -> Result<Option<PersonaleTA>, DbError> {
        self.get_personale_by_email(email).await
    }

    async fn insert_personale(&self, p: &PersonaleTA) -> Result<i64, DbError> {
        Store::insert_personale(self, p).await
    }

    async fn delete_personale(&self, id: i64) -> Result<(), DbError> {
        Store::delete_personale(self, id).await
    }

    async fn emails(&self) -> Result<Vec<String>, DbError> {
        self.get_accademico_emails().await
    }
}

/// Fails if `email` belongs to anyone, staff or academic.
async fn ensure_email_free(reg: &dyn Registry, email: &str) -> Result<(), RegistryError> {
    if reg.personale_by_email(email).await?.is_some()
        || reg.accademico_by_email(email).await?.is_some()
    {
        return Err(RegistryError::AlreadyExistentUser(
            format!("L'email {} è già in uso.", email)
        ));
    }
    Ok(())
}

fn check_accademico_fields(a: &Accademico) -> Result<(), RegistryError> {
    if a.matricola.trim().is_empty() {
        return Err(RegistryError::IncorrectUserSpecification(
            "Matricola mancante.".to_owned()
        ));
    }
    if a.email.trim().is_empty() {
        return Err(RegistryError::IncorrectUserSpecification(
            format!("Email mancante per la matricola {}.", &a.matricola)
        ));
    }
    Ok(())
}

pub async fn register_accademico(reg: &dyn Registry, a: &Accademico) -> Result<(), RegistryError> {
    log::trace!("register_accademico( {:?} ) called.", &a.matricola);

    check_accademico_fields(a)?;
    if reg.accademico_by_matricola(&a.matricola).await?.is_some() {
        return Err(RegistryError::AlreadyExistentUser(
            format!("La matricola {} è già in uso.", &a.matricola)
        ));
    }
    ensure_email_free(reg, &a.email).await?;

    reg.insert_accademico(a).await?;
    log::info!("Registered Accademico {} ({}).", &a.matricola, &a.email);
    Ok(())
}

/**
Register a whole batch of academics; if any one of them can't be added,
none of them are.

Returns the number inserted.
*/
pub async fn register_accademici(
    reg: &dyn Registry,
    accademici: &[Accademico],
) -> Result<usize, RegistryError> {
    log::trace!("register_accademici( [ {} Accademici ] ) called.", accademici.len());

    let mut matricole: HashSet<&str> = HashSet::with_capacity(accademici.len());
    let mut emails: HashSet<&str> = HashSet::with_capacity(accademici.len());
    for a in accademici.iter() {
        check_accademico_fields(a)?;
        if !matricole.insert(a.matricola.as_str()) {
            return Err(RegistryError::AlreadyExistentUser(
                format!("La matricola {} compare più volte.", &a.matricola)
            ));
        }
        if !emails.insert(a.email.as_str()) {
            return Err(RegistryError::AlreadyExistentUser(
                format!("L'email {} compare più volte.", &a.email)
            ));
        }
        if reg.accademico_by_matricola(&a.matricola).await?.is_some() {
            return Err(RegistryError::AlreadyExistentUser(
                format!("La matricola {} è già in uso.", &a.matricola)
            ));
        }
        ensure_email_free(reg, &a.email).await?;
    }

    let n = reg.insert_accademici(accademici).await?;
    log::info!("Registered {} Accademici.", &n);
    Ok(n)
}

pub async fn register_personale(reg: &dyn Registry, p: &PersonaleTA) -> Result<i64, RegistryError> {
    log::trace!("register_personale( {:?} ) called.", &p.email);

    if p.email.trim().is_empty() {
        return Err(RegistryError::IncorrectUserSpecification(
            "Email mancante.".to_owned()
        ));
    }
    ensure_email_free(reg, &p.email).await?;

    let id = reg.insert_personale(p).await?;
    log::info!("Registered PersonaleTA {} with id {}.", &p.email, &id);
    Ok(id)
}

pub async fn remove_accademico(reg: &dyn Registry, matricola: &str) -> Result<(), RegistryError> {
    log::trace!("remove_accademico( {:?} ) called.", matricola);

    if reg.accademico_by_matricola(matricola).await?.is_none() {
        return Err(RegistryError::not_found());
    }
    reg.delete_accademico(matricola).await?;
    Ok(())
}

pub async fn remove_personale(reg: &dyn Registry, id: i64) -> Result<(), RegistryError> {
    log::trace!("remove_personale( {} ) called.", &id);

    if !reg.personale().await?.iter().any(|p| p.id == id) {
        return Err(RegistryError::not_found());
    }
    reg.delete_personale(id).await?;
    Ok(())
}

pub async fn change_activation(
    reg: &dyn Registry,
    matricola: &str,
    attivato: bool,
) -> Result<(), RegistryError> {
    log::trace!("change_activation( {:?}, {} ) called.", matricola, &attivato);

    if reg.accademico_by_matricola(matricola).await?.is_none() {
        return Err(RegistryError::not_found());
    }
    reg.set_attivazione(matricola, attivato).await?;
    Ok(())
}

/// See `Accademico::from_csv_line()` for the expected row format.
pub fn parse_accademici_csv(text: &str) -> Result<Vec<Accademico>, RegistryError> {
    Accademico::vec_from_csv_reader(text.as_bytes())
        .map_err(RegistryError::IncorrectUserSpecification)
}
