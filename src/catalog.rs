/*!
Read-only timetable queries, as used by the browsing side of the web
interface.
*/
use async_trait::async_trait;

use crate::orari::*;
use crate::store::{DbError, Store};

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn corsi_laurea(&self) -> Result<Vec<CorsoLaurea>, DbError>;
    async fn corso_laurea_by_nome(&self, nome: &str) -> Result<Option<CorsoLaurea>, DbError>;
    async fn resti_by_corso_laurea(&self, corso_laurea: i64) -> Result<Vec<Resto>, DbError>;
    async fn resto_by_nome(&self, nome: &str, corso_laurea: i64) -> Result<Option<Resto>, DbError>;
    async fn anni_by_corso_laurea(&self, corso_laurea: i64) -> Result<Vec<AnnoDidattico>, DbError>;
    async fn anno_by_corso_laurea_nome(
        &self,
        corso_laurea: i64,
        anno: &str,
    ) -> Result<Option<AnnoDidattico>, DbError>;
    async fn lezioni(&self, corso_laurea: i64, resto: i64, anno: i64) -> Result<Vec<Lezione>, DbError>;
    async fn corsi_by_corso_laurea(&self, corso_laurea: i64) -> Result<Vec<Corso>, DbError>;
    async fn aule(&self) -> Result<Vec<Aula>, DbError>;
    async fn aule_by_edificio(&self, edificio: &str) -> Result<Vec<Aula>, DbError>;
    async fn edifici(&self) -> Result<Vec<String>, DbError>;
}

#[async_trait]
impl Catalog for Store {
    async fn corsi_laurea(&self) -> Result<Vec<CorsoLaurea>, DbError> {
        self.get_corsi_laurea().await
    }

    async fn corso_laurea_by_nome(&self, nome: &str) -> Result<Option<CorsoLaurea>, DbError> {
        self.get_corso_laurea_by_nome(nome).await
    }

    async fn resti_by_corso_laurea(&self, corso_laurea: i64) -> Result<Vec<Resto>, DbError> {
        self.get_resti_by_corso_laurea(corso_laurea).await
    }

    async fn resto_by_nome(&self, nome: &str, corso_laurea: i64) -> Result<Option<Resto>, DbError> {
        self.get_resto_by_nome(nome, corso_laurea).await
    }

    async fn anni_by_corso_laurea(&self, corso_laurea: i64) -> Result<Vec<AnnoDidattico>, DbError> {
        self.get_anni_by_corso_laurea(corso_laurea).await
    }

    async fn anno_by_corso_laurea_nome(
        &self,
        corso_laurea: i64,
        anno: &str,
    ) -> Result<Option<AnnoDidattico>, DbError> {
        self.get_anno_by_corso_laurea_nome(corso_laurea, anno).await
    }

    async fn lezioni(&self, corso_laurea: i64, resto: i64, anno: i64) -> Result<Vec<Lezione>, DbError> {
        self.get_lezioni(corso_laurea, resto, anno).await
    }

    async fn corsi_by_corso_laurea(&self, corso_laurea: i64) -> Result<Vec<Corso>, DbError> {
        self.get_corsi_by_corso_laurea(corso_laurea).await
    }

    async fn aule(&self) -> Result<Vec<Aula>, DbError> {
        self.get_aule().await
    }

    async fn aule_by_edificio(&self, edificio: &str) -> Result<Vec<Aula>, DbError> {
        self.get_aule_by_edificio(edificio).await
    }

    async fn edifici(&self) -> Result<Vec<String>, DbError> {
        self.get_edifici().await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// One of the names in the request doesn't exist.
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] DbError),
}

/// One program/cohort/year combination and its lessons, sorted.
#[derive(Debug)]
pub struct Orario {
    pub corso_laurea: CorsoLaurea,
    pub resto: Resto,
    pub anno: AnnoDidattico,
    pub lezioni: Vec<Lezione>,
}

/**
Resolve a timetable from the names a user picks in the search form.

The cohort is looked up within the program, and so is the year label.
*/
pub async fn find_orario(
    catalog: &dyn Catalog,
    corso_laurea: &str,
    resto: &str,
    anno: &str,
) -> Result<Orario, CatalogError> {
    log::trace!("find_orario( {:?}, {:?}, {:?} ) called.", corso_laurea, resto, anno);

    let corso_laurea = catalog.corso_laurea_by_nome(corso_laurea).await?
        .ok_or_else(|| CatalogError::NotFound(
            format!("Corso di laurea {:?} non trovato.", corso_laurea)
        ))?;
    let resto = catalog.resto_by_nome(resto, corso_laurea.id).await?
        .ok_or_else(|| CatalogError::NotFound(
            format!("Resto {:?} non trovato in {}.", resto, &corso_laurea.nome)
        ))?;
    let anno = catalog.anno_by_corso_laurea_nome(corso_laurea.id, anno).await?
        .ok_or_else(|| CatalogError::NotFound(
            format!("Anno {:?} non trovato in {}.", anno, &corso_laurea.nome)
        ))?;

    let mut lezioni = catalog.lezioni(corso_laurea.id, resto.id, anno.id).await?;
    sort_lezioni(&mut lezioni);

    Ok(Orario { corso_laurea, resto, anno, lezioni })
}
