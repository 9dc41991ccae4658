/*!
Database interaction module.

The Postgres database to which this connects is meant to have two sets of
tables. The first holds the users:

```sql
CREATE TABLE personale_ta (
    id       BIGSERIAL PRIMARY KEY,
    nome     TEXT NOT NULL,
    cognome  TEXT NOT NULL,
    email    TEXT UNIQUE NOT NULL,
    password TEXT,
    telefono TEXT
);

CREATE TABLE accademici (
    matricola    TEXT PRIMARY KEY,
    nome         TEXT NOT NULL,
    cognome      TEXT NOT NULL,
    data_nascita DATE,
    email        TEXT UNIQUE NOT NULL,
    password     TEXT,      /* NULL until first activation */
    iscrizione   DATE,
    tipo         TEXT NOT NULL,
    attivato     BOOL NOT NULL DEFAULT FALSE,
    corso_laurea BIGINT REFERENCES corsi_laurea(id),
    dipartimento TEXT
);
```

The second holds the timetable data: `corsi_laurea`, `resti`,
`anni_didattici` (with the `anni_corsi_laurea` join table), `aule`, `corsi`
and `lezioni`. See `SCHEMA` for the details.
*/
use std::fmt::Write;

use tokio_postgres::{Client, NoTls};

pub mod orari;
pub mod utenti;

static SCHEMA: &[(&str, &str, &str)] = &[
    (
        "SELECT FROM information_schema.tables WHERE table_name = 'corsi_laurea'",
        "CREATE TABLE corsi_laurea (
            id      BIGSERIAL PRIMARY KEY,
            nome    TEXT UNIQUE NOT NULL
        )",
        "DROP TABLE corsi_laurea",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'personale_ta'",
        "CREATE TABLE personale_ta (
            id          BIGSERIAL PRIMARY KEY,
            nome        TEXT NOT NULL,
            cognome     TEXT NOT NULL,
            email       TEXT UNIQUE NOT NULL,
            password    TEXT,
            telefono    TEXT
        )",
        "DROP TABLE personale_ta",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'accademici'",
        "CREATE TABLE accademici (
            matricola       TEXT PRIMARY KEY,
            nome            TEXT NOT NULL,
            cognome         TEXT NOT NULL,
            data_nascita    DATE,
            email           TEXT UNIQUE NOT NULL,
            password        TEXT,   /* NULL until first activation */
            iscrizione      DATE,
            tipo            TEXT NOT NULL,
            attivato        BOOL NOT NULL DEFAULT FALSE,
            corso_laurea    BIGINT REFERENCES corsi_laurea(id),
            dipartimento    TEXT
        )",
        "DROP TABLE accademici",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'resti'",
        "CREATE TABLE resti (
            id              BIGSERIAL PRIMARY KEY,
            nome            TEXT NOT NULL,
            corso_laurea    BIGINT NOT NULL REFERENCES corsi_laurea(id),
            UNIQUE (nome, corso_laurea)
        )",
        "DROP TABLE resti",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'anni_didattici'",
        "CREATE TABLE anni_didattici (
            id      BIGSERIAL PRIMARY KEY,
            anno    TEXT UNIQUE NOT NULL
        )",
        "DROP TABLE anni_didattici",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'anni_corsi_laurea'",
        "CREATE TABLE anni_corsi_laurea (
            anno            BIGINT NOT NULL REFERENCES anni_didattici(id),
            corso_laurea    BIGINT NOT NULL REFERENCES corsi_laurea(id),
            PRIMARY KEY (anno, corso_laurea)
        )",
        "DROP TABLE anni_corsi_laurea",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'aule'",
        "CREATE TABLE aule (
            id          BIGSERIAL PRIMARY KEY,
            edificio    TEXT NOT NULL,
            nome        TEXT NOT NULL
        )",
        "DROP TABLE aule",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'corsi'",
        "CREATE TABLE corsi (
            id              BIGSERIAL PRIMARY KEY,
            nome            TEXT NOT NULL,
            corso_laurea    BIGINT NOT NULL REFERENCES corsi_laurea(id),
            anno_didattico  BIGINT NOT NULL REFERENCES anni_didattici(id)
        )",
        "DROP TABLE corsi",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'lezioni'",
        "CREATE TABLE lezioni (
            id          BIGSERIAL PRIMARY KEY,
            semestre    SMALLINT NOT NULL,
            giorno      TEXT NOT NULL,
            ora_inizio  TIME NOT NULL,
            ora_fine    TIME NOT NULL,
            corso       BIGINT NOT NULL REFERENCES corsi(id),
            resto       BIGINT NOT NULL REFERENCES resti(id),
            aula        BIGINT NOT NULL REFERENCES aule(id)
        )",
        "DROP TABLE lezioni",
    ),
];

#[derive(Debug, PartialEq)]
pub struct DbError(String);

impl DbError {
    /// Prepend some contextual `annotation` for the error.
    fn annotate(self, annotation: &str) -> Self {
        let s = format!("{}: {}", annotation, &self.0);
        Self(s)
    }

    pub fn display(&self) -> &str { &self.0 }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl std::error::Error for DbError {}

impl From<tokio_postgres::error::Error> for DbError {
    fn from(e: tokio_postgres::error::Error) -> DbError {
        let mut s = format!("Data DB: {}", &e);
        if let Some(dbe) = e.as_db_error() {
            // Writing to a String can't fail.
            let _ = write!(&mut s, "; {}", dbe);
        }
        DbError(s)
    }
}

impl From<String> for DbError {
    fn from(s: String) -> DbError { DbError(s) }
}

pub struct Store {
    connection_string: String,
}

impl Store {
    pub fn new(connection_string: String) -> Self {
        log::trace!("Store::new( {:?} ) called.", &connection_string);

        Self { connection_string }
    }

    async fn connect(&self) -> Result<Client, DbError> {
        log::trace!(
            "Store::connect() called w/connection string {:?}",
            &self.connection_string
        );

        match tokio_postgres::connect(&self.connection_string, NoTls).await {
            Ok((client, connection)) => {
                log::trace!("    ...connection successful.");
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        log::error!("Data DB connection error: {}", &e);
                    } else {
                        log::trace!("tokio connection runtime drops.");
                    }
                });
                Ok(client)
            },
            Err(e) => {
                let dberr = DbError::from(e);
                log::trace!("    ...connection failed: {:?}", &dberr);
                Err(dberr.annotate("Unable to connect"))
            }
        }
    }

    pub async fn ensure_db_schema(&self) -> Result<(), DbError> {
        log::trace!("Store::ensure_db_schema() called.");

        let mut client = self.connect().await?;
        let t = client.transaction().await
            .map_err(|e| DbError::from(e)
                .annotate("Data DB unable to begin transaction"))?;

        for (test_stmt, create_stmt, _) in SCHEMA.iter() {
            if t.query_opt(*test_stmt, &[]).await?.is_none() {
                log::info!(
                    "{:?} returned no results; attempting to insert table.",
                    test_stmt
                );
                t.execute(*create_stmt, &[]).await?;
            }
        }

        t.commit().await
            .map_err(|e| DbError::from(e)
                .annotate("Error committing transaction"))
    }

    /**
    Drop all database tables to fully reset database state.

    This is only meant for cleanup after testing. It is advisable to look at
    the ERROR level log output when testing to ensure this method did its job.
    */
    #[cfg(test)]
    pub async fn nuke_database(&self) -> Result<(), DbError> {
        log::trace!("Store::nuke_database() called.");

        let client = self.connect().await?;

        for (_, _, drop_stmt) in SCHEMA.iter().rev() {
            if let Err(e) = client.execute(*drop_stmt, &[]).await {
                let err = DbError::from(e);
                log::error!("Error dropping: {:?}: {}", &drop_stmt, &err.display());
            }
        }

        log::trace!("    ....nuking complete.");
        Ok(())
    }
}
