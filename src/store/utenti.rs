/*!
`Store` methods for the two kinds of users.

Staff (`personale_ta`) and academics (`accademici`) live in separate tables;
an email address is expected to appear in at most one of them.
*/
use futures::stream::{FuturesUnordered, StreamExt};
use tokio_postgres::{Row, Transaction, types::{ToSql, Type}};

use super::{Store, DbError};
use crate::user::*;

fn personale_from_row(row: &Row) -> Result<PersonaleTA, DbError> {
    log::trace!("personale_from_row( {:?} ) called", row);

    let p = PersonaleTA {
        id: row.try_get("id")?,
        nome: row.try_get("nome")?,
        cognome: row.try_get("cognome")?,
        email: row.try_get("email")?,
        password: row.try_get("password")?,
        telefono: row.try_get("telefono")?,
    };

    Ok(p)
}

fn accademico_from_row(row: &Row) -> Result<Accademico, DbError> {
    log::trace!("accademico_from_row( {:?} ) called", row);

    let tipo_str: &str = row.try_get("tipo")?;
    let a = Accademico {
        matricola: row.try_get("matricola")?,
        nome: row.try_get("nome")?,
        cognome: row.try_get("cognome")?,
        data_nascita: row.try_get("data_nascita")?,
        email: row.try_get("email")?,
        password: row.try_get("password")?,
        iscrizione: row.try_get("iscrizione")?,
        tipo: tipo_str.parse()?,
        attivato: row.try_get("attivato")?,
        corso_laurea: row.try_get("corso_laurea")?,
        dipartimento: row.try_get("dipartimento")?,
    };

    Ok(a)
}

const ACCADEMICO_INSERT: &str = "INSERT INTO accademici (
        matricola, nome, cognome, data_nascita, email, password,
        iscrizione, tipo, attivato, corso_laurea, dipartimento
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";

/// Returns which table, if any, already holds `email`.
///
/// Used when inserting new users so the error message can say where the
/// address is already in use.
async fn check_existing_email(
    t: &Transaction<'_>,
    email: &str,
) -> Result<Option<&'static str>, DbError> {
    log::trace!("check_existing_email( T, {:?} ) called.", email);

    if t.query_opt(
        "SELECT id FROM personale_ta WHERE email = $1",
        &[&email]
    ).await?.is_some() {
        return Ok(Some("personale_ta"));
    }
    if t.query_opt(
        "SELECT matricola FROM accademici WHERE email = $1",
        &[&email]
    ).await?.is_some() {
        return Ok(Some("accademici"));
    }

    Ok(None)
}

impl Store {
    pub async fn get_personale_by_email(
        &self,
        email: &str
    ) -> Result<Option<PersonaleTA>, DbError> {
        log::trace!("Store::get_personale_by_email( {:?} ) called.", email);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM personale_ta WHERE email = $1",
            &[&email]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(personale_from_row(&row)?)),
        }
    }

    /// Staff lookup by email and password together; the comparison is done
    /// by the database.
    pub async fn get_personale_by_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<PersonaleTA>, DbError> {
        log::trace!(
            "Store::get_personale_by_email_and_password( {:?}, [ password ] ) called.",
            email
        );

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM personale_ta WHERE email = $1 AND password = $2",
            &[&email, &password]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(personale_from_row(&row)?)),
        }
    }

    pub async fn get_personale(&self) -> Result<Vec<PersonaleTA>, DbError> {
        log::trace!("Store::get_personale() called.");

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM personale_ta ORDER BY cognome, nome",
            &[]
        ).await?;

        rows.iter().map(personale_from_row).collect()
    }

    /// Inserts a staff member, returning the id the database assigned.
    pub async fn insert_personale(
        &self,
        p: &PersonaleTA
    ) -> Result<i64, DbError> {
        log::trace!("Store::insert_personale( {:?} ) called.", &p.email);

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        if let Some(table) = check_existing_email(&t, &p.email).await? {
            return Err(DbError(format!(
                "Email {} already in use in {}.", &p.email, table
            )));
        }

        let row = t.query_one(
            "INSERT INTO personale_ta (nome, cognome, email, password, telefono)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id",
            &[&p.nome, &p.cognome, &p.email, &p.password, &p.telefono]
        ).await?;
        let id: i64 = row.try_get("id")?;

        t.commit().await?;
        log::trace!("Inserted PersonaleTA {:?} with id {}.", &p.email, &id);
        Ok(id)
    }

    pub async fn delete_personale(&self, id: i64) -> Result<(), DbError> {
        log::trace!("Store::delete_personale( {} ) called.", &id);

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM personale_ta WHERE id = $1",
            &[&id]
        ).await?;

        if n == 0 {
            Err(DbError(format!("There is no PersonaleTA with id {}.", &id)))
        } else {
            Ok(())
        }
    }

    pub async fn get_accademico_by_email(
        &self,
        email: &str
    ) -> Result<Option<Accademico>, DbError> {
        log::trace!("Store::get_accademico_by_email( {:?} ) called.", email);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM accademici WHERE email = $1",
            &[&email]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(accademico_from_row(&row)?)),
        }
    }

    pub async fn get_accademico_by_matricola(
        &self,
        matricola: &str
    ) -> Result<Option<Accademico>, DbError> {
        log::trace!("Store::get_accademico_by_matricola( {:?} ) called.", matricola);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM accademici WHERE matricola = $1",
            &[&matricola]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(accademico_from_row(&row)?)),
        }
    }

    pub async fn get_accademici(&self) -> Result<Vec<Accademico>, DbError> {
        log::trace!("Store::get_accademici() called.");

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM accademici ORDER BY cognome, nome",
            &[]
        ).await?;

        rows.iter().map(accademico_from_row).collect()
    }

    pub async fn get_accademici_by_attivazione(
        &self,
        attivato: bool
    ) -> Result<Vec<Accademico>, DbError> {
        log::trace!("Store::get_accademici_by_attivazione( {} ) called.", &attivato);

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM accademici WHERE attivato = $1 ORDER BY cognome, nome",
            &[&attivato]
        ).await?;

        rows.iter().map(accademico_from_row).collect()
    }

    /// Every academic email address on file.
    pub async fn get_accademico_emails(&self) -> Result<Vec<String>, DbError> {
        log::trace!("Store::get_accademico_emails() called.");

        let client = self.connect().await?;
        let rows = client.query("SELECT email FROM accademici ORDER BY email", &[]).await?;

        let mut emails: Vec<String> = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            emails.push(row.try_get("email")?);
        }
        Ok(emails)
    }

    pub async fn insert_accademico(
        &self,
        a: &Accademico
    ) -> Result<(), DbError> {
        log::trace!("Store::insert_accademico( {:?} ) called.", &a.matricola);

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        if let Some(table) = check_existing_email(&t, &a.email).await? {
            return Err(DbError(format!(
                "Email {} already in use in {}.", &a.email, table
            )));
        }

        let tipo = a.tipo.to_string();
        t.execute(
            ACCADEMICO_INSERT,
            &[
                &a.matricola, &a.nome, &a.cognome, &a.data_nascita,
                &a.email, &a.password, &a.iscrizione, &tipo,
                &a.attivato, &a.corso_laurea, &a.dipartimento,
            ]
        ).await?;

        t.commit().await?;
        log::trace!("Inserted Accademico {:?} ({}).", &a.matricola, &a.email);
        Ok(())
    }

    /// Inserts a batch of academics in a single transaction; either they all
    /// go in or none do.
    pub async fn insert_accademici(
        &self,
        accademici: &[Accademico]
    ) -> Result<usize, DbError> {
        log::trace!(
            "Store::insert_accademici( [ {} Accademici ] ) called.",
            accademici.len()
        );

        let new_matricole: Vec<&str> = accademici.iter()
            .map(|a| a.matricola.as_str())
            .collect();
        let new_emails: Vec<&str> = accademici.iter()
            .map(|a| a.email.as_str())
            .collect();

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        let preexisting = t.query(
            "SELECT matricola AS key FROM accademici
                WHERE matricola = ANY($1) OR email = ANY($2)
            UNION
            SELECT email AS key FROM personale_ta WHERE email = ANY($2)",
            &[&new_matricole, &new_emails]
        ).await?;
        if !preexisting.is_empty() {
            let mut estr = String::from(
                "Database already contains users with the following matricole/emails:"
            );
            for row in preexisting.iter() {
                let key: &str = row.try_get("key")?;
                estr.push('\n');
                estr.push_str(key);
            }
            return Err(DbError(estr));
        }

        let insert_query = t.prepare_typed(
            ACCADEMICO_INSERT,
            &[
                Type::TEXT, Type::TEXT, Type::TEXT, Type::DATE, Type::TEXT,
                Type::TEXT, Type::DATE, Type::TEXT, Type::BOOL, Type::INT8,
                Type::TEXT,
            ]
        ).await?;

        /*
        The parameter slices have to outlive the futures in `inserts`, so
        the `tipo` strings and the parameter arrays are all built up front.
        */
        let mut n_inserted: usize = 0;
        {
            let tipi: Vec<String> = accademici.iter()
                .map(|a| a.tipo.to_string())
                .collect();
            let pvec: Vec<[&(dyn ToSql + Sync); 11]> = accademici.iter()
                .zip(tipi.iter())
                .map(|(a, tipo)| {
                    let p: [&(dyn ToSql + Sync); 11] = [
                        &a.matricola, &a.nome, &a.cognome, &a.data_nascita,
                        &a.email, &a.password, &a.iscrizione, tipo,
                        &a.attivato, &a.corso_laurea, &a.dipartimento,
                    ];
                    p
                }).collect();

            let mut inserts = FuturesUnordered::new();
            for params in pvec.iter() {
                inserts.push(t.execute(&insert_query, &params[..]));
            }

            while let Some(res) = inserts.next().await {
                match res {
                    Ok(_) => { n_inserted += 1; },
                    Err(e) => {
                        let estr = format!(
                            "Error inserting Accademico into database: {}", &e
                        );
                        return Err(DbError(estr));
                    },
                }
            }
        }

        t.commit().await?;

        log::trace!("Inserted {} Accademici.", &n_inserted);
        Ok(n_inserted)
    }

    pub async fn delete_accademico(&self, matricola: &str) -> Result<(), DbError> {
        log::trace!("Store::delete_accademico( {:?} ) called.", matricola);

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM accademici WHERE matricola = $1",
            &[&matricola]
        ).await?;

        if n == 0 {
            Err(DbError(format!("There is no Accademico with matricola {:?}.", matricola)))
        } else {
            Ok(())
        }
    }

    pub async fn set_attivazione(
        &self,
        matricola: &str,
        attivato: bool,
    ) -> Result<(), DbError> {
        log::trace!("Store::set_attivazione( {:?}, {} ) called.", matricola, &attivato);

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE accademici SET attivato = $1 WHERE matricola = $2",
            &[&attivato, &matricola]
        ).await?;

        match n {
            0 => Err(DbError(format!("There is no Accademico with matricola {:?}.", matricola))),
            1 => Ok(()),
            n => {
                log::warn!(
                    "Updating activation of single Accademico {:?} affected {} rows.",
                    matricola, &n
                );
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serial_test::serial;

    use crate::tests::ensure_logging;
    use crate::store::tests::TEST_CONNECTION;

    static PERSONALE: &[(&str, &str, &str, &str)] = &[
        ("Anna", "Neri", "admin@unisa.it", "passwordSicura"),
        ("Paolo", "Gallo", "segreteria@unisa.it", "segreto"),
    ];

    fn accademico(matricola: &str, email: &str, tipo: Tipo) -> Accademico {
        Accademico {
            matricola: matricola.to_owned(),
            nome: "Mario".to_owned(),
            cognome: "Rossi".to_owned(),
            data_nascita: None,
            email: email.to_owned(),
            password: None,
            iscrizione: None,
            tipo,
            attivato: false,
            corso_laurea: None,
            dipartimento: None,
        }
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn insert_and_find_users() {
        ensure_logging();

        let db = Store::new(TEST_CONNECTION.to_owned());
        db.ensure_db_schema().await.unwrap();

        let mut ids = Vec::new();
        for (nome, cognome, email, password) in PERSONALE.iter() {
            let p = PersonaleTA {
                id: 0,
                nome: nome.to_string(),
                cognome: cognome.to_string(),
                email: email.to_string(),
                password: Some(password.to_string()),
                telefono: None,
            };
            ids.push(db.insert_personale(&p).await.unwrap());
        }

        let p = db.get_personale_by_email_and_password("admin@unisa.it", "passwordSicura")
            .await.unwrap().unwrap();
        assert_eq!(p.cognome, "Neri");
        assert!(db.get_personale_by_email_and_password("admin@unisa.it", "sbagliata")
            .await.unwrap().is_none());

        let accs = Accademico::vec_from_csv_reader(
            std::fs::File::open("test/good_accademici_0.csv").unwrap()
        ).unwrap();
        assert_eq!(db.insert_accademici(&accs).await.unwrap(), accs.len());
        // Same batch again must be refused whole.
        assert!(db.insert_accademici(&accs).await.is_err());

        // Email already used by staff.
        let dup = accademico("0512199999", "admin@unisa.it", Tipo::Studente);
        assert!(db.insert_accademico(&dup).await.is_err());

        db.set_attivazione("0512100001", true).await.unwrap();
        let attivati = db.get_accademici_by_attivazione(true).await.unwrap();
        assert_eq!(attivati.len(), 1);
        assert_eq!(attivati[0].matricola, "0512100001");

        let a = db.get_accademico_by_email("a.bianchi@unisa.it").await.unwrap().unwrap();
        assert_eq!(a.tipo, Tipo::Studente);
        assert_eq!(a.password, None);

        assert_eq!(db.get_accademico_emails().await.unwrap().len(), accs.len());

        for a in accs.iter() {
            db.delete_accademico(&a.matricola).await.unwrap();
        }
        for id in ids {
            db.delete_personale(id).await.unwrap();
        }
        assert!(db.delete_personale(-1).await.is_err());

        db.nuke_database().await.unwrap();
    }
}
