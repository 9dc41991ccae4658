/*!
`Store` methods for timetable data: degree programs, cohorts, academic
years, classrooms, courses and lessons.
*/
use tokio_postgres::Row;

use super::{Store, DbError};
use crate::orari::*;

fn corso_laurea_from_row(row: &Row) -> Result<CorsoLaurea, DbError> {
    Ok(CorsoLaurea {
        id: row.try_get("id")?,
        nome: row.try_get("nome")?,
    })
}

fn resto_from_row(row: &Row) -> Result<Resto, DbError> {
    Ok(Resto {
        id: row.try_get("id")?,
        nome: row.try_get("nome")?,
        corso_laurea: row.try_get("corso_laurea")?,
    })
}

fn anno_from_row(row: &Row) -> Result<AnnoDidattico, DbError> {
    Ok(AnnoDidattico {
        id: row.try_get("id")?,
        anno: row.try_get("anno")?,
    })
}

fn aula_from_row(row: &Row) -> Result<Aula, DbError> {
    Ok(Aula {
        id: row.try_get("id")?,
        edificio: row.try_get("edificio")?,
        nome: row.try_get("nome")?,
    })
}

fn corso_from_row(row: &Row) -> Result<Corso, DbError> {
    Ok(Corso {
        id: row.try_get("id")?,
        nome: row.try_get("nome")?,
        corso_laurea: row.try_get("corso_laurea")?,
        anno_didattico: row.try_get("anno_didattico")?,
    })
}

fn lezione_from_row(row: &Row) -> Result<Lezione, DbError> {
    log::trace!("lezione_from_row( {:?} ) called.", row);

    let giorno_str: &str = row.try_get("giorno")?;
    let lez = Lezione {
        id: row.try_get("id")?,
        semestre: row.try_get("semestre")?,
        giorno: giorno_str.parse()?,
        ora_inizio: row.try_get("ora_inizio")?,
        ora_fine: row.try_get("ora_fine")?,
        corso: row.try_get("corso")?,
        resto: row.try_get("resto")?,
        aula: row.try_get("aula")?,
    };

    Ok(lez)
}

impl Store {
    pub async fn get_corsi_laurea(&self) -> Result<Vec<CorsoLaurea>, DbError> {
        log::trace!("Store::get_corsi_laurea() called.");

        let client = self.connect().await?;
        let rows = client.query("SELECT * FROM corsi_laurea ORDER BY nome", &[]).await
            .map_err(|e| DbError::from(e).annotate("Listing corsi_laurea"))?;

        rows.iter().map(corso_laurea_from_row).collect()
    }

    pub async fn get_corso_laurea_by_nome(
        &self,
        nome: &str
    ) -> Result<Option<CorsoLaurea>, DbError> {
        log::trace!("Store::get_corso_laurea_by_nome( {:?} ) called.", nome);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM corsi_laurea WHERE nome = $1",
            &[&nome]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(corso_laurea_from_row(&row)?)),
        }
    }

    pub async fn get_resti_by_corso_laurea(
        &self,
        corso_laurea: i64
    ) -> Result<Vec<Resto>, DbError> {
        log::trace!("Store::get_resti_by_corso_laurea( {} ) called.", &corso_laurea);

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM resti WHERE corso_laurea = $1 ORDER BY nome",
            &[&corso_laurea]
        ).await?;

        rows.iter().map(resto_from_row).collect()
    }

    /// Cohort names are only unique within a degree program.
    pub async fn get_resto_by_nome(
        &self,
        nome: &str,
        corso_laurea: i64,
    ) -> Result<Option<Resto>, DbError> {
        log::trace!("Store::get_resto_by_nome( {:?}, {} ) called.", nome, &corso_laurea);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM resti WHERE nome = $1 AND corso_laurea = $2",
            &[&nome, &corso_laurea]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(resto_from_row(&row)?)),
        }
    }

    pub async fn get_anni_by_corso_laurea(
        &self,
        corso_laurea: i64
    ) -> Result<Vec<AnnoDidattico>, DbError> {
        log::trace!("Store::get_anni_by_corso_laurea( {} ) called.", &corso_laurea);

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT anni_didattici.id, anni_didattici.anno
                FROM anni_didattici
                INNER JOIN anni_corsi_laurea
                    ON anni_corsi_laurea.anno = anni_didattici.id
                WHERE anni_corsi_laurea.corso_laurea = $1
                ORDER BY anni_didattici.anno",
            &[&corso_laurea]
        ).await?;

        rows.iter().map(anno_from_row).collect()
    }

    pub async fn get_anno_by_corso_laurea_nome(
        &self,
        corso_laurea: i64,
        anno: &str,
    ) -> Result<Option<AnnoDidattico>, DbError> {
        log::trace!(
            "Store::get_anno_by_corso_laurea_nome( {}, {:?} ) called.",
            &corso_laurea, anno
        );

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT anni_didattici.id, anni_didattici.anno
                FROM anni_didattici
                INNER JOIN anni_corsi_laurea
                    ON anni_corsi_laurea.anno = anni_didattici.id
                WHERE anni_corsi_laurea.corso_laurea = $1
                    AND anni_didattici.anno = $2",
            &[&corso_laurea, &anno]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(anno_from_row(&row)?)),
        }
    }

    /**
    Lessons of the courses in `corso_laurea` for year `anno`, taught to
    cohort `resto`.

    Rows come back in database order; callers who present them should
    run them through `orari::sort_lezioni()`.
    */
    pub async fn get_lezioni(
        &self,
        corso_laurea: i64,
        resto: i64,
        anno: i64,
    ) -> Result<Vec<Lezione>, DbError> {
        log::trace!(
            "Store::get_lezioni( {}, {}, {} ) called.",
            &corso_laurea, &resto, &anno
        );

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT lezioni.* FROM lezioni
                INNER JOIN corsi ON lezioni.corso = corsi.id
                WHERE corsi.corso_laurea = $1
                    AND lezioni.resto = $2
                    AND corsi.anno_didattico = $3",
            &[&corso_laurea, &resto, &anno]
        ).await
            .map_err(|e| DbError::from(e).annotate("Selecting lezioni"))?;

        rows.iter().map(lezione_from_row).collect()
    }

    pub async fn get_corsi_by_corso_laurea(
        &self,
        corso_laurea: i64
    ) -> Result<Vec<Corso>, DbError> {
        log::trace!("Store::get_corsi_by_corso_laurea( {} ) called.", &corso_laurea);

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM corsi WHERE corso_laurea = $1 ORDER BY nome",
            &[&corso_laurea]
        ).await?;

        rows.iter().map(corso_from_row).collect()
    }

    pub async fn get_aule(&self) -> Result<Vec<Aula>, DbError> {
        log::trace!("Store::get_aule() called.");

        let client = self.connect().await?;
        let rows = client.query("SELECT * FROM aule ORDER BY edificio, nome", &[]).await?;

        rows.iter().map(aula_from_row).collect()
    }

    pub async fn get_aule_by_edificio(
        &self,
        edificio: &str
    ) -> Result<Vec<Aula>, DbError> {
        log::trace!("Store::get_aule_by_edificio( {:?} ) called.", edificio);

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM aule WHERE edificio = $1 ORDER BY nome",
            &[&edificio]
        ).await?;

        rows.iter().map(aula_from_row).collect()
    }

    pub async fn get_edifici(&self) -> Result<Vec<String>, DbError> {
        log::trace!("Store::get_edifici() called.");

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT DISTINCT edificio FROM aule ORDER BY edificio",
            &[]
        ).await?;

        let mut edifici: Vec<String> = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            edifici.push(row.try_get("edificio")?);
        }
        Ok(edifici)
    }

    /*
    Insertion is only done through `loader::load_orari()` (`popdb orari`);
    the web interface treats timetable data as read-only.
    */

    pub async fn insert_corso_laurea(&self, nome: &str) -> Result<i64, DbError> {
        log::trace!("Store::insert_corso_laurea( {:?} ) called.", nome);

        let client = self.connect().await?;
        let row = client.query_one(
            "INSERT INTO corsi_laurea (nome) VALUES ($1) RETURNING id",
            &[&nome]
        ).await?;
        Ok(row.try_get("id")?)
    }

    pub async fn insert_resto(&self, nome: &str, corso_laurea: i64) -> Result<i64, DbError> {
        log::trace!("Store::insert_resto( {:?}, {} ) called.", nome, &corso_laurea);

        let client = self.connect().await?;
        let row = client.query_one(
            "INSERT INTO resti (nome, corso_laurea) VALUES ($1, $2) RETURNING id",
            &[&nome, &corso_laurea]
        ).await?;
        Ok(row.try_get("id")?)
    }

    /// Inserts the year label if it's new, and links it to `corso_laurea`.
    pub async fn insert_anno(&self, anno: &str, corso_laurea: i64) -> Result<i64, DbError> {
        log::trace!("Store::insert_anno( {:?}, {} ) called.", anno, &corso_laurea);

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        let id: i64 = match t.query_opt(
            "SELECT id FROM anni_didattici WHERE anno = $1",
            &[&anno]
        ).await? {
            Some(row) => row.try_get("id")?,
            None => t.query_one(
                "INSERT INTO anni_didattici (anno) VALUES ($1) RETURNING id",
                &[&anno]
            ).await?.try_get("id")?,
        };
        t.execute(
            "INSERT INTO anni_corsi_laurea (anno, corso_laurea) VALUES ($1, $2)
                ON CONFLICT DO NOTHING",
            &[&id, &corso_laurea]
        ).await?;

        t.commit().await?;
        Ok(id)
    }

    pub async fn insert_aula(&self, edificio: &str, nome: &str) -> Result<i64, DbError> {
        log::trace!("Store::insert_aula( {:?}, {:?} ) called.", edificio, nome);

        let client = self.connect().await?;
        let row = client.query_one(
            "INSERT INTO aule (edificio, nome) VALUES ($1, $2) RETURNING id",
            &[&edificio, &nome]
        ).await?;
        Ok(row.try_get("id")?)
    }

    pub async fn insert_corso(
        &self,
        nome: &str,
        corso_laurea: i64,
        anno_didattico: i64,
    ) -> Result<i64, DbError> {
        log::trace!(
            "Store::insert_corso( {:?}, {}, {} ) called.",
            nome, &corso_laurea, &anno_didattico
        );

        let client = self.connect().await?;
        let row = client.query_one(
            "INSERT INTO corsi (nome, corso_laurea, anno_didattico)
                VALUES ($1, $2, $3) RETURNING id",
            &[&nome, &corso_laurea, &anno_didattico]
        ).await?;
        Ok(row.try_get("id")?)
    }

    /// The `id` field of `lez` is ignored; the assigned one is returned.
    pub async fn insert_lezione(&self, lez: &Lezione) -> Result<i64, DbError> {
        log::trace!("Store::insert_lezione( {:?} ) called.", lez);

        let giorno = lez.giorno.to_string();
        let client = self.connect().await?;
        let row = client.query_one(
            "INSERT INTO lezioni (semestre, giorno, ora_inizio, ora_fine, corso, resto, aula)
                VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
            &[
                &lez.semestre, &giorno, &lez.ora_inizio, &lez.ora_fine,
                &lez.corso, &lez.resto, &lez.aula,
            ]
        ).await?;
        Ok(row.try_get("id")?)
    }
}
