/*!
Timetable and classroom pages, and the JSON endpoints the search form uses
to fill in its drop-downs.
*/
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Form, Query},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::Time;
use tokio::sync::RwLock;

use crate::catalog::{find_orario, CatalogError};
use crate::config::Glob;
use crate::orari::{Aula, Corso, IdNome, Lezione};
use super::*;

#[derive(Deserialize, Debug)]
pub struct OrarioParams {
    #[serde(rename = "corsoLaurea")]
    pub corso_laurea: Option<String>,
    pub resto: Option<String>,
    pub anno: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct EdificioParams {
    pub ed: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CorsoLaureaParam {
    #[serde(rename = "corsoLaurea")]
    pub corso_laurea: Option<String>,
}

/// A lesson the way the timetable template shows it.
#[derive(Serialize, Debug)]
struct LezioneRow {
    giorno: String,
    ora_inizio: String,
    ora_fine: String,
    semestre: i16,
    corso: String,
    aula: String,
    edificio: String,
}

fn hh_mm(t: Time) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

fn lezione_row(
    lez: &Lezione,
    corsi: &HashMap<i64, &Corso>,
    aule: &HashMap<i64, &Aula>,
) -> LezioneRow {
    let (aula, edificio) = match aule.get(&lez.aula) {
        Some(a) => (a.nome.clone(), a.edificio.clone()),
        None => (lez.aula.to_string(), String::new()),
    };

    LezioneRow {
        giorno: lez.giorno.to_string(),
        ora_inizio: hh_mm(lez.ora_inizio),
        ora_fine: hh_mm(lez.ora_fine),
        semestre: lez.semestre,
        corso: corsi.get(&lez.corso)
            .map(|c| c.nome.clone())
            .unwrap_or_else(|| lez.corso.to_string()),
        aula,
        edificio,
    }
}

pub async fn orario(
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(params): Form<OrarioParams>,
) -> Response {
    log::trace!("orario( {:?} ) called.", &params);

    let corso_laurea = match require_param(&params.corso_laurea, "corsoLaurea") {
        Ok(s) => s,
        Err(r) => { return r; },
    };
    let resto = match require_param(&params.resto, "resto") {
        Ok(s) => s,
        Err(r) => { return r; },
    };
    let anno = match require_param(&params.anno, "anno") {
        Ok(s) => s,
        Err(r) => { return r; },
    };

    let catalog = glob.read().await.catalog.clone();

    let orario = match find_orario(catalog.as_ref(), corso_laurea, resto, anno).await {
        Ok(o) => o,
        Err(CatalogError::NotFound(msg)) => {
            return html_error(StatusCode::NOT_FOUND, &msg);
        },
        Err(CatalogError::Store(e)) => {
            log::error!(
                "Error finding orario for ({:?}, {:?}, {:?}): {}",
                corso_laurea, resto, anno, &e
            );
            return html_500();
        },
    };

    let (corsi, aule) = match (
        catalog.corsi_by_corso_laurea(orario.corso_laurea.id).await,
        catalog.aule().await,
    ) {
        (Ok(c), Ok(a)) => (c, a),
        (Err(e), _) | (_, Err(e)) => {
            log::error!("Error retrieving corsi/aule for orario: {}", &e);
            return html_500();
        },
    };
    let corsi: HashMap<i64, &Corso> = corsi.iter().map(|c| (c.id, c)).collect();
    let aule: HashMap<i64, &Aula> = aule.iter().map(|a| (a.id, a)).collect();

    let lezioni: Vec<LezioneRow> = orario.lezioni.iter()
        .map(|l| lezione_row(l, &corsi, &aule))
        .collect();

    let data = json!({
        "corso_laurea": &orario.corso_laurea,
        "resto": &orario.resto,
        "anno": &orario.anno,
        "lezioni": lezioni,
    });

    serve_template(StatusCode::OK, "orario", &data, vec![])
}

pub async fn edificio(
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(params): Form<EdificioParams>,
) -> Response {
    log::trace!("edificio( {:?} ) called.", &params);

    let ed = match require_param(&params.ed, "ed") {
        Ok(s) => s,
        Err(r) => { return r; },
    };

    let catalog = glob.read().await.catalog.clone();
    let aule = match catalog.aule_by_edificio(ed).await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error retrieving aule in edificio {:?}: {}", ed, &e);
            return html_500();
        },
    };

    let data = json!({
        "edificio": ed,
        "aule": aule,
    });

    serve_template(StatusCode::OK, "edificio", &data, vec![])
}

pub async fn edifici(Extension(glob): Extension<Arc<RwLock<Glob>>>) -> Response {
    log::trace!("edifici() called.");

    let catalog = glob.read().await.catalog.clone();
    match catalog.edifici().await {
        Ok(v) => Json(v).into_response(),
        Err(e) => {
            log::error!("Error retrieving edifici: {}", &e);
            text_500(None)
        },
    }
}

/// Which of the program-scoped listings to produce.
#[derive(Clone, Copy, Debug)]
enum Listing {
    Resti,
    Anni,
    Corsi,
}

/**
Shared body of `/resti`, `/anni` and `/corsi`: a JSON array of `{id, nome}`
for the named degree program, which is empty if there's no such program.
*/
async fn listing(
    glob: Arc<RwLock<Glob>>,
    params: CorsoLaureaParam,
    which: Listing,
) -> Response {
    log::trace!("listing( {:?}, {:?} ) called.", &params, &which);

    let catalog = glob.read().await.catalog.clone();

    let nome = match params.corso_laurea.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => { return Json(Vec::<IdNome>::new()).into_response(); },
    };

    let cl = match catalog.corso_laurea_by_nome(nome).await {
        Ok(Some(cl)) => cl,
        Ok(None) => {
            log::debug!("No corso di laurea {:?}; empty {:?} listing.", nome, &which);
            return Json(Vec::<IdNome>::new()).into_response();
        },
        Err(e) => {
            log::error!("Error looking up corso di laurea {:?}: {}", nome, &e);
            return text_500(None);
        },
    };

    let res: Result<Vec<IdNome>, _> = match which {
        Listing::Resti => catalog.resti_by_corso_laurea(cl.id).await
            .map(|v| v.iter().map(IdNome::from).collect()),
        Listing::Anni => catalog.anni_by_corso_laurea(cl.id).await
            .map(|v| v.iter().map(IdNome::from).collect()),
        Listing::Corsi => catalog.corsi_by_corso_laurea(cl.id).await
            .map(|v| v.iter().map(IdNome::from).collect()),
    };

    match res {
        Ok(v) => Json(v).into_response(),
        Err(e) => {
            log::error!("Error retrieving {:?} of {:?}: {}", &which, &cl.nome, &e);
            text_500(None)
        },
    }
}

pub async fn resti(
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Query(params): Query<CorsoLaureaParam>,
) -> Response {
    listing(glob, params, Listing::Resti).await
}

pub async fn anni(
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Query(params): Query<CorsoLaureaParam>,
) -> Response {
    listing(glob, params, Listing::Anni).await
}

pub async fn corsi(
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Query(params): Query<CorsoLaureaParam>,
) -> Response {
    listing(glob, params, Listing::Corsi).await
}
