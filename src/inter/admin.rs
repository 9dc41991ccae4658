/*!
The staff-only account administration API.

Every request is a `POST /admin` with an `x-uniclass-action` header naming
what to do; the body (if any) carries the action's argument. Successful
requests get back the relevant listing as JSON, with the same
`x-uniclass-action` header naming which listing it is.
*/
use std::sync::Arc;

use axum::{
    extract::Extension,
    http::header::{HeaderMap, HeaderName, HeaderValue},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::Glob;
use crate::registry::{self, Registry, RegistryError};
use crate::user::{Accademico, PersonaleTA};
use super::*;

pub const ACTION_HEADER: &str = "x-uniclass-action";

#[derive(Deserialize, Debug)]
struct Attivazione {
    matricola: String,
    attivato: bool,
}

pub async fn api(
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let (u, reg) = {
        let mut glob = glob.write().await;
        (glob.current_user(&headers), glob.registry.clone())
    };

    match u {
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                "You must be logged in.".to_owned(),
            ).into_response();
        },
        Some(u) if u.is_personale_ta() => {
            log::trace!("Admin request from {}.", u.email());
        },
        Some(u) => {
            log::warn!("Non-staff user {} attempted an admin action.", u.email());
            return (
                StatusCode::FORBIDDEN,
                "Only staff may administer accounts.".to_owned(),
            ).into_response();
        },
    }

    let action = match headers.get(ACTION_HEADER) {
        Some(act) => match act.to_str() {
            Ok(s) => s,
            Err(_) => { return respond_bad_request(
                "x-uniclass-action header unrecognizable.".to_owned()
            ); },
        },
        None => {
            return respond_bad_request(
                "Request must have an x-uniclass-action header.".to_owned()
            );
        },
    };

    let body = if body.trim().is_empty() { None } else { Some(body) };
    let reg = reg.as_ref();

    match action {
        "populate-accademici" => populate_accademici(reg).await,
        "populate-attivati" => populate_attivati(reg, body).await,
        "populate-personale" => populate_personale(reg).await,
        "populate-emails" => populate_emails(reg).await,
        "add-accademico" => add_accademico(reg, body).await,
        "upload-accademici" => upload_accademici(reg, body).await,
        "delete-accademico" => delete_accademico(reg, body).await,
        "set-attivazione" => set_attivazione(reg, body).await,
        "add-personale" => add_personale(reg, body).await,
        "delete-personale" => delete_personale(reg, body).await,
        x => respond_bad_request(
            format!("{:?} is not a recognizable x-uniclass-action value.", x)
        ),
    }
}

fn listing_response<T: serde::Serialize>(action: &'static str, data: T) -> Response {
    (
        StatusCode::OK,
        [(
            HeaderName::from_static(ACTION_HEADER),
            HeaderValue::from_static(action)
        )],
        Json(data),
    ).into_response()
}

/// 400 for the caller breaking a rule, 500 for anything else.
fn respond_registry_error(e: RegistryError) -> Response {
    if e.is_rule_violation() {
        respond_bad_request(e.to_string())
    } else {
        log::error!("Registry error: {}", &e);
        text_500(Some(e.to_string()))
    }
}

fn require_body(body: Option<String>, what: &str) -> Result<String, Response> {
    body.ok_or_else(|| respond_bad_request(
        format!("Request requires {} as a body.", what)
    ))
}

async fn populate_accademici(reg: &dyn Registry) -> Response {
    log::trace!("populate_accademici() called.");

    match reg.accademici().await {
        Ok(v) => listing_response("populate-accademici", v),
        Err(e) => {
            log::error!("Error retrieving Accademici: {}", &e);
            text_500(None)
        },
    }
}

async fn populate_attivati(reg: &dyn Registry, body: Option<String>) -> Response {
    let body = match require_body(body, "true or false") {
        Ok(b) => b,
        Err(r) => { return r; },
    };
    let attivato: bool = match body.trim().parse() {
        Ok(b) => b,
        Err(_) => {
            return respond_bad_request(
                format!("{:?} is neither true nor false.", body.trim())
            );
        },
    };

    match reg.accademici_by_attivazione(attivato).await {
        Ok(v) => listing_response("populate-attivati", v),
        Err(e) => {
            log::error!("Error retrieving Accademici by attivazione {}: {}", &attivato, &e);
            text_500(None)
        },
    }
}

async fn populate_personale(reg: &dyn Registry) -> Response {
    log::trace!("populate_personale() called.");

    match reg.personale().await {
        Ok(v) => listing_response("populate-personale", v),
        Err(e) => {
            log::error!("Error retrieving PersonaleTA: {}", &e);
            text_500(None)
        },
    }
}

async fn populate_emails(reg: &dyn Registry) -> Response {
    match reg.emails().await {
        Ok(v) => listing_response("populate-emails", v),
        Err(e) => {
            log::error!("Error retrieving emails: {}", &e);
            text_500(None)
        },
    }
}

async fn add_accademico(reg: &dyn Registry, body: Option<String>) -> Response {
    let body = match require_body(body, "a JSON Accademico") {
        Ok(b) => b,
        Err(r) => { return r; },
    };

    let a: Accademico = match serde_json::from_str(&body) {
        Ok(a) => a,
        Err(e) => {
            log::debug!("Error deserializing JSON {:?} as Accademico: {}", &body, &e);
            return respond_bad_request(
                format!("Unable to deserialize Accademico: {}", &e)
            );
        },
    };

    if let Err(e) = registry::register_accademico(reg, &a).await {
        return respond_registry_error(e);
    }

    populate_accademici(reg).await
}

async fn upload_accademici(reg: &dyn Registry, body: Option<String>) -> Response {
    let body = match require_body(body, "CSV") {
        Ok(b) => b,
        Err(r) => { return r; },
    };

    let res = match registry::parse_accademici_csv(&body) {
        Ok(accs) => registry::register_accademici(reg, &accs).await,
        Err(e) => Err(e),
    };
    match res {
        Ok(n) => { log::info!("Uploaded {} Accademici via CSV.", &n); },
        Err(e) => { return respond_registry_error(e); },
    }

    populate_accademici(reg).await
}

async fn delete_accademico(reg: &dyn Registry, body: Option<String>) -> Response {
    let matricola = match require_body(body, "the matricola to delete") {
        Ok(b) => b,
        Err(r) => { return r; },
    };

    if let Err(e) = registry::remove_accademico(reg, matricola.trim()).await {
        return respond_registry_error(e);
    }

    populate_accademici(reg).await
}

async fn set_attivazione(reg: &dyn Registry, body: Option<String>) -> Response {
    let body = match require_body(body, "a JSON {matricola, attivato} object") {
        Ok(b) => b,
        Err(r) => { return r; },
    };
    let att: Attivazione = match serde_json::from_str(&body) {
        Ok(x) => x,
        Err(e) => {
            return respond_bad_request(
                format!("Unable to deserialize activation change: {}", &e)
            );
        },
    };

    if let Err(e) = registry::change_activation(reg, &att.matricola, att.attivato).await {
        return respond_registry_error(e);
    }

    populate_accademici(reg).await
}

async fn add_personale(reg: &dyn Registry, body: Option<String>) -> Response {
    let body = match require_body(body, "a JSON PersonaleTA") {
        Ok(b) => b,
        Err(r) => { return r; },
    };

    let p: PersonaleTA = match serde_json::from_str(&body) {
        Ok(p) => p,
        Err(e) => {
            return respond_bad_request(
                format!("Unable to deserialize PersonaleTA: {}", &e)
            );
        },
    };

    if let Err(e) = registry::register_personale(reg, &p).await {
        return respond_registry_error(e);
    }

    populate_personale(reg).await
}

async fn delete_personale(reg: &dyn Registry, body: Option<String>) -> Response {
    let body = match require_body(body, "the id to delete") {
        Ok(b) => b,
        Err(r) => { return r; },
    };
    let id: i64 = match body.trim().parse() {
        Ok(n) => n,
        Err(e) => {
            return respond_bad_request(
                format!("Unable to parse {:?} as an id: {}", body.trim(), &e)
            );
        },
    };

    if let Err(e) = registry::remove_personale(reg, id).await {
        return respond_registry_error(e);
    }

    populate_personale(reg).await
}
