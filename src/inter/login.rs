/*!
Front page, logging in and logging out.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Form, Query},
    http::{header, header::HeaderMap, StatusCode},
    response::{Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::auth::LoginOutcome;
use crate::config::Glob;
use crate::session::{self, Session};
use super::*;

/// Data type to read the form data from a login request.
#[derive(Deserialize)]
pub struct LoginData {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Debug for LoginData {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("LoginData")
            .field("email", &self.email)
            .field("password", &"[ password ]")
            .finish()
    }
}

#[derive(Deserialize, Debug)]
pub struct LoginPageParams {
    pub action: Option<String>,
}

pub async fn home(
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    headers: HeaderMap,
) -> Response {
    log::trace!("home() called.");

    let (utente, catalog) = {
        let mut glob = glob.write().await;
        (glob.current_user(&headers), glob.catalog.clone())
    };

    let corsi_laurea = match catalog.corsi_laurea().await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error retrieving corsi di laurea: {}", &e);
            return html_500();
        },
    };

    let data = json!({
        "utente": utente.as_ref().map(utente_data),
        "corsi_laurea": corsi_laurea,
    });

    serve_template(StatusCode::OK, "home", &data, vec![])
}

pub async fn login_page(Query(params): Query<LoginPageParams>) -> Response {
    log::trace!("login_page( {:?} ) called.", &params);

    let message = match params.action.as_deref() {
        Some("error") => Some("Email o password errati."),
        Some("notactivated") => Some("L'account non è ancora stato attivato."),
        _ => None,
    };

    let data = json!({ "message": message });
    serve_template(StatusCode::OK, "login", &data, vec![])
}

pub async fn login(
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    headers: HeaderMap,
    Form(form): Form<LoginData>,
) -> Response {
    log::trace!("login( {:?} ) called.", &form);

    let res = glob.read().await.utenti.login(&form.email, &form.password).await;

    let u = match res {
        Err(e) => {
            log::error!("Error attempting login of {:?}: {}", &form.email, &e);
            return html_500();
        },
        Ok(LoginOutcome::Success(u)) => u,
        Ok(LoginOutcome::NotActivated) => {
            return Redirect::to("/login?action=notactivated").into_response();
        },
        Ok(LoginOutcome::Failed) => {
            return Redirect::to("/login?action=error").into_response();
        },
    };

    log::info!("{} ({}) logged in.", u.email(), u.kind());

    let id = {
        let mut glob = glob.write().await;
        if let Some(old_id) = session::session_id(&headers) {
            glob.sessions.invalidate(&old_id);
        }
        glob.sessions.create(Session::for_user(u))
    };

    Redirect::to("/home").add_headers(vec![
        (header::SET_COOKIE, session::set_cookie(&id)),
    ])
}

pub async fn logout(
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    headers: HeaderMap,
) -> Response {
    log::trace!("logout() called.");

    if let Some(id) = session::session_id(&headers) {
        if !glob.write().await.sessions.invalidate(&id) {
            log::debug!("Logout with unknown session id {:?}.", &id);
        }
    }

    Redirect::to("/home").add_headers(vec![
        (header::SET_COOKIE, session::clear_cookie()),
    ])
}
