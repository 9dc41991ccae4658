/*!
Interoperation between the client (user) and server.

(Not the application and the database; that's covered by `auth`, `catalog`,
`registry` and `store`.)
*/
use std::{
    fmt::Debug,
    path::Path,
    sync::Arc,
};

use axum::{
    extract::Extension,
    http::StatusCode,
    http::header::{HeaderName, HeaderValue},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use handlebars::Handlebars;
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::config::Glob;
use crate::user::Utente;

pub mod admin;
pub mod login;
pub mod orari;

static TEMPLATES: OnceCell<Handlebars> = OnceCell::new();

static HTML_500: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>UniClass | Errore</title>
<link rel="stylesheet" href="/static/uniclass.css">
</head>
<body>
<h1>Internal Server Error</h1>
<p>(Error 500)</p>
<p>Something went wrong on our end. No further or more
helpful information is available about the problem.</p>
</body>
</html>"#;

static TEXT_500: &str = "An internal error occurred; an appropriate response was inconstructable.";

trait AddHeaders: IntoResponse + Sized {
    fn add_headers(self, mut new_headers: Vec<(HeaderName, HeaderValue)>) -> Response {
        let mut r = self.into_response();
        let r_headers = r.headers_mut();
        for (name, value) in new_headers.drain(..) {
            r_headers.insert(name, value);
        }

        r
    }
}

impl<T: IntoResponse + Sized> AddHeaders for T {}

/**
Initializes the resources used in this module. This function should be called
before any functionality of this module or any of its submodules is used.

Currently the only thing that happens here is loading the templates used by
`serve_template()`, which will respond with a 500 unless `init()` has been
called first.

The argument is the path to the directory where the templates used by
`serve_template()` can be found.
*/
pub fn init<P: AsRef<Path>>(template_dir: P) -> Result<(), String> {
    if TEMPLATES.get().is_some() {
        log::warn!("Templates directory already initialized; ignoring.");
        return Ok(())
    }

    let template_dir = template_dir.as_ref();

    let mut h = Handlebars::new();
    #[cfg(debug_assertions)]
    h.set_dev_mode(true);
    h.register_templates_directory(".html", template_dir)
        .map_err(|e| format!(
            "Error registering templates directory {}: {}",
            template_dir.display(), &e
        ))?;

    TEMPLATES.set(h)
        .map_err(|old_h| {
            let mut estr = String::from("Templates directory already registered w/templates:");
            for template_name in old_h.get_templates().keys() {
                estr.push('\n');
                estr.push_str(template_name.as_str());
            }
            estr
        })?;

    Ok(())
}

/// All the routes this application answers, minus static files.
pub fn router(glob: Arc<RwLock<Glob>>) -> Router {
    Router::new()
        .route("/", get(login::home))
        .route("/home", get(login::home))
        .route("/login", get(login::login_page).post(login::login))
        .route("/logout", get(login::logout).post(login::logout))
        .route("/orario", get(orari::orario).post(orari::orario))
        .route("/edificio", get(orari::edificio).post(orari::edificio))
        .route("/edifici", get(orari::edifici))
        .route("/resti", get(orari::resti))
        .route("/anni", get(orari::anni))
        .route("/corsi", get(orari::corsi))
        .route("/admin", post(admin::api))
        .layer(Extension(glob))
}

/**
Return an HTML response in the case of an unrecoverable* error.

(*"Unrecoverable" from the perspective of fielding the current request,
not from the perspective of the program crashing.)
*/
pub fn html_500() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(HTML_500)
    ).into_response()
}

pub fn text_500(text: Option<String>) -> Response {
    match text {
        Some(text) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            text
        ).into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            TEXT_500.to_owned()
        ).into_response()
    }
}

pub fn serve_template<S>(
    code: StatusCode,
    template_name: &str,
    data: &S,
    addl_headers: Vec<(HeaderName, HeaderValue)>
) -> Response
where
    S: Serialize + Debug
{
    log::trace!("serve_template( {}, {:?}, ... ) called.", &code, template_name);

    let templates = match TEMPLATES.get() {
        Some(t) => t,
        None => {
            log::error!("serve_template() called before inter::init().");
            return html_500();
        },
    };

    match templates.render(template_name, data) {
        Ok(response_body) => (
            code,
            Html(response_body)
        ).add_headers(addl_headers),
        Err(e) => {
            log::error!(
                "Error rendering template {:?} with data {:?}:\n{}",
                template_name, data, &e
            );
            html_500()
        },
    }
}

/// An HTML error page for errors that are the client's doing.
pub fn html_error(code: StatusCode, msg: &str) -> Response {
    log::trace!("html_error( {}, {:?} ) called.", &code, msg);

    let data = json!({
        "code": code.as_u16(),
        "reason": code.canonical_reason().unwrap_or(""),
        "message": msg,
    });

    serve_template(code, "error", &data, vec![])
}

pub fn respond_bad_request(msg: String) -> Response {
    log::trace!("respond_bad_request( {:?} ) called.", &msg);

    (
        StatusCode::BAD_REQUEST,
        msg
    ).into_response()
}

/// What the page templates get to know about the logged-in user.
fn utente_data(u: &Utente) -> serde_json::Value {
    json!({
        "nome": u.nome(),
        "cognome": u.cognome(),
        "email": u.email(),
        "kind": u.kind(),
        "personale": u.is_personale_ta(),
    })
}

/// Fetch a required form/query parameter, or produce a 400 response.
fn require_param<'a>(val: &'a Option<String>, name: &str) -> Result<&'a str, Response> {
    match val.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(respond_bad_request(
            format!("Request requires a {:?} parameter.", name)
        )),
    }
}
