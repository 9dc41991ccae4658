/*!
Structs to hold configuration data and global variables.
*/
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::header::HeaderMap;
use serde::Deserialize;
use time::Duration;

use crate::{
    auth::UtenteService,
    catalog::Catalog,
    registry::{self, Registry},
    session::{self, SessionStore},
    store::Store,
    user::{PersonaleTA, Utente},
};

/// One year.
const MAX_SESSION_TIMEOUT_MINUTES: i64 = 60 * 24 * 365;

#[derive(Deserialize)]
struct ConfigFile {
    data_db_connect_string: Option<String>,
    admin_email: Option<String>,
    admin_password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    templates_dir: Option<PathBuf>,
    static_dir: Option<PathBuf>,
    session_timeout_minutes: Option<i64>,
}

#[derive(Debug)]
pub struct Cfg {
    pub data_db_connect_string: String,
    pub default_admin_email: String,
    pub default_admin_password: String,
    pub addr: SocketAddr,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
    /// How long a session may sit unused before it's dropped.
    pub session_timeout: Duration,
}

impl std::default::Default for Cfg {
    fn default() -> Self {
        Self {
            data_db_connect_string: "host=localhost user=uniclass password='uniclass' dbname=uniclass".to_owned(),
            default_admin_email: "admin@unisa.it".to_owned(),
            default_admin_password: "passwordSicura".to_owned(),
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080),
            templates_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
            session_timeout: session::DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl Cfg {
    pub fn from_toml(text: &str) -> Result<Self, String> {
        let cf: ConfigFile = toml::from_str(text)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.data_db_connect_string {
            c.data_db_connect_string = s;
        }
        if let Some(s) = cf.admin_email {
            c.default_admin_email = s;
        }
        if let Some(s) = cf.admin_password {
            c.default_admin_password = s;
        }
        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse().map_err(|e| format!(
                    "Error parsing {:?} as IP address: {}",
                    &s, &e
                ))?
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(p) = cf.templates_dir {
            c.templates_dir = p;
        }
        if let Some(p) = cf.static_dir {
            c.static_dir = p;
        }
        if let Some(n) = cf.session_timeout_minutes {
            if !(1..=MAX_SESSION_TIMEOUT_MINUTES).contains(&n) {
                return Err(format!(
                    "session_timeout_minutes must be between 1 and {} (got {}).",
                    &MAX_SESSION_TIMEOUT_MINUTES, &n
                ));
            }
            c.session_timeout = Duration::minutes(n);
        }

        Ok(c)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Unable to read config file: {}", &e))?;
        Self::from_toml(&file_contents)
    }

    /// Like `from_file()`, but a file that isn't there just means defaults.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "Config file {} not found; using default configuration.",
                path.display()
            );
            Ok(Self::default())
        }
    }
}

/**
This guy will haul around some global variables and be passed in an
`axum::Extension` to the handlers who need him.
*/
pub struct Glob {
    pub addr: SocketAddr,
    pub utenti: UtenteService,
    pub catalog: Arc<dyn Catalog>,
    pub registry: Arc<dyn Registry>,
    pub sessions: SessionStore,
}

impl std::fmt::Debug for Glob {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Glob")
            .field("addr", &self.addr)
            .field("utenti", &self.utenti)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl Glob {
    pub fn new(
        addr: SocketAddr,
        utenti: UtenteService,
        catalog: Arc<dyn Catalog>,
        registry: Arc<dyn Registry>,
        session_timeout: Duration,
    ) -> Self {
        Self {
            addr,
            utenti,
            catalog,
            registry,
            sessions: SessionStore::new(session_timeout),
        }
    }

    /**
    The logged-in user associated with the request's session cookie.

    This counts as use of the session, so it needs `&mut self`; an expired
    session is dropped here.
    */
    pub fn current_user(&mut self, headers: &HeaderMap) -> Option<Utente> {
        let id = session::session_id(headers)?;
        self.sessions.touch(&id)
            .and_then(|s| s.current_user())
            .cloned()
    }
}

/// Ensure the default staff admin exists, inserting it if not.
pub async fn ensure_default_admin(
    reg: &dyn Registry,
    email: &str,
    password: &str,
) -> Result<(), String> {
    log::trace!("Checking existence of default admin {:?}...", email);

    match reg.personale_by_email(email).await {
        Err(e) => Err(format!(
            "Error attempting to check existence of default admin ({}): {}",
            email, &e
        )),
        Ok(Some(p)) => {
            if p.password.as_deref() != Some(password) {
                log::warn!("Default admin ({}) not using default password.", email);
            }
            log::trace!("Default admin OK.");
            Ok(())
        },
        Ok(None) => {
            log::info!("Default admin ({}) doesn't exist; inserting.", email);
            let admin = PersonaleTA {
                id: 0,
                nome: "Amministratore".to_owned(),
                cognome: "UniClass".to_owned(),
                email: email.to_owned(),
                password: Some(password.to_owned()),
                telefono: None,
            };
            registry::register_personale(reg, &admin).await
                .map(|_| ())
                .map_err(|e| format!("Error inserting default admin: {}", &e))
        },
    }
}

/// Loads system configuration and ensures all appropriate database tables
/// exist.
///
/// Also assures existence of default admin.
pub async fn load_configuration(cfg: &Cfg) -> Result<Glob, String> {
    log::trace!("Checking state of data DB...");
    let store = Arc::new(Store::new(cfg.data_db_connect_string.clone()));
    if let Err(e) = store.ensure_db_schema().await {
        let estr = format!("Unable to ensure state of data DB: {}", &e);
        return Err(estr);
    }
    log::trace!("...data DB okay.");

    ensure_default_admin(
        store.as_ref(),
        &cfg.default_admin_email,
        &cfg.default_admin_password,
    ).await?;

    let glob = Glob::new(
        cfg.addr,
        UtenteService::from_store(store.clone()),
        store.clone(),
        store,
        cfg.session_timeout,
    );

    Ok(glob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{personale, FakeRegistry};

    #[test]
    fn partial_config_keeps_defaults() {
        let c = Cfg::from_toml(r#"
            port = 9000
            admin_email = "root@unisa.it"
        "#).unwrap();

        assert_eq!(c.addr.port(), 9000);
        assert_eq!(c.default_admin_email, "root@unisa.it");
        assert_eq!(c.default_admin_password, Cfg::default().default_admin_password);
        assert_eq!(c.templates_dir, PathBuf::from("templates"));
    }

    #[test]
    fn session_timeout_setting() {
        assert_eq!(Cfg::default().session_timeout, Duration::minutes(30));

        let c = Cfg::from_toml("session_timeout_minutes = 5").unwrap();
        assert_eq!(c.session_timeout, Duration::minutes(5));

        assert!(Cfg::from_toml("session_timeout_minutes = 0").is_err());
        assert!(Cfg::from_toml("session_timeout_minutes = 9223372036854775807").is_err());
    }

    #[test]
    fn bad_host_is_an_error() {
        assert!(Cfg::from_toml("host = \"not an address\"").is_err());
    }

    #[test]
    fn missing_file_means_defaults() {
        let c = Cfg::from_file_or_default("test/no_such_config.toml").unwrap();
        assert_eq!(c.addr, Cfg::default().addr);
    }

    #[tokio::test]
    async fn default_admin_inserted_once() {
        let reg = FakeRegistry::default();
        ensure_default_admin(&reg, "admin@unisa.it", "passwordSicura").await.unwrap();
        ensure_default_admin(&reg, "admin@unisa.it", "passwordSicura").await.unwrap();

        let personale = reg.personale().await.unwrap();
        assert_eq!(personale.len(), 1);
        assert_eq!(personale[0].password.as_deref(), Some("passwordSicura"));
    }

    #[tokio::test]
    async fn existing_admin_left_alone() {
        let reg = FakeRegistry::with_personale(vec![
            personale("admin@unisa.it", Some("cambiata")),
        ]);
        ensure_default_admin(&reg, "admin@unisa.it", "passwordSicura").await.unwrap();

        let personale = reg.personale().await.unwrap();
        assert_eq!(personale.len(), 1);
        assert_eq!(personale[0].password.as_deref(), Some("cambiata"));
    }
}
