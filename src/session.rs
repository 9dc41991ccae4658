/*!
Server-side sessions.

A `Session` is a small key-value store; the `SessionStore` keeps them keyed
by a random id, which the browser carries in the `UNICLASS_SESSION` cookie.

Sessions that go unused for longer than the store's idle timeout are
dropped: `touch()` removes them when they are next asked for, and
`create()` sweeps out any that have piled up.
*/
use std::collections::HashMap;

use axum::http::header::{self, HeaderMap, HeaderValue};
use cookie::{Cookie, SameSite};
use rand::{distributions::Alphanumeric, Rng};
use time::{Duration, OffsetDateTime};

use crate::user::Utente;

/// Session key under which the logged-in user is kept.
pub const CURRENT_USER: &str = "currentSessionUser";
pub const COOKIE_NAME: &str = "UNICLASS_SESSION";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::minutes(30);
const ID_LENGTH: usize = 32;

#[derive(Clone, Debug, PartialEq)]
pub enum SessionValue {
    User(Utente),
}

#[derive(Clone, Debug, Default)]
pub struct Session {
    values: HashMap<String, SessionValue>,
}

impl Session {
    pub fn new() -> Self { Self::default() }

    /// A session with `u` already stored under `CURRENT_USER`.
    pub fn for_user(u: Utente) -> Self {
        let mut s = Self::new();
        s.set(CURRENT_USER, SessionValue::User(u));
        s
    }

    pub fn get(&self, key: &str) -> Option<&SessionValue> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: &str, val: SessionValue) -> Option<SessionValue> {
        self.values.insert(key.to_owned(), val)
    }

    pub fn current_user(&self) -> Option<&Utente> {
        match self.get(CURRENT_USER) {
            Some(SessionValue::User(u)) => Some(u),
            None => None,
        }
    }
}

#[derive(Debug)]
struct Entry {
    session: Session,
    last_seen: OffsetDateTime,
}

fn is_expired(last_seen: OffsetDateTime, now: OffsetDateTime, timeout: Duration) -> bool {
    now - last_seen >= timeout
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<String, Entry>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self { Self::new(DEFAULT_IDLE_TIMEOUT) }
}

fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LENGTH)
        .map(char::from)
        .collect()
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            idle_timeout,
        }
    }

    /// Store `session` under a fresh id, and return that id.
    pub fn create(&mut self, session: Session) -> String {
        self.create_at(session, OffsetDateTime::now_utc())
    }

    fn create_at(&mut self, session: Session, now: OffsetDateTime) -> String {
        let n_purged = self.purge_expired(now);
        if n_purged > 0 {
            log::debug!("Dropped {} expired sessions.", &n_purged);
        }

        let mut id = generate_id();
        while self.sessions.contains_key(&id) {
            id = generate_id();
        }
        log::trace!("SessionStore::create() -> {:?}", &id);

        self.sessions.insert(id.clone(), Entry { session, last_seen: now });
        id
    }

    /**
    The session under `id`, which is marked as just used. One that has
    been idle too long is removed instead.
    */
    pub fn touch(&mut self, id: &str) -> Option<&Session> {
        self.touch_at(id, OffsetDateTime::now_utc())
    }

    fn touch_at(&mut self, id: &str, now: OffsetDateTime) -> Option<&Session> {
        let expired = match self.sessions.get(id) {
            None => { return None; },
            Some(e) => is_expired(e.last_seen, now, self.idle_timeout),
        };
        if expired {
            log::debug!("Session {:?} expired.", id);
            self.sessions.remove(id);
            return None;
        }

        let e = self.sessions.get_mut(id)?;
        e.last_seen = now;
        Some(&e.session)
    }

    /// Returns whether there was such a session to remove.
    pub fn invalidate(&mut self, id: &str) -> bool {
        log::trace!("SessionStore::invalidate( {:?} ) called.", id);
        self.sessions.remove(id).is_some()
    }

    fn purge_expired(&mut self, now: OffsetDateTime) -> usize {
        let before = self.sessions.len();
        let timeout = self.idle_timeout;
        self.sessions.retain(|_, e| !is_expired(e.last_seen, now, timeout));
        before - self.sessions.len()
    }

    /// Number of sessions held, including any expired ones not yet swept.
    pub fn len(&self) -> usize { self.sessions.len() }

    pub fn is_empty(&self) -> bool { self.sessions.is_empty() }
}

/// Pull the session id out of the request's `Cookie` header(s), if any.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers.get_all(header::COOKIE).iter()
        .filter_map(|val| val.to_str().ok())
        .flat_map(|val| Cookie::split_parse(val))
        .filter_map(Result::ok)
        .find(|c| c.name() == COOKIE_NAME)
        .map(|c| c.value_trimmed().to_owned())
        .filter(|id| !id.is_empty())
}

/// The cookie that hands the browser session `id`.
pub fn session_cookie(id: &str) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, id.to_owned()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// The already-expired cookie that makes the browser forget its session.
pub fn expired_cookie() -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

/// `Set-Cookie` value for `session_cookie(id)`.
pub fn set_cookie(id: &str) -> HeaderValue {
    match HeaderValue::from_str(&session_cookie(id).to_string()) {
        Ok(v) => v,
        Err(e) => {
            log::error!("Session id {:?} makes an invalid header: {}", id, &e);
            clear_cookie()
        },
    }
}

/// `Set-Cookie` value for `expired_cookie()`.
pub fn clear_cookie() -> HeaderValue {
    match HeaderValue::from_str(&expired_cookie().to_string()) {
        Ok(v) => v,
        Err(_) => HeaderValue::from_static("UNICLASS_SESSION=; Path=/; Max-Age=0"),
    }
}
