use crate::error::Result;
use crate::filter::DateRange;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

const SESSION_COOKIE: &str = "session";

/// Per-user state carried between requests.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    /// ISO `YYYY-MM-DD`, as submitted by the period picker.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Name of the last report written for this session. Concurrent
    /// requests in one session can race on this; last writer wins.
    pub report_file: Option<String>,
}

/// Cookie-keyed session storage.
///
/// Owned by the application state rather than a process-global so the core
/// pipeline can be handed explicit criteria and tests can build isolated
/// stores.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<String, SessionData>>,
}

impl SessionStore {
    pub fn new() -> SessionStore {
        SessionStore::default()
    }

    /// Return the request's session id, creating a session (and its cookie)
    /// when the client has none yet.
    pub fn ensure(&self, jar: CookieJar) -> (CookieJar, String) {
        if let Some(cookie) = jar.get(SESSION_COOKIE) {
            let id = cookie.value().to_string();
            if self.inner.read().expect("session lock").contains_key(&id) {
                return (jar, id);
            }
        }
        let id = Uuid::new_v4().to_string();
        self.inner
            .write()
            .expect("session lock")
            .insert(id.clone(), SessionData::default());
        let mut cookie = Cookie::new(SESSION_COOKIE, id.clone());
        cookie.set_path("/");
        (jar.add(cookie), id)
    }

    /// Snapshot of the session's data (empty defaults for unknown ids).
    pub fn get(&self, id: &str) -> SessionData {
        self.inner
            .read()
            .expect("session lock")
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Mutate the session's data in place.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut SessionData)) {
        let mut sessions = self.inner.write().expect("session lock");
        f(sessions.entry(id.to_string()).or_default());
    }

    /// The session's selected period as a validated range.
    ///
    /// `None` unless both bounds are set; malformed or inverted dates are a
    /// range-validation error.
    pub fn period(&self, id: &str) -> Result<Option<DateRange>> {
        let data = self.get(id);
        match (data.start_date, data.end_date) {
            (Some(start), Some(end)) => Ok(Some(DateRange::parse(&start, &end)?)),
            _ => Ok(None),
        }
    }
}
