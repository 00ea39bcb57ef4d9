//! Server-side sessions keyed by an opaque cookie.
//!
//! Only ids this store issued are honoured; an unknown or expired cookie is
//! treated as no session. Entries idle longer than the timeout are dropped on
//! access and by [`SessionStore::evict_expired`].

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

/// What the proxy remembers about one browser.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub access: Option<String>,
    pub refresh: Option<String>,
    /// One-shot message shown on the next page render.
    pub flash: Option<String>,
}

#[derive(Debug)]
struct Entry {
    session: Session,
    last_seen: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    cookie_name: String,
    idle_timeout: Duration,
    sessions: Arc<DashMap<String, Entry>>,
}

impl SessionStore {
    pub fn new(cookie_name: impl Into<String>, idle_timeout: Duration) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            idle_timeout,
            sessions: Arc::new(DashMap::new()),
        }
    }

    fn expired(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_seen) > self.idle_timeout
    }

    /// A live session by id, refreshing its idle clock. Expired entries are removed.
    fn get_at(&self, id: &str, now: Instant) -> Option<Session> {
        let session = {
            let mut entry = self.sessions.get_mut(id)?;
            if self.expired(&entry, now) {
                None
            } else {
                entry.last_seen = now;
                Some(entry.session.clone())
            }
        };
        if session.is_none() {
            self.sessions.remove(id);
        }
        session
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.get_at(id, Instant::now())
    }

    fn insert_at(&self, id: &str, session: Session, now: Instant) {
        self.sessions.insert(
            id.to_string(),
            Entry {
                session,
                last_seen: now,
            },
        );
    }

    pub fn insert(&self, id: &str, session: Session) {
        self.insert_at(id, session, Instant::now());
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.remove(id).map(|(_, e)| e.session)
    }

    fn take_flash_by_id(&self, id: &str) -> Option<String> {
        self.sessions.get_mut(id)?.session.flash.take()
    }

    fn evict_expired_at(&self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| !self.expired(entry, now));
        before.saturating_sub(self.sessions.len())
    }

    /// Drop every idle session. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// The cookie's session id, if it names a live session.
    fn session_id(&self, cookies: &Cookies) -> Option<String> {
        let id = cookies.get(&self.cookie_name)?.value().to_string();
        self.get(&id).map(|_| id)
    }

    fn issue(&self, cookies: &Cookies, session: Session) {
        let id = Uuid::new_v4().simple().to_string();
        let mut cookie = Cookie::new(self.cookie_name.clone(), id.clone());
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookies.add(cookie);
        self.insert(&id, session);
    }

    /// The browser's session, or an empty one.
    pub fn load(&self, cookies: &Cookies) -> Session {
        cookies
            .get(&self.cookie_name)
            .and_then(|c| self.get(c.value()))
            .unwrap_or_default()
    }

    /// Store `session` under the browser's id, issuing a fresh id if the
    /// cookie is missing or names no live session.
    pub fn save(&self, cookies: &Cookies, session: Session) {
        match self.session_id(cookies) {
            Some(id) => self.insert(&id, session),
            None => self.issue(cookies, session),
        }
    }

    /// Replace the browser's session under a brand new id. Used on login so a
    /// pre-login id never carries credentials.
    pub fn rotate(&self, cookies: &Cookies, session: Session) {
        if let Some(old) = cookies.get(&self.cookie_name) {
            self.remove(old.value());
        }
        self.issue(cookies, session);
    }

    /// Take and clear the pending flash message.
    pub fn take_flash(&self, cookies: &Cookies) -> Option<String> {
        let id = self.session_id(cookies)?;
        self.take_flash_by_id(&id)
    }

    pub fn set_flash(&self, cookies: &Cookies, message: impl Into<String>) {
        let mut session = self.load(cookies);
        session.flash = Some(message.into());
        self.save(cookies, session);
    }

    /// Forget the session and expire its cookie.
    pub fn clear(&self, cookies: &Cookies) {
        if let Some(old) = cookies.get(&self.cookie_name) {
            self.remove(old.value());
        }
        let mut cookie = Cookie::new(self.cookie_name.clone(), "");
        cookie.set_path("/");
        cookies.remove(cookie);
    }
}
