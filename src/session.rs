//! Per-browser settings, keyed by a cookie.
//!
//! The backend URL is the only value that outlives a single request. Each
//! browser gets its own entry; nothing is shared between sessions.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use tracing::debug;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "glaucoma_agent_session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub server_url: String,
}

impl SessionConfig {
    pub fn new(server_url: &str) -> Self {
        Self {
            server_url: server_url.trim().to_string(),
        }
    }

    pub fn set_server_url(&mut self, server_url: &str) {
        self.server_url = server_url.trim().to_string();
    }

    pub fn has_server_url(&self) -> bool {
        !self.server_url.is_empty()
    }
}

struct SessionEntry {
    config: SessionConfig,
    last_seen: Instant,
}

/// Sessions kept at once; the least recently seen one is evicted beyond this.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

pub struct SessionStore {
    default_server_url: String,
    ttl: Duration,
    max_sessions: usize,
    entries: Mutex<HashMap<Uuid, SessionEntry>>,
}

impl SessionStore {
    pub fn new(default_server_url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            default_server_url: default_server_url.into(),
            ttl,
            max_sessions: DEFAULT_MAX_SESSIONS,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn default_server_url(&self) -> &str {
        &self.default_server_url
    }

    /// Settings for the caller. Unknown or expired ids get the default URL;
    /// reading never creates an entry.
    pub fn get(&self, id: Option<Uuid>) -> SessionConfig {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        id.and_then(|id| entries.get_mut(&id))
            .filter(|entry| now.duration_since(entry.last_seen) <= self.ttl)
            .map(|entry| {
                entry.last_seen = now;
                entry.config.clone()
            })
            .unwrap_or_else(|| SessionConfig::new(&self.default_server_url))
    }

    /// Stores the caller's server URL, starting a session when the id is
    /// missing, unknown or expired. Returns the id the browser should keep.
    pub fn update_server_url(&self, id: Option<Uuid>, server_url: &str) -> (Uuid, SessionConfig) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let live = id.filter(|id| {
            entries
                .get(id)
                .is_some_and(|entry| now.duration_since(entry.last_seen) <= self.ttl)
        });

        let id = match live {
            Some(id) => id,
            None => {
                self.prune(&mut entries, now);
                let id = Uuid::new_v4();
                entries.insert(
                    id,
                    SessionEntry {
                        config: SessionConfig::new(&self.default_server_url),
                        last_seen: now,
                    },
                );
                debug!(session = %id, active = entries.len(), "session started");
                id
            }
        };

        let config = match entries.get_mut(&id) {
            Some(entry) => {
                entry.config.set_server_url(server_url);
                entry.last_seen = now;
                entry.config.clone()
            }
            None => SessionConfig::new(server_url),
        };
        (id, config)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries, then makes room for one more under the cap.
    fn prune(&self, entries: &mut HashMap<Uuid, SessionEntry>, now: Instant) {
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.last_seen) <= self.ttl);

        while entries.len() >= self.max_sessions {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    entries.remove(&id);
                }
                None => break,
            }
        }

        let pruned = before - entries.len();
        if pruned > 0 {
            debug!(pruned, "sessions dropped");
        }
    }
}

pub fn session_id(req: &HttpRequest) -> Option<Uuid> {
    req.cookie(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

pub fn session_cookie(id: Uuid) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, id.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: &str = "https://backend.example";

    #[test]
    fn reading_unknown_session_creates_nothing() {
        let store = SessionStore::new(DEFAULT, Duration::from_secs(60));
        assert_eq!(store.get(None).server_url, DEFAULT);
        assert_eq!(store.get(Some(Uuid::new_v4())).server_url, DEFAULT);

        for _ in 0..1_000 {
            store.get(None);
        }
        assert!(store.is_empty());
    }

    #[test]
    fn server_url_is_trimmed_and_kept_per_session() {
        let store = SessionStore::new(DEFAULT, Duration::from_secs(60));
        let (alice, updated) = store.update_server_url(None, "  http://colab:5000/  ");
        assert_eq!(updated.server_url, "http://colab:5000/");

        let (again, _) = store.update_server_url(Some(alice), "http://colab:6000");
        assert_eq!(again, alice);
        assert_eq!(store.len(), 1);

        assert_eq!(store.get(Some(alice)).server_url, "http://colab:6000");
        assert_eq!(store.get(None).server_url, DEFAULT);
    }

    #[test]
    fn store_stays_bounded_under_many_new_sessions() {
        let store = SessionStore::new(DEFAULT, Duration::from_secs(3600)).with_max_sessions(100);
        let mut ids = Vec::new();
        for i in 0..5_000 {
            let (id, _) = store.update_server_url(None, &format!("http://host-{i}"));
            ids.push(id);
        }

        assert_eq!(store.len(), 100);
        let newest = ids[ids.len() - 1];
        assert_eq!(store.get(Some(newest)).server_url, "http://host-4999");
        assert_eq!(store.get(Some(ids[0])).server_url, DEFAULT);
    }

    #[test]
    fn blank_url_is_stored_but_flagged() {
        let mut config = SessionConfig::new(DEFAULT);
        config.set_server_url("   ");
        assert!(!config.has_server_url());
    }

    #[test]
    fn expired_sessions_are_replaced_and_pruned() {
        let store = SessionStore::new(DEFAULT, Duration::ZERO);
        let (first, _) = store.update_server_url(None, "http://first");
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(store.get(Some(first)).server_url, DEFAULT);
        let (second, _) = store.update_server_url(Some(first), "http://second");
        assert_ne!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn cookie_round_trips_the_id() {
        let id = Uuid::new_v4();
        let cookie = session_cookie(id);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(Uuid::parse_str(cookie.value()).ok(), Some(id));
        assert_eq!(cookie.http_only(), Some(true));
    }
}
