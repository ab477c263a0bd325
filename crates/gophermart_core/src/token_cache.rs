//! crates/gophermart_core/src/token_cache.rs
//!
//! In-process cache of authenticated sessions, keyed by the opaque token handed
//! out at login. Every authenticated request performs one lookup here, so the
//! read path only ever takes the shared side of the lock.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// A live login session.
#[derive(Debug, Clone)]
pub struct Session {
    pub login: String,
    pub token: String,
    pub last_active: Instant,
}

/// Outcome of looking a token up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLookup {
    Valid(String),
    NotFound,
    /// The session exists but outlived the cache lifetime. It stays in the map
    /// until the next sweep.
    Expired,
}

impl TokenLookup {
    pub fn login(self) -> Option<String> {
        match self {
            TokenLookup::Valid(login) => Some(login),
            TokenLookup::NotFound | TokenLookup::Expired => None,
        }
    }
}

/// Token to session map with time-based expiry.
///
/// A session is valid while `now - last_active <= lifetime`. Stale entries are
/// reported as [`TokenLookup::Expired`] on read and physically removed by
/// [`TokenCache::house_keeper`].
#[derive(Debug)]
pub struct TokenCache {
    sessions: RwLock<HashMap<String, Session>>,
    lifetime: Duration,
}

impl TokenCache {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Inserts or overwrites the session for `token`, stamping it with the current time.
    pub fn store_token(&self, login: &str, token: &str) {
        let session = Session {
            login: login.to_string(),
            token: token.to_string(),
            last_active: Instant::now(),
        };
        self.write().insert(session.token.clone(), session);
        debug!(login, "Stored session token");
    }

    pub fn get_token_user(&self, token: &str) -> TokenLookup {
        let now = Instant::now();
        let sessions = self.read();
        match sessions.get(token) {
            None => TokenLookup::NotFound,
            Some(session) if self.is_stale(session, now) => {
                debug!(login = %session.login, "Session token expired");
                TokenLookup::Expired
            }
            Some(session) => TokenLookup::Valid(session.login.clone()),
        }
    }

    /// Drops the session for `token`. Returns whether one was present.
    pub fn remove_token(&self, token: &str) -> bool {
        self.write().remove(token).is_some()
    }

    /// Restarts the lifetime of an existing session. Never creates one, so a token
    /// removed by logout or a sweep stays gone. Returns whether the session was present.
    pub fn refresh_token(&self, token: &str) -> bool {
        match self.write().get_mut(token) {
            Some(session) => {
                session.last_active = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Removes every session that is stale at call time and returns how many were removed.
    ///
    /// The scan runs under the shared lock; each removal takes the exclusive lock
    /// on its own and re-checks the entry, so a token re-stored mid-sweep survives.
    pub fn house_keeper(&self) -> usize {
        let now = Instant::now();
        self.collect_stale(now)
            .into_iter()
            .filter(|token| self.remove_if_stale(token, now))
            .count()
    }

    fn collect_stale(&self, now: Instant) -> Vec<String> {
        self.read()
            .values()
            .filter(|session| self.is_stale(session, now))
            .map(|session| session.token.clone())
            .collect()
    }

    fn remove_if_stale(&self, token: &str, now: Instant) -> bool {
        let mut sessions = self.write();
        let still_stale = sessions
            .get(token)
            .is_some_and(|session| self.is_stale(session, now));
        if !still_stale {
            return false;
        }
        match sessions.remove(token) {
            Some(session) => {
                debug!(login = %session.login, "Housekeeper removed expired session");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn is_stale(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.last_active) > self.lifetime
    }

    // No code path panics while holding the lock, and every write leaves the map
    // consistent, so a poisoned lock is safe to keep using.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}
