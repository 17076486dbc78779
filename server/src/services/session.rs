//! Bearer session tokens.
//!
//! ARCHITECTURE
//! ============
//! Tokens are 32 random bytes rendered as hex and map to the owning account's
//! normalized email. Every token carries an absolute expiry; expired tokens
//! are dropped the first time they are presented.
//!
//! TRADE-OFFS
//! ==========
//! Sessions live in process memory, so a restart signs everyone out.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::MAX_TTL;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// `now + ttl`, saturating at `now + MAX_TTL`.
pub(crate) fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now)
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

#[derive(Debug, Clone)]
struct SessionEntry {
    email: String,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    ttl: Duration,
}

impl SessionStore {
    /// `ttl` is capped at [`MAX_TTL`].
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { sessions: Arc::default(), ttl: ttl.min(MAX_TTL) }
    }

    /// Create a session for `email`, returning the token.
    #[must_use]
    pub fn create(&self, email: &str) -> String {
        self.create_at(email, Instant::now())
    }

    fn create_at(&self, email: &str, now: Instant) -> String {
        let token = generate_token();
        let entry = SessionEntry { email: email.to_owned(), expires_at: expiry(now, self.ttl) };
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), entry);
        token
    }

    /// Email owning `token`, or `None` if the token is unknown or expired.
    #[must_use]
    pub fn validate(&self, token: &str) -> Option<String> {
        self.validate_at(token, Instant::now())
    }

    fn validate_at(&self, token: &str, now: Instant) -> Option<String> {
        {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            let entry = sessions.get(token)?;
            if entry.expires_at > now {
                return Some(entry.email.clone());
            }
        }
        tracing::debug!("dropping expired session");
        self.delete(token);
        None
    }

    /// Delete a session by token. Unknown tokens are ignored.
    pub fn delete(&self, token: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
            .is_some()
    }

    /// Revoke every session owned by `email` except `keep`, returning how
    /// many were removed.
    pub fn revoke_user(&self, email: &str, keep: Option<&str>) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|token, entry| entry.email != email || keep == Some(token.as_str()));
        before - sessions.len()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
