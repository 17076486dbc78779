//! The persisted credential record and its change broadcast.
//!
//! SYSTEM CONTEXT
//! ==============
//! Two backend keys describe one session: `currentUser` holds the JSON record
//! and `token` mirrors the bearer token as a raw string for callers that only
//! need the header value. They are written and removed together under one
//! lock. Any record that does not decode, or whose keys disagree, is cleared
//! on read and reported as absent.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use identity::{Profile, Role};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::storage::{KeyValueStore, StoreError};

/// Backend key holding the JSON-encoded [`CredentialRecord`].
pub const SESSION_KEY: &str = "currentUser";
/// Backend key holding the raw bearer token.
pub const TOKEN_KEY: &str = "token";

const EVENT_CAPACITY: usize = 32;

/// Persisted form of an authenticated session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub email: String,
    pub role: Role,
    pub token: String,
}

impl CredentialRecord {
    #[must_use]
    pub fn new(token: impl Into<String>, profile: Profile) -> Self {
        Self { email: profile.email, role: profile.role, token: token.into() }
    }

    #[must_use]
    pub fn profile(&self) -> Profile {
        Profile::new(self.email.clone(), self.role)
    }
}

/// Why the record was removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearReason {
    /// The user logged out.
    SignedOut,
    /// A protected call was rejected with 401/403.
    Unauthorized,
    /// The stored record failed to decode or was inconsistent.
    Malformed,
}

/// Change notification published by [`CredentialStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Stored(CredentialRecord),
    Cleared(ClearReason),
}

/// Sole owner of the persisted credential record.
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { backend, lock: Mutex::new(()), events }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or persisted.
    pub fn write(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(record)?;
        {
            let _guard = self.guard();
            self.backend
                .set_all(&[(SESSION_KEY, encoded.as_str()), (TOKEN_KEY, record.token.as_str())])?;
        }
        tracing::debug!(email = %record.email, role = %record.role, "credential record stored");
        let _ = self.events.send(SessionEvent::Stored(record.clone()));
        Ok(())
    }

    /// Last written record, or `None` when absent or unusable.
    ///
    /// Undecodable content, in the record or in the backend itself, is
    /// removed and broadcast as [`ClearReason::Malformed`]. Any other backend
    /// read failure yields `None` without touching the stored keys.
    #[must_use]
    pub fn read(&self) -> Option<CredentialRecord> {
        {
            let _guard = self.guard();
            let problem = match (self.backend.get(SESSION_KEY), self.backend.get(TOKEN_KEY)) {
                (Ok(None), Ok(None)) => return None,
                (Ok(Some(raw)), Ok(Some(token))) => match serde_json::from_str::<CredentialRecord>(&raw) {
                    Ok(record) if !record.token.is_empty() && record.token == token => return Some(record),
                    Ok(_) => "token does not match record".to_owned(),
                    Err(e) => e.to_string(),
                },
                (Ok(_), Ok(_)) => "record and token keys out of step".to_owned(),
                (Err(StoreError::Corrupt(detail)), _) | (_, Err(StoreError::Corrupt(detail))) => detail,
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(error = %e, "credential store unreadable");
                    return None;
                }
            };

            tracing::warn!(detail = %problem, "discarding malformed credential record");
            if let Err(e) = self.backend.remove_all(&[SESSION_KEY, TOKEN_KEY]) {
                tracing::warn!(error = %e, "failed to clear malformed credential record");
                return None;
            }
        }
        let _ = self.events.send(SessionEvent::Cleared(ClearReason::Malformed));
        None
    }

    /// Bearer token of the stored record.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.read().map(|record| record.token)
    }

    /// Remove the stored record. Returns whether anything was removed; only
    /// an effective clear is broadcast.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn clear(&self, reason: ClearReason) -> Result<bool, StoreError> {
        let removed = {
            let _guard = self.guard();
            let present = self.backend.get(SESSION_KEY).ok().flatten().is_some()
                || self.backend.get(TOKEN_KEY).ok().flatten().is_some();
            self.backend.remove_all(&[SESSION_KEY, TOKEN_KEY])?;
            present
        };
        if removed {
            tracing::info!(?reason, "credential record cleared");
            let _ = self.events.send(SessionEvent::Cleared(reason));
        }
        Ok(removed)
    }

    /// Receive every subsequent [`SessionEvent`].
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").field("subscribers", &self.events.receiver_count()).finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;
