//! Password-reset codes.
//!
//! Issues short-lived six-character codes linked to an email. Only the
//! SHA-256 hash of a code is kept; a code is single use and dies after
//! [`MAX_FAILED_ATTEMPTS`] wrong guesses, whether aimed at its email or made
//! with the code alone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;
use sha2::{Digest, Sha256};

use super::session::{bytes_to_hex, expiry};
use crate::config::MAX_TTL;

const CODE_LEN: usize = identity::forms::OTP_LEN;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResetError {
    #[error("Invalid or expired code.")]
    InvalidCode,
    #[error("Too many incorrect codes. Request a new one.")]
    TooManyAttempts,
}

#[must_use]
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            char::from(CODE_ALPHABET[idx])
        })
        .collect()
}

#[must_use]
pub fn hash_code(code: &str) -> String {
    bytes_to_hex(&Sha256::digest(code.as_bytes()))
}

#[derive(Debug)]
struct PendingReset {
    code_hash: String,
    expires_at: Instant,
    failed_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct ResetStore {
    pending: Arc<Mutex<HashMap<String, PendingReset>>>,
    ttl: Duration,
}

impl ResetStore {
    /// `ttl` is capped at [`MAX_TTL`].
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { pending: Arc::default(), ttl: ttl.min(MAX_TTL) }
    }

    /// Issue a fresh code for `email`, replacing any outstanding one.
    #[must_use]
    pub fn issue(&self, email: &str) -> String {
        self.issue_at(email, Instant::now())
    }

    fn issue_at(&self, email: &str, now: Instant) -> String {
        let code = generate_code();
        let pending = PendingReset { code_hash: hash_code(&code), expires_at: expiry(now, self.ttl), failed_attempts: 0 };
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(email.to_owned(), pending);
        code
    }

    /// Consume `code`, returning the email it was issued for. Without an
    /// email the code alone identifies the request, and a wrong guess counts
    /// against every outstanding code.
    ///
    /// # Errors
    ///
    /// Returns [`ResetError::InvalidCode`] for unknown, expired, or wrong
    /// codes and [`ResetError::TooManyAttempts`] once the attempt limit is
    /// reached.
    pub fn redeem(&self, email: Option<&str>, code: &str) -> Result<String, ResetError> {
        self.redeem_at(email, code, Instant::now())
    }

    fn redeem_at(&self, email: Option<&str>, code: &str, now: Instant) -> Result<String, ResetError> {
        let code = identity::forms::normalize_otp(code).ok_or(ResetError::InvalidCode)?;
        let code_hash = hash_code(&code);
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|_, entry| entry.expires_at > now);

        let Some(email) = email else {
            let owner = pending
                .iter()
                .find(|(_, entry)| entry.code_hash == code_hash)
                .map(|(email, _)| email.clone());
            if let Some(owner) = owner {
                pending.remove(&owner);
                return Ok(owner);
            }
            // The guess could have targeted any outstanding code.
            for entry in pending.values_mut() {
                entry.failed_attempts += 1;
            }
            let before = pending.len();
            pending.retain(|_, entry| entry.failed_attempts < MAX_FAILED_ATTEMPTS);
            if pending.len() < before {
                tracing::warn!(discarded = before - pending.len(), "reset codes discarded after repeated code-only failures");
            }
            return Err(ResetError::InvalidCode);
        };

        let entry = pending.get_mut(email).ok_or(ResetError::InvalidCode)?;
        if entry.code_hash == code_hash {
            pending.remove(email);
            return Ok(email.to_owned());
        }
        entry.failed_attempts += 1;
        if entry.failed_attempts >= MAX_FAILED_ATTEMPTS {
            pending.remove(email);
            tracing::warn!(%email, "reset code discarded after repeated failures");
            return Err(ResetError::TooManyAttempts);
        }
        Err(ResetError::InvalidCode)
    }
}

#[cfg(test)]
#[path = "reset_test.rs"]
mod tests;
