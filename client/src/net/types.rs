//! Outcome types for calls against the authentication provider.
//!
//! DESIGN
//! ======
//! Every provider interaction resolves to an [`AuthResult`]. Transport and
//! decoding failures are folded into [`AuthError::Network`] and
//! [`AuthError::Server`] so callers never handle a raw `reqwest::Error`.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use identity::{Profile, ValidationErrors};

use crate::state::storage::StoreError;

/// Failure of an auth or protected-resource call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Input rejected before any network call, or by the provider with 400.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("Email already registered.")]
    EmailAlreadyRegistered,
    /// Missing session locally, or a 401/403 from a protected call.
    #[error("Unauthorized")]
    Unauthorized,
    /// Transport failure or timeout.
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx reply, or a 2xx body that did not decode.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// The credential backend could not be written.
    #[error("credential storage failed: {0}")]
    Storage(String),
}

impl AuthError {
    /// Transient failures worth offering a retry for. These never clear a
    /// valid session.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::form(message))
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network("request timed out".into())
        } else if err.is_decode() {
            Self::Server { status: err.status().map_or(200, |s| s.as_u16()), message: "malformed response body".into() }
        } else {
            Self::Network(err.to_string())
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Successful login: the bearer token and the profile it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub profile: Profile,
}
