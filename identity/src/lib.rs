//! Shared identity model, wire bodies, and input policy for Scribe auth.
//!
//! This crate owns the representation of "who is signed in" used by both the
//! `server` (authentication provider) and the `client` (session controller).
//! Keeping the password policy here means both sides reject exactly the same
//! inputs.

pub mod forms;
pub mod password;
pub mod wire;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use forms::{Field, FieldError, ValidationErrors};
pub use password::{PasswordRule, PolicyMode};

/// Authorization role assigned by the authentication provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account holder.
    #[default]
    User,
    /// Account allowed into the admin console.
    Admin,
}

impl Role {
    /// Wire spelling of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by [`Role::from_str`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

/// Public profile of an authenticated account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub email: String,
    /// Missing roles decode as [`Role::User`]; older provider builds omit it.
    #[serde(default)]
    pub role: Role,
}

impl Profile {
    #[must_use]
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self { email: email.into(), role }
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
