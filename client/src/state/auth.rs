//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Used by the route guard and the navigation controller to decide what the
//! current user may see. Resolution always goes back to the credential store;
//! nothing here caches identity.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::Arc;

use identity::{Profile, Role};

use super::credentials::{CredentialRecord, CredentialStore};

/// Who is asking. The token and profile exist together or not at all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated { token: String, profile: Profile },
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { profile, .. } => Some(profile),
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { token, .. } => Some(token),
        }
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.profile().map(|p| p.role)
    }
}

impl From<CredentialRecord> for Session {
    fn from(record: CredentialRecord) -> Self {
        let profile = record.profile();
        Self::Authenticated { token: record.token, profile }
    }
}

/// Derives the current [`Session`] from the credential store on demand.
#[derive(Clone, Debug)]
pub struct SessionResolver {
    store: Arc<CredentialStore>,
}

impl SessionResolver {
    #[must_use]
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }

    /// Session described by the stored record. Malformed records resolve to
    /// [`Session::Anonymous`] and are cleared by the store.
    #[must_use]
    pub fn current(&self) -> Session {
        self.store.read().map_or(Session::Anonymous, Session::from)
    }

    #[must_use]
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }
}
