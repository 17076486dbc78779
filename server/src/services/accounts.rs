//! Account registry and password verification.
//!
//! DESIGN
//! ======
//! Accounts are keyed by normalized email. Passwords are stored as argon2id
//! PHC strings; hashing and verification run on the blocking pool because a
//! single hash costs tens of milliseconds at the default parameters.
//!
//! ERROR HANDLING
//! ==============
//! Unknown emails and wrong passwords both surface as
//! [`AccountError::InvalidCredentials`] so login does not reveal which
//! accounts exist. An unknown email is still verified, against a dummy hash
//! made with the store's cost, so both paths spend the same time.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use identity::{Profile, Role, ValidationErrors, forms};
use rand::Rng;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::config::HashCost;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("User already exists")]
    AlreadyExists,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Current password is incorrect.")]
    WrongCurrentPassword,
    #[error("account not found")]
    NotFound,
    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    password_hash: String,
}

impl Account {
    #[must_use]
    pub fn profile(&self) -> Profile {
        Profile::new(self.email.clone(), self.role)
    }
}

// =============================================================================
// HASHING
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Hasher {
    cost: HashCost,
}

impl Hasher {
    fn hash(self, password: &str) -> Result<String, AccountError> {
        let params = Params::new(self.cost.memory_kib, self.cost.iterations, 1, None)
            .map_err(|e| AccountError::Hash(e.to_string()))?;
        let salt_bytes: [u8; 16] = rand::rng().random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AccountError::Hash(e.to_string()))?;
        let phc = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AccountError::Hash(e.to_string()))?;
        Ok(phc.to_string())
    }

    /// Parameters are read from the stored hash.
    fn verify(stored: &str, password: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            tracing::warn!("stored password hash is unreadable");
            return false;
        };
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    }

    async fn hash_blocking(self, password: &str) -> Result<String, AccountError> {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || self.hash(&password))
            .await
            .map_err(|e| AccountError::Hash(e.to_string()))?
    }

    async fn verify_blocking(stored: String, password: &str) -> Result<bool, AccountError> {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || Self::verify(&stored, &password))
            .await
            .map_err(|e| AccountError::Hash(e.to_string()))
    }
}

/// Display name used when registration omits one.
fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|local| !local.trim().is_empty())
        .unwrap_or("Scribe user")
        .to_owned()
}

// =============================================================================
// STORE
// =============================================================================

const DUMMY_PASSWORD: &str = "scribe-unknown-account";

#[derive(Debug, Clone)]
pub struct AccountStore {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    hasher: Hasher,
    /// Verified against when the email is unknown; built on first use.
    dummy_hash: Arc<OnceCell<String>>,
}

impl AccountStore {
    #[must_use]
    pub fn new(cost: HashCost) -> Self {
        Self { accounts: Arc::default(), hasher: Hasher { cost }, dummy_hash: Arc::default() }
    }

    fn lookup(&self, email: &str) -> Option<Account> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(email)
            .cloned()
    }

    /// Account for a normalized email.
    #[must_use]
    pub fn find(&self, email: &str) -> Option<Account> {
        self.lookup(email)
    }

    /// Register a new account after applying the full password policy.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Validation`] for rejected input and
    /// [`AccountError::AlreadyExists`] when the email is taken.
    pub async fn register(
        &self,
        name: Option<&str>,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Account, AccountError> {
        let name = match name {
            Some(name) => name.trim().to_owned(),
            None => name_from_email(email.trim()),
        };
        forms::validate_registration(&name, email, password)?;
        let email = forms::normalize_email(email).ok_or_else(|| ValidationErrors::form("Enter a valid email."))?;
        if self.lookup(&email).is_some() {
            return Err(AccountError::AlreadyExists);
        }

        let password_hash = self.hasher.hash_blocking(password).await?;
        let account = Account { id: Uuid::new_v4(), name, email: email.clone(), role, password_hash };

        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        if accounts.contains_key(&email) {
            return Err(AccountError::AlreadyExists);
        }
        accounts.insert(email, account.clone());
        drop(accounts);

        tracing::info!(account_id = %account.id, name = %account.name, email = %account.email, role = %account.role, "account registered");
        Ok(account)
    }

    /// Check `password` for the normalized `email`.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::InvalidCredentials`] for unknown emails and
    /// wrong passwords alike.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Account, AccountError> {
        let Some(account) = self.lookup(email) else {
            let dummy = self.dummy_hash().await?;
            Hasher::verify_blocking(dummy.to_owned(), password).await?;
            return Err(AccountError::InvalidCredentials);
        };
        if Hasher::verify_blocking(account.password_hash.clone(), password).await? {
            Ok(account)
        } else {
            Err(AccountError::InvalidCredentials)
        }
    }

    /// Replace the password after confirming the current one.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Validation`] for rejected input,
    /// [`AccountError::WrongCurrentPassword`] when `current` does not match,
    /// and [`AccountError::NotFound`] if the account disappeared.
    async fn dummy_hash(&self) -> Result<&str, AccountError> {
        let hasher = self.hasher;
        self.dummy_hash
            .get_or_try_init(|| hasher.hash_blocking(DUMMY_PASSWORD))
            .await
            .map(String::as_str)
    }

    pub async fn change_password(&self, email: &str, current: &str, new_password: &str) -> Result<(), AccountError> {
        forms::validate_password_change(current, new_password)?;
        let account = self.lookup(email).ok_or(AccountError::NotFound)?;
        if !Hasher::verify_blocking(account.password_hash, current).await? {
            return Err(AccountError::WrongCurrentPassword);
        }
        self.set_password(email, new_password).await
    }

    /// Replace the password without checking the old one. Callers validate
    /// the new password first.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::NotFound`] for unknown emails.
    pub async fn set_password(&self, email: &str, new_password: &str) -> Result<(), AccountError> {
        let password_hash = self.hasher.hash_blocking(new_password).await?;
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        let account = accounts.get_mut(email).ok_or(AccountError::NotFound)?;
        account.password_hash = password_hash;
        tracing::info!(account_id = %account.id, "password updated");
        Ok(())
    }
}

#[cfg(test)]
#[path = "accounts_test.rs"]
mod tests;
