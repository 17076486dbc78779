//! Field-level validation for auth forms.
//!
//! Both the client (pre-flight, before any network call) and the provider
//! run these checks, so messages are attached to the field that caused them
//! rather than collapsed into a generic "invalid input".

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::password::{self, PolicyMode};

/// Length of a password-reset one-time code.
pub const OTP_LEN: usize = 6;

/// Form field a validation message belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Email,
    Password,
    CurrentPassword,
    NewPassword,
    Otp,
    /// Not tied to one input (e.g. a message relayed from the provider).
    Form,
}

impl Field {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Password => "password",
            Self::CurrentPassword => "current_password",
            Self::NewPassword => "new_password",
            Self::Otp => "otp",
            Self::Form => "form",
        }
    }
}

/// A single field-level message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// Ordered set of field-level validation failures.
#[derive(Clone, Debug, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.summary())]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A single form-level message.
    #[must_use]
    pub fn form(message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(Field::Form, message);
        errors
    }

    pub fn push(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push(FieldError { field, message: message.into() });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Messages attached to `field`, in insertion order.
    pub fn messages_for(&self, field: Field) -> impl Iterator<Item = &str> {
        self.errors
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| e.message.as_str())
    }

    #[must_use]
    pub fn has(&self, field: Field) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// All messages joined into one line.
    #[must_use]
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `Ok(())` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one message was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Trim and lowercase an email, returning `None` unless it looks like
/// `local@domain.tld` with no whitespace.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if normalized.is_empty() || normalized.chars().any(char::is_whitespace) {
        return None;
    }
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }
    let dotted = domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len());
    if !dotted {
        return None;
    }
    Some(normalized)
}

/// Trim and uppercase a one-time code, returning `None` unless it is exactly
/// [`OTP_LEN`] ASCII alphanumerics.
#[must_use]
pub fn normalize_otp(code: &str) -> Option<String> {
    let normalized = code.trim().to_ascii_uppercase();
    if normalized.len() != OTP_LEN || !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(normalized)
}

// =============================================================================
// FIELD CHECKS
// =============================================================================

pub fn check_name(errors: &mut ValidationErrors, name: &str) {
    if name.trim().is_empty() {
        errors.push(Field::Name, "Name is required.");
    }
}

pub fn check_email(errors: &mut ValidationErrors, email: &str) {
    if email.trim().is_empty() {
        errors.push(Field::Email, "Email is required.");
    } else if normalize_email(email).is_none() {
        errors.push(Field::Email, "Enter a valid email.");
    }
}

pub fn check_password_field(errors: &mut ValidationErrors, field: Field, value: &str, mode: PolicyMode) {
    if value.is_empty() {
        errors.push(field, "Password is required.");
        return;
    }
    for rule in password::violations(value, mode) {
        errors.push(field, rule.message());
    }
}

/// Presence-only check, used for a current password that predates the policy.
pub fn check_required(errors: &mut ValidationErrors, field: Field, value: &str) {
    if value.is_empty() {
        errors.push(field, "Password is required.");
    }
}

pub fn check_otp(errors: &mut ValidationErrors, otp: &str) {
    if otp.trim().is_empty() {
        errors.push(Field::Otp, "OTP is required.");
    } else if normalize_otp(otp).is_none() {
        errors.push(Field::Otp, "Enter the 6-character code.");
    }
}

// =============================================================================
// FORMS
// =============================================================================

/// Login form. With `policy` set the password is re-validated against the
/// policy in that mode; without it only presence is checked, so accounts
/// created before the policy can still sign in.
///
/// # Errors
///
/// Returns the field messages when either input is rejected.
pub fn validate_login(email: &str, password: &str, policy: Option<PolicyMode>) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_email(&mut errors, email);
    match policy {
        Some(mode) => check_password_field(&mut errors, Field::Password, password, mode),
        None => check_required(&mut errors, Field::Password, password),
    }
    errors.into_result()
}

/// Registration form: every violated rule is reported.
///
/// # Errors
///
/// Returns the field messages when any input is rejected.
pub fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_name(&mut errors, name);
    check_email(&mut errors, email);
    check_password_field(&mut errors, Field::Password, password, PolicyMode::Full);
    errors.into_result()
}

/// Change-password form.
///
/// # Errors
///
/// Returns the field messages when either input is rejected.
pub fn validate_password_change(current: &str, new_password: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_required(&mut errors, Field::CurrentPassword, current);
    check_password_field(&mut errors, Field::NewPassword, new_password, PolicyMode::Full);
    if errors.is_empty() && current == new_password {
        errors.push(Field::NewPassword, "New password must differ from the current password.");
    }
    errors.into_result()
}

/// Reset-password form. The email is optional; the code identifies the
/// request on its own.
///
/// # Errors
///
/// Returns the field messages when any input is rejected.
pub fn validate_password_reset(email: Option<&str>, otp: &str, new_password: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(email) = email {
        check_email(&mut errors, email);
    }
    check_otp(&mut errors, otp);
    check_password_field(&mut errors, Field::NewPassword, new_password, PolicyMode::Full);
    errors.into_result()
}

#[cfg(test)]
#[path = "forms_test.rs"]
mod tests;
