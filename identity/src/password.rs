//! Canonical password policy.
//!
//! One policy applies at every call site (registration, login re-validation,
//! password change and reset, and the provider itself). Login callers may ask
//! for the first violation only; everything else reports the full set.

/// Minimum password length in characters.
pub const PASSWORD_MIN_LEN: usize = 8;

/// Punctuation accepted as the required "special character".
pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

/// A single rule of the password policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PasswordRule {
    MinLength,
    Uppercase,
    Digit,
    Symbol,
}

impl PasswordRule {
    /// Every rule, in reporting order.
    pub const ALL: [Self; 4] = [Self::MinLength, Self::Uppercase, Self::Digit, Self::Symbol];

    /// Field-level message shown when this rule is violated.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::MinLength => "Password must be at least 8 characters.",
            Self::Uppercase => "Password must contain at least 1 uppercase letter.",
            Self::Digit => "Password must contain at least 1 digit.",
            Self::Symbol => "Password must contain at least 1 special character.",
        }
    }

    #[must_use]
    pub fn is_satisfied_by(self, password: &str) -> bool {
        match self {
            Self::MinLength => password.chars().count() >= PASSWORD_MIN_LEN,
            Self::Uppercase => password.chars().any(|c| c.is_ascii_uppercase()),
            Self::Digit => password.chars().any(|c| c.is_ascii_digit()),
            Self::Symbol => password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)),
        }
    }
}

/// How many violations to report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PolicyMode {
    /// Stop at the first violated rule.
    FirstViolation,
    /// Report every violated rule.
    #[default]
    Full,
}

/// Violated rules for `password`, in [`PasswordRule::ALL`] order.
#[must_use]
pub fn violations(password: &str, mode: PolicyMode) -> Vec<PasswordRule> {
    let failing = PasswordRule::ALL
        .into_iter()
        .filter(|rule| !rule.is_satisfied_by(password));
    match mode {
        PolicyMode::FirstViolation => failing.take(1).collect(),
        PolicyMode::Full => failing.collect(),
    }
}

/// Check `password` against the policy.
///
/// # Errors
///
/// Returns the violated rules when at least one rule fails.
pub fn check(password: &str, mode: PolicyMode) -> Result<(), Vec<PasswordRule>> {
    let failing = violations(password, mode);
    if failing.is_empty() { Ok(()) } else { Err(failing) }
}

#[cfg(test)]
#[path = "password_test.rs"]
mod tests;
