//! Provider configuration parsed from environment variables.

use std::collections::HashSet;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;
pub const DEFAULT_OTP_TTL_SECS: u64 = 600;
pub const DEFAULT_LOGIN_MAX_FAILURES: usize = 5;
pub const DEFAULT_LOGIN_FAILURE_WINDOW_SECS: u64 = 300;
pub const DEFAULT_HASH_MEMORY_KIB: u32 = 19_456;
pub const DEFAULT_HASH_ITERATIONS: u32 = 2;
/// Upper bound for every configured lifetime and window (one year).
pub const MAX_TTL_SECS: u64 = 31_536_000;
pub const MAX_TTL: Duration = Duration::from_secs(MAX_TTL_SECS);

/// Argon2 cost parameters for new password hashes. Verification reads the
/// parameters stored in each hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self { memory_kib: DEFAULT_HASH_MEMORY_KIB, iterations: DEFAULT_HASH_ITERATIONS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Normalized emails that receive the admin role at registration.
    pub admin_emails: HashSet<String>,
    pub session_ttl: Duration,
    pub otp_ttl: Duration,
    /// Include the reset code in the forgot-password reply (local development).
    pub echo_otp: bool,
    pub login_max_failures: usize,
    pub login_failure_window: Duration,
    pub hash_cost: HashCost,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            admin_emails: HashSet::new(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            otp_ttl: Duration::from_secs(DEFAULT_OTP_TTL_SECS),
            echo_otp: false,
            login_max_failures: DEFAULT_LOGIN_MAX_FAILURES,
            login_failure_window: Duration::from_secs(DEFAULT_LOGIN_FAILURE_WINDOW_SECS),
            hash_cost: HashCost::default(),
        }
    }
}

impl ServerConfig {
    /// Build typed provider config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 5000
    /// - `ADMIN_EMAILS`: comma-separated list
    /// - `SESSION_TTL_SECS`: default 86400
    /// - `OTP_TTL_SECS`: default 600
    ///
    /// Lifetimes and windows above [`MAX_TTL_SECS`] are capped.
    /// - `ECHO_OTP`: default false
    /// - `LOGIN_MAX_FAILURES`: default 5
    /// - `LOGIN_FAILURE_WINDOW_SECS`: default 300
    /// - `ARGON2_MEMORY_KIB`, `ARGON2_ITERATIONS`: argon2 defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an explicit variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let admin_emails = lookup("ADMIN_EMAILS")
            .map(|raw| raw.split(',').filter_map(identity::forms::normalize_email).collect())
            .unwrap_or_default();

        Self {
            port: env_parse(&lookup, "PORT", DEFAULT_PORT),
            admin_emails,
            session_ttl: env_secs(&lookup, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS),
            otp_ttl: env_secs(&lookup, "OTP_TTL_SECS", DEFAULT_OTP_TTL_SECS),
            echo_otp: env_bool(&lookup, "ECHO_OTP").unwrap_or(false),
            login_max_failures: env_parse(&lookup, "LOGIN_MAX_FAILURES", DEFAULT_LOGIN_MAX_FAILURES),
            login_failure_window: env_secs(&lookup, "LOGIN_FAILURE_WINDOW_SECS", DEFAULT_LOGIN_FAILURE_WINDOW_SECS),
            hash_cost: HashCost {
                memory_kib: env_parse(&lookup, "ARGON2_MEMORY_KIB", DEFAULT_HASH_MEMORY_KIB),
                iterations: env_parse(&lookup, "ARGON2_ITERATIONS", DEFAULT_HASH_ITERATIONS),
            },
        }
    }

    #[must_use]
    pub fn is_admin_email(&self, normalized_email: &str) -> bool {
        self.admin_emails.contains(normalized_email)
    }
}

pub(crate) fn env_parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Seconds from `key`, capped at [`MAX_TTL_SECS`].
pub(crate) fn env_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Duration {
    Duration::from_secs(env_parse(lookup, key, default).min(MAX_TTL_SECS))
}

pub(crate) fn env_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    lookup(key).and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
