//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use identity::PolicyMode;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_LOGOUT_TIMEOUT_SECS: u64 = 3;

/// Error raised for an unusable configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported SCRIBE_LOGIN_POLICY '{0}' (expected 'strict' or 'presence')")]
    LoginPolicy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
    /// Upper bound on the remote logout notification.
    pub logout_secs: u64,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            logout_secs: DEFAULT_LOGOUT_TIMEOUT_SECS,
        }
    }
}

impl ClientTimeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub fn logout(&self) -> Duration {
        Duration::from_secs(self.logout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Provider base URL without a trailing slash, e.g. `http://host/api`.
    pub base_url: String,
    pub timeouts: ClientTimeouts,
    /// Password policy re-checked before a login request. `None` checks
    /// presence only.
    pub login_policy: Option<PolicyMode>,
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base_url(&base_url.into()),
            timeouts: ClientTimeouts::default(),
            login_policy: None,
        }
    }

    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `SCRIBE_API_URL`: default `http://127.0.0.1:5000/api`
    /// - `SCRIBE_REQUEST_TIMEOUT_SECS`: default 15
    /// - `SCRIBE_CONNECT_TIMEOUT_SECS`: default 5
    /// - `SCRIBE_LOGOUT_TIMEOUT_SECS`: default 3
    /// - `SCRIBE_LOGIN_POLICY`: `presence` (default) or `strict`
    ///
    /// # Errors
    ///
    /// Returns an error for an unrecognized login policy.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns an error for an unrecognized login policy.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("SCRIBE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned());
        let parse = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(default)
        };
        let timeouts = ClientTimeouts {
            request_secs: parse("SCRIBE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse("SCRIBE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            logout_secs: parse("SCRIBE_LOGOUT_TIMEOUT_SECS", DEFAULT_LOGOUT_TIMEOUT_SECS),
        };
        let login_policy = parse_login_policy(lookup("SCRIBE_LOGIN_POLICY").as_deref())?;

        Ok(Self { base_url: trim_base_url(&base_url), timeouts, login_policy })
    }

    /// Replace the provider base URL, keeping timeouts and policy.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = trim_base_url(base_url);
        self
    }
}

fn trim_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

fn parse_login_policy(raw: Option<&str>) -> Result<Option<PolicyMode>, ConfigError> {
    match raw.map(str::trim).unwrap_or("presence") {
        "" | "presence" => Ok(None),
        "strict" => Ok(Some(PolicyMode::FirstViolation)),
        other => Err(ConfigError::LoginPolicy(other.to_owned())),
    }
}
