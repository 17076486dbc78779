//! Calls against the authentication provider.
//!
//! SYSTEM CONTEXT
//! ==============
//! `AuthGateway` is the only component that writes the credential store in
//! response to the network: login stores the record, logout clears it, and
//! any 401/403 from a protected call clears it with
//! [`ClearReason::Unauthorized`], which subscribers treat as "session
//! invalidated".
//!
//! ERROR HANDLING
//! ==============
//! Inputs are validated before any request is built. Every reply is read as
//! text first and decoded second, so a malformed body surfaces as
//! [`AuthError::Server`] instead of a transport error.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::Arc;
use std::time::Duration;

use identity::forms::{self, normalize_email, normalize_otp};
use identity::wire::{
    ChangePasswordRequest, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, LoginResponse,
    MessageResponse, RegisterRequest, ResetPasswordRequest,
};
use identity::{PolicyMode, Profile};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::config::ClientConfig;
use super::types::{AuthError, AuthResult, Credentials};
use crate::state::credentials::{ClearReason, CredentialRecord, CredentialStore};

// =============================================================================
// CLIENT
// =============================================================================

pub struct AuthGateway {
    http: reqwest::Client,
    base_url: String,
    logout_timeout: Duration,
    login_policy: Option<PolicyMode>,
    store: Arc<CredentialStore>,
}

impl AuthGateway {
    /// Build a gateway writing through `store`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Network`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, store: Arc<CredentialStore>) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .build()
            .map_err(|e| AuthError::Network(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            logout_timeout: config.timeouts.logout(),
            login_policy: config.login_policy,
            store,
        })
    }

    #[must_use]
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // -------------------------------------------------------------------------
    // Account flows
    // -------------------------------------------------------------------------

    /// Sign in and persist the resulting session.
    ///
    /// # Errors
    ///
    /// [`AuthError::Validation`] before any request for unusable input,
    /// [`AuthError::InvalidCredentials`] when the provider rejects the pair,
    /// and `Network`/`Server` for transport or provider failures.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Credentials> {
        forms::validate_login(email, password, self.login_policy)?;
        let email = normalize_email(email).unwrap_or_else(|| email.trim().to_owned());

        let body = LoginRequest { email: email.clone(), password: password.to_owned() };
        let reply = send(self.http.post(self.url("Auth/login")).json(&body)).await?;

        match reply.status {
            s if s.is_success() => {
                let LoginResponse { token, user } = reply.decode()?;
                if token.is_empty() {
                    return Err(reply.malformed("login reply carried an empty token"));
                }
                self.store.write(&CredentialRecord::new(token.clone(), user.clone()))?;
                tracing::info!(email = %user.email, role = %user.role, "login succeeded");
                Ok(Credentials { token, profile: user })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::info!(email = %email, "login rejected");
                Err(AuthError::InvalidCredentials)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Err(reply.validation_error()),
            _ => Err(reply.server_error()),
        }
    }

    /// Create an account. Does not sign in.
    ///
    /// # Errors
    ///
    /// [`AuthError::Validation`] reports every rejected field;
    /// [`AuthError::EmailAlreadyRegistered`] when the provider reports a
    /// conflict.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> AuthResult<String> {
        forms::validate_registration(name, email, password)?;
        let email = normalize_email(email).unwrap_or_else(|| email.trim().to_owned());

        let body = RegisterRequest { name: Some(name.trim().to_owned()), email: email.clone(), password: password.to_owned() };
        let reply = send(self.http.post(self.url("Auth/register")).json(&body)).await?;

        match reply.status {
            s if s.is_success() => {
                tracing::info!(email = %email, "registration succeeded");
                Ok(reply.message().unwrap_or_else(|| "Registered.".to_owned()))
            }
            StatusCode::CONFLICT => Err(AuthError::EmailAlreadyRegistered),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                if reply.message().is_some_and(|m| reports_existing_account(&m)) {
                    Err(AuthError::EmailAlreadyRegistered)
                } else {
                    Err(reply.validation_error())
                }
            }
            _ => Err(reply.server_error()),
        }
    }

    /// Notify the provider (bounded, best effort) and clear the local session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] only if the local record cannot be
    /// removed; provider failures are logged and ignored.
    pub async fn logout(&self) -> AuthResult<()> {
        if let Some(token) = self.store.token() {
            let notify = self.http.post(self.url("Auth/logout")).bearer_auth(&token).send();
            match tokio::time::timeout(self.logout_timeout, notify).await {
                Ok(Ok(resp)) => tracing::debug!(status = resp.status().as_u16(), "logout notified"),
                Ok(Err(e)) => tracing::warn!(error = %e, "logout notification failed"),
                Err(_) => tracing::warn!(timeout = ?self.logout_timeout, "logout notification timed out"),
            }
        }
        self.store.clear(ClearReason::SignedOut)?;
        Ok(())
    }

    /// Change the signed-in user's password.
    ///
    /// # Errors
    ///
    /// [`AuthError::Unauthorized`] without a network call when no session is
    /// stored, or when the provider rejects the token (the session is then
    /// cleared).
    pub async fn change_password(&self, current: &str, new_password: &str) -> AuthResult<String> {
        let Some(token) = self.store.token() else {
            return Err(AuthError::Unauthorized);
        };
        forms::validate_password_change(current, new_password)?;

        let body = ChangePasswordRequest { current_password: current.to_owned(), new_password: new_password.to_owned() };
        let reply = send(self.http.post(self.url("Auth/change-password")).bearer_auth(&token).json(&body)).await?;

        match reply.status {
            s if s.is_success() => {
                tracing::info!("password changed");
                Ok(reply.message().unwrap_or_else(|| "Password updated.".to_owned()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(self.invalidate(reply.status)),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Err(reply.validation_error()),
            _ => Err(reply.server_error()),
        }
    }

    /// Ask the provider to issue a reset code for `email`.
    ///
    /// # Errors
    ///
    /// [`AuthError::Validation`] for an unusable email or a provider 400.
    pub async fn forgot_password(&self, email: &str) -> AuthResult<ForgotPasswordResponse> {
        let mut errors = identity::ValidationErrors::new();
        forms::check_email(&mut errors, email);
        errors.into_result()?;
        let email = normalize_email(email).unwrap_or_else(|| email.trim().to_owned());

        let reply = send(self.http.post(self.url("Auth/forgot-password")).json(&ForgotPasswordRequest { email })).await?;
        match reply.status {
            s if s.is_success() => reply.decode(),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Err(reply.validation_error()),
            _ => Err(reply.server_error()),
        }
    }

    /// Set a new password using a reset code.
    ///
    /// # Errors
    ///
    /// [`AuthError::Validation`] for unusable input or a rejected code.
    pub async fn reset_password(&self, email: Option<&str>, otp: &str, new_password: &str) -> AuthResult<String> {
        forms::validate_password_reset(email, otp, new_password)?;
        let body = ResetPasswordRequest {
            email: email.and_then(normalize_email),
            otp: normalize_otp(otp).unwrap_or_else(|| otp.trim().to_owned()),
            new_password: new_password.to_owned(),
        };

        let reply = send(self.http.post(self.url("Auth/reset-password")).json(&body)).await?;
        match reply.status {
            s if s.is_success() => Ok(reply.message().unwrap_or_else(|| "Password reset.".to_owned())),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Err(reply.validation_error()),
            _ => Err(reply.server_error()),
        }
    }

    // -------------------------------------------------------------------------
    // Protected resources
    // -------------------------------------------------------------------------

    /// Fetch the signed-in user's profile from the provider.
    ///
    /// # Errors
    ///
    /// Same as [`Self::protected`], plus [`AuthError::Server`] for a body
    /// that is not a profile.
    pub async fn me(&self) -> AuthResult<Profile> {
        let value = self.protected(Method::GET, "Auth/me", None).await?;
        serde_json::from_value(value)
            .map_err(|e| AuthError::Server { status: 200, message: format!("malformed profile: {e}") })
    }

    /// Re-read the profile and rewrite the stored record when the provider
    /// reports a different email or role.
    ///
    /// # Errors
    ///
    /// Same as [`Self::me`].
    pub async fn refresh_profile(&self) -> AuthResult<Profile> {
        let profile = self.me().await?;
        if let Some(record) = self.store.read() {
            if record.profile() != profile {
                tracing::info!(email = %profile.email, role = %profile.role, "profile changed upstream");
                self.store.write(&CredentialRecord::new(record.token, profile.clone()))?;
            }
        }
        Ok(profile)
    }

    /// Call a bearer-protected endpoint relative to the base URL. Returns the
    /// decoded JSON body, or `Null` for an empty one.
    ///
    /// # Errors
    ///
    /// [`AuthError::Unauthorized`] when no session is stored or when the
    /// provider answers 401/403; the latter also clears the stored session.
    pub async fn protected(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> AuthResult<serde_json::Value> {
        let Some(token) = self.store.token() else {
            return Err(AuthError::Unauthorized);
        };
        let mut request = self.http.request(method, self.url(path)).bearer_auth(&token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let reply = send(request).await?;

        match reply.status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(self.invalidate(reply.status)),
            s if s.is_success() => {
                if reply.body.trim().is_empty() {
                    Ok(serde_json::Value::Null)
                } else {
                    reply.decode()
                }
            }
            _ => Err(reply.server_error()),
        }
    }

    fn invalidate(&self, status: StatusCode) -> AuthError {
        tracing::warn!(status = status.as_u16(), "provider rejected session token");
        if let Err(e) = self.store.clear(ClearReason::Unauthorized) {
            tracing::warn!(error = %e, "failed to clear rejected session");
        }
        AuthError::Unauthorized
    }
}

impl std::fmt::Debug for AuthGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGateway").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

// =============================================================================
// REPLIES
// =============================================================================

struct Reply {
    status: StatusCode,
    body: String,
}

async fn send(request: RequestBuilder) -> AuthResult<Reply> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    Ok(Reply { status, body })
}

impl Reply {
    fn decode<T: DeserializeOwned>(&self) -> AuthResult<T> {
        serde_json::from_str(&self.body).map_err(|e| self.malformed(&e.to_string()))
    }

    fn message(&self) -> Option<String> {
        serde_json::from_str::<MessageResponse>(&self.body)
            .ok()
            .map(|m| m.message)
            .filter(|m| !m.trim().is_empty())
    }

    fn malformed(&self, detail: &str) -> AuthError {
        AuthError::Server { status: self.status.as_u16(), message: format!("malformed response body: {detail}") }
    }

    fn validation_error(&self) -> AuthError {
        match self.message() {
            Some(message) => AuthError::validation(message),
            None => self.server_error(),
        }
    }

    fn server_error(&self) -> AuthError {
        let message = self
            .message()
            .or_else(|| self.status.canonical_reason().map(str::to_owned))
            .unwrap_or_else(|| "unexpected response".to_owned());
        AuthError::Server { status: self.status.as_u16(), message }
    }
}

fn reports_existing_account(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("already") || lower.contains("exists")
}
