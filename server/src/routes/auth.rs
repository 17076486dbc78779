//! Auth routes: registration, sign-in, bearer sessions, password flows.

use axum::extract::{FromRef, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use identity::wire::{
    ChangePasswordRequest, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, LoginResponse,
    MessageResponse, RegisterRequest, ResetPasswordRequest,
};
use identity::{Profile, Role, ValidationErrors, forms};

use crate::rate_limit::Throttled;
use crate::services::accounts::{Account, AccountError};
use crate::services::reset::ResetError;
use crate::state::AppState;

const FORGOT_PASSWORD_MESSAGE: &str = "If that email is registered, a reset code has been sent.";

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Error reply rendered as `{ "message": ... }` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(MessageResponse::new(self.message))).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::new(StatusCode::BAD_REQUEST, errors.summary())
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(errors) => errors.into(),
            AccountError::AlreadyExists => Self::new(StatusCode::CONFLICT, err.to_string()),
            AccountError::InvalidCredentials | AccountError::NotFound => {
                Self::new(StatusCode::UNAUTHORIZED, AccountError::InvalidCredentials.to_string())
            }
            AccountError::WrongCurrentPassword => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            AccountError::Hash(detail) => {
                tracing::error!(error = %detail, "password hashing failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<ResetError> for ApiError {
    fn from(err: ResetError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.to_string())
    }
}

impl From<Throttled> for ApiError {
    fn from(_: Throttled) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "Too many failed attempts. Try again later.")
    }
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authenticated account extracted from the `Authorization: Bearer` header.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub account: Account,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;
        let app_state = AppState::from_ref(state);
        let email = app_state.sessions.validate(token).ok_or_else(ApiError::unauthorized)?;
        let account = app_state.accounts.find(&email).ok_or_else(ApiError::unauthorized)?;
        Ok(Self { account, token: token.to_owned() })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/Auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let role = match forms::normalize_email(&body.email) {
        Some(email) if state.config.is_admin_email(&email) => Role::Admin,
        _ => Role::User,
    };
    state
        .accounts
        .register(body.name.as_deref(), &body.email, &body.password, role)
        .await?;
    Ok(Json(MessageResponse::new("User registered successfully")))
}

/// `POST /api/Auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    forms::validate_login(&body.email, &body.password, None)?;
    let email = forms::normalize_email(&body.email).ok_or_else(|| ValidationErrors::form("Enter a valid email."))?;
    state.login_throttle.check(&email).inspect_err(|e| {
        tracing::warn!(%email, error = %e, "login throttled");
    })?;

    let account = match state.accounts.authenticate(&email, &body.password).await {
        Ok(account) => account,
        Err(e) => {
            if matches!(e, AccountError::InvalidCredentials) {
                state.login_throttle.record_failure(&email);
                tracing::info!(%email, "login rejected");
            }
            return Err(e.into());
        }
    };
    state.login_throttle.reset(&email);

    let token = state.sessions.create(&account.email);
    tracing::info!(account_id = %account.id, role = %account.role, "login succeeded");
    Ok(Json(LoginResponse { token, user: account.profile() }))
}

/// `POST /api/Auth/logout`: always 204, unknown or missing tokens ignored.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = bearer_token(&headers) {
        if state.sessions.delete(token) {
            tracing::info!("session ended");
        }
    }
    StatusCode::NO_CONTENT
}

/// `GET /api/Auth/me`
pub async fn me(auth: AuthUser) -> Json<Profile> {
    Json(auth.account.profile())
}

/// `POST /api/Auth/change-password`. Other sessions of the account are
/// revoked; the caller's stays valid.
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .accounts
        .change_password(&auth.account.email, &body.current_password, &body.new_password)
        .await?;
    let revoked = state.sessions.revoke_user(&auth.account.email, Some(&auth.token));
    tracing::info!(account_id = %auth.account.id, revoked, "password changed");
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// `POST /api/Auth/forgot-password`. Unknown emails get the same reply.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, ApiError> {
    let mut errors = ValidationErrors::new();
    forms::check_email(&mut errors, &body.email);
    errors.into_result()?;
    let email = forms::normalize_email(&body.email).ok_or_else(|| ValidationErrors::form("Enter a valid email."))?;

    let otp = if state.accounts.find(&email).is_some() {
        let code = state.resets.issue(&email);
        tracing::info!(%email, "reset code issued");
        state.config.echo_otp.then_some(code)
    } else {
        tracing::debug!(%email, "reset requested for unknown email");
        None
    };
    Ok(Json(ForgotPasswordResponse { message: FORGOT_PASSWORD_MESSAGE.to_owned(), otp }))
}

/// `POST /api/Auth/reset-password`. Every session of the account is revoked.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    forms::validate_password_reset(body.email.as_deref(), &body.otp, &body.new_password)?;
    let email = body.email.as_deref().and_then(forms::normalize_email);
    let owner = state.resets.redeem(email.as_deref(), &body.otp)?;

    state.accounts.set_password(&owner, &body.new_password).await?;
    let revoked = state.sessions.revoke_user(&owner, None);
    tracing::info!(email = %owner, revoked, "password reset");
    Ok(Json(MessageResponse::new("Password has been reset")))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
