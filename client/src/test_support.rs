//! Shared fixtures for client tests: in-memory stores and a scripted
//! provider served by axum on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde_json::{Value, json};

use crate::net::api::AuthGateway;
use crate::net::config::ClientConfig;
use crate::state::credentials::{CredentialRecord, CredentialStore};
use crate::state::storage::MemoryStore;
use identity::{Profile, Role};

pub(crate) const USER_TOKEN: &str = "user-token";
pub(crate) const ADMIN_TOKEN: &str = "admin-token";
pub(crate) const EXPIRED_TOKEN: &str = "expired-token";

/// Serve `router` on `127.0.0.1:0` and return its `/api` base URL.
pub(crate) async fn spawn_provider(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api")
}

/// Base URL of a port nothing listens on.
pub(crate) async fn unreachable_provider() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api")
}

pub(crate) fn memory_store() -> Arc<CredentialStore> {
    Arc::new(CredentialStore::new(Arc::new(MemoryStore::new())))
}

pub(crate) fn gateway_for(base_url: &str) -> AuthGateway {
    let mut config = ClientConfig::new(base_url);
    config.timeouts.request_secs = 5;
    config.timeouts.logout_secs = 1;
    AuthGateway::new(&config, memory_store()).unwrap()
}

pub(crate) fn sign_in(store: &CredentialStore, token: &str, email: &str, role: Role) {
    store.write(&CredentialRecord::new(token, Profile::new(email, role))).unwrap();
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn message(status: StatusCode, text: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "message": text })))
}

/// Scripted provider:
/// - `new@x.com` / `Abcdef1!` signs in as a user, `admin@x.com` / `Admin123!` as admin
/// - `taken@x.com` conflicts with 409, `dup@x.com` with the legacy 400 message
/// - [`EXPIRED_TOKEN`] is rejected by every bearer route
pub(crate) fn mock_provider() -> Router {
    Router::new()
        .route("/api/Auth/login", post(login))
        .route("/api/Auth/register", post(register))
        .route("/api/Auth/logout", post(|| async { StatusCode::NO_CONTENT }))
        .route("/api/Auth/me", get(me))
        .route("/api/Auth/change-password", post(change_password))
        .route("/api/Auth/forgot-password", post(forgot_password))
        .route("/api/Auth/reset-password", post(reset_password))
        .route("/api/templates", get(templates))
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    match (email, password) {
        ("new@x.com", "Abcdef1!") => {
            (StatusCode::OK, Json(json!({ "token": USER_TOKEN, "user": { "email": email, "role": "user" } })))
        }
        ("admin@x.com", "Admin123!") => {
            (StatusCode::OK, Json(json!({ "token": ADMIN_TOKEN, "user": { "email": email, "role": "admin" } })))
        }
        ("broken@x.com", _) => (StatusCode::OK, Json(json!({ "unexpected": true }))),
        ("down@x.com", _) => (StatusCode::SERVICE_UNAVAILABLE, Json(Value::Null)),
        _ => message(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }
}

async fn register(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    match body["email"].as_str().unwrap_or_default() {
        "taken@x.com" => message(StatusCode::CONFLICT, "Email already registered"),
        "dup@x.com" => message(StatusCode::BAD_REQUEST, "User already exists"),
        "blocked@x.com" => message(StatusCode::BAD_REQUEST, "Registrations are closed"),
        _ => message(StatusCode::OK, "User registered successfully"),
    }
}

async fn me(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match bearer(&headers) {
        Some(USER_TOKEN) => (StatusCode::OK, Json(json!({ "email": "new@x.com", "role": "user" }))),
        Some(ADMIN_TOKEN) => (StatusCode::OK, Json(json!({ "email": "admin@x.com", "role": "admin" }))),
        _ => message(StatusCode::UNAUTHORIZED, "Unauthorized"),
    }
}

async fn change_password(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if !matches!(bearer(&headers), Some(USER_TOKEN | ADMIN_TOKEN)) {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    if body["currentPassword"] != "Abcdef1!" {
        return message(StatusCode::BAD_REQUEST, "Current password is incorrect.");
    }
    message(StatusCode::OK, "Password updated successfully")
}

async fn forgot_password(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let _ = body;
    (StatusCode::OK, Json(json!({ "message": "If the account exists, a code was sent.", "otp": "ABC234" })))
}

async fn reset_password(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["otp"] == "ABC234" {
        message(StatusCode::OK, "Password reset successfully")
    } else {
        message(StatusCode::BAD_REQUEST, "Invalid or expired code.")
    }
}

async fn templates(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match bearer(&headers) {
        Some(USER_TOKEN | ADMIN_TOKEN) => (StatusCode::OK, Json(json!([{ "id": "t1", "name": "Blog post" }]))),
        Some(EXPIRED_TOKEN) => message(StatusCode::UNAUTHORIZED, "Token expired"),
        _ => message(StatusCode::FORBIDDEN, "Forbidden"),
    }
}

/// Provider whose logout never answers within the client's notify bound.
pub(crate) fn stalled_logout_provider() -> Router {
    Router::new().route(
        "/api/Auth/logout",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::NO_CONTENT
        }),
    )
}
