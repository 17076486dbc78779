//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every endpoint lives under `/api` so a client configured with base URL
//! `http://host:port/api` reaches `Auth/login`, `Auth/me`, and `health` by
//! relative path.

pub mod auth;

use axum::Router;
use axum::response::Json;
use axum::routing::{get, post};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full provider router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/Auth/register", post(auth::register))
        .route("/api/Auth/login", post(auth::login))
        .route("/api/Auth/logout", post(auth::logout))
        .route("/api/Auth/me", get(auth::me))
        .route("/api/Auth/change-password", post(auth::change_password))
        .route("/api/Auth/forgot-password", post(auth::forgot_password))
        .route("/api/Auth/reset-password", post(auth::reset_password))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
