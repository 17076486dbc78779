mod config;
mod rate_limit;
mod routes;
mod services;
mod state;


#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::ServerConfig::from_env();
    let port = config.port;
    if config.echo_otp {
        tracing::warn!("ECHO_OTP enabled: reset codes are returned in API responses");
    }
    if config.admin_emails.is_empty() {
        tracing::info!("ADMIN_EMAILS not set; every account registers as user");
    }

    let app = routes::app(state::AppState::new(config));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "scribe auth provider listening");
    axum::serve(listener, app).await.expect("server failed");
}
