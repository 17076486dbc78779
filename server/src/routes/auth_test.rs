use std::time::Duration;

use serde_json::{Value, json};

use super::*;
use crate::config::{HashCost, ServerConfig};

fn test_config() -> ServerConfig {
    ServerConfig {
        admin_emails: ["boss@x.com".to_owned()].into(),
        echo_otp: true,
        login_max_failures: 3,
        login_failure_window: Duration::from_secs(60),
        hash_cost: HashCost { memory_kib: 64, iterations: 1 },
        ..ServerConfig::default()
    }
}

struct Provider {
    base: String,
    http: reqwest::Client,
}

impl Provider {
    async fn spawn(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = crate::routes::app(AppState::new(config));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { base: format!("http://{addr}/api"), http: reqwest::Client::new() }
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (u16, Value) {
        let mut request = self.http.post(format!("{}/{path}", self.base)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        read(request.send().await.unwrap()).await
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (u16, Value) {
        let mut request = self.http.get(format!("{}/{path}", self.base));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        read(request.send().await.unwrap()).await
    }

    async fn register(&self, email: &str, password: &str) -> (u16, Value) {
        self.post("Auth/register", None, json!({ "name": "Test", "email": email, "password": password }))
            .await
    }

    async fn login(&self, email: &str, password: &str) -> (u16, Value) {
        self.post("Auth/login", None, json!({ "email": email, "password": password })).await
    }

    async fn token_for(&self, email: &str, password: &str) -> String {
        let (status, body) = self.login(email, password).await;
        assert_eq!(status, 200, "{body}");
        body["token"].as_str().unwrap().to_owned()
    }
}

async fn read(response: reqwest::Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap();
    let body = if text.is_empty() { Value::Null } else { serde_json::from_str(&text).unwrap_or(Value::String(text)) };
    (status, body)
}

// =============================================================================
// bearer_token
// =============================================================================

#[test]
fn bearer_token_parsing() {
    let mut headers = HeaderMap::new();
    assert_eq!(bearer_token(&headers), None);

    headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
    assert_eq!(bearer_token(&headers), Some("abc"));

    headers.insert(header::AUTHORIZATION, "Bearer   ".parse().unwrap());
    assert_eq!(bearer_token(&headers), None);

    headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
    assert_eq!(bearer_token(&headers), None);
}

// =============================================================================
// register
// =============================================================================

#[tokio::test]
async fn register_then_duplicate_conflicts() {
    let provider = Provider::spawn(test_config()).await;

    let (status, body) = provider.register("new@x.com", "Abcdef1!").await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["message"], "User registered successfully");

    let (status, body) = provider.register("NEW@x.com", "Abcdef1!").await;
    assert_eq!(status, 409);
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn register_reports_policy_violations() {
    let provider = Provider::spawn(test_config()).await;
    let (status, body) = provider.register("new@x.com", "abcdefgh").await;
    assert_eq!(status, 400);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("uppercase"), "{message}");
}

#[tokio::test]
async fn admin_emails_register_as_admin() {
    let provider = Provider::spawn(test_config()).await;
    provider.register("Boss@X.com", "Admin123!").await;
    provider.register("staff@x.com", "Staff123!").await;

    let (_, body) = provider.login("boss@x.com", "Admin123!").await;
    assert_eq!(body["user"], json!({ "email": "boss@x.com", "role": "admin" }));
    let (_, body) = provider.login("staff@x.com", "Staff123!").await;
    assert_eq!(body["user"]["role"], "user");
}

// =============================================================================
// login / me / logout
// =============================================================================

#[tokio::test]
async fn login_issues_token_usable_for_me() {
    let provider = Provider::spawn(test_config()).await;
    provider.register("new@x.com", "Abcdef1!").await;

    let token = provider.token_for(" New@X.com ", "Abcdef1!").await;
    assert_eq!(token.len(), 64);

    let (status, body) = provider.get("Auth/me", Some(&token)).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "email": "new@x.com", "role": "user" }));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let provider = Provider::spawn(test_config()).await;
    provider.register("new@x.com", "Abcdef1!").await;

    let wrong = provider.login("new@x.com", "Abcdef1?").await;
    let unknown = provider.login("ghost@x.com", "Abcdef1!").await;
    assert_eq!(wrong.0, 401);
    assert_eq!(wrong, unknown);
    assert_eq!(wrong.1["message"], "Invalid credentials");
}

#[tokio::test]
async fn login_requires_email_shape_and_password() {
    let provider = Provider::spawn(test_config()).await;
    let (status, _) = provider.login("not-an-email", "Abcdef1!").await;
    assert_eq!(status, 400);
    let (status, _) = provider.login("new@x.com", "").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn repeated_failures_throttle_until_success_resets() {
    let provider = Provider::spawn(test_config()).await;
    provider.register("new@x.com", "Abcdef1!").await;

    for _ in 0..3 {
        assert_eq!(provider.login("new@x.com", "Wrong123!").await.0, 401);
    }
    let (status, body) = provider.login("new@x.com", "Abcdef1!").await;
    assert_eq!(status, 429);
    assert_eq!(body["message"], "Too many failed attempts. Try again later.");

    assert_eq!(provider.login("other@x.com", "Wrong123!").await.0, 401, "other emails unaffected");
}

#[tokio::test]
async fn successful_login_resets_failure_count() {
    let provider = Provider::spawn(test_config()).await;
    provider.register("new@x.com", "Abcdef1!").await;

    for _ in 0..2 {
        provider.login("new@x.com", "Wrong123!").await;
    }
    provider.token_for("new@x.com", "Abcdef1!").await;
    for _ in 0..2 {
        provider.login("new@x.com", "Wrong123!").await;
    }
    assert_eq!(provider.login("new@x.com", "Abcdef1!").await.0, 200);
}

#[tokio::test]
async fn me_requires_valid_bearer() {
    let provider = Provider::spawn(test_config()).await;
    let (status, body) = provider.get("Auth/me", None).await;
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Unauthorized");
    assert_eq!(provider.get("Auth/me", Some("bogus")).await.0, 401);
}

#[tokio::test]
async fn logout_always_succeeds_and_ends_session() {
    let provider = Provider::spawn(test_config()).await;
    provider.register("new@x.com", "Abcdef1!").await;
    let token = provider.token_for("new@x.com", "Abcdef1!").await;

    assert_eq!(provider.post("Auth/logout", Some(&token), Value::Null).await.0, 204);
    assert_eq!(provider.get("Auth/me", Some(&token)).await.0, 401);
    assert_eq!(provider.post("Auth/logout", Some(&token), Value::Null).await.0, 204);
    assert_eq!(provider.post("Auth/logout", None, Value::Null).await.0, 204);
}

#[tokio::test]
async fn expired_session_is_unauthorized() {
    let config = ServerConfig { session_ttl: Duration::ZERO, ..test_config() };
    let provider = Provider::spawn(config).await;
    provider.register("new@x.com", "Abcdef1!").await;
    let token = provider.token_for("new@x.com", "Abcdef1!").await;

    assert_eq!(provider.get("Auth/me", Some(&token)).await.0, 401);
}

// =============================================================================
// password flows
// =============================================================================

#[tokio::test]
async fn change_password_keeps_caller_and_revokes_others() {
    let provider = Provider::spawn(test_config()).await;
    provider.register("new@x.com", "Abcdef1!").await;
    let caller = provider.token_for("new@x.com", "Abcdef1!").await;
    let other = provider.token_for("new@x.com", "Abcdef1!").await;

    let body = json!({ "currentPassword": "Abcdef1!", "newPassword": "Newpass1!" });
    let (status, reply) = provider.post("Auth/change-password", Some(&caller), body).await;
    assert_eq!(status, 200, "{reply}");

    assert_eq!(provider.get("Auth/me", Some(&caller)).await.0, 200);
    assert_eq!(provider.get("Auth/me", Some(&other)).await.0, 401);
    assert_eq!(provider.login("new@x.com", "Newpass1!").await.0, 200);
}

#[tokio::test]
async fn change_password_rejects_wrong_current() {
    let provider = Provider::spawn(test_config()).await;
    provider.register("new@x.com", "Abcdef1!").await;
    let token = provider.token_for("new@x.com", "Abcdef1!").await;

    let body = json!({ "currentPassword": "Nope1234!", "newPassword": "Newpass1!" });
    let (status, reply) = provider.post("Auth/change-password", Some(&token), body).await;
    assert_eq!(status, 400);
    assert_eq!(reply["message"], "Current password is incorrect.");
}

#[tokio::test]
async fn change_password_requires_session() {
    let provider = Provider::spawn(test_config()).await;
    let body = json!({ "currentPassword": "Abcdef1!", "newPassword": "Newpass1!" });
    assert_eq!(provider.post("Auth/change-password", None, body).await.0, 401);
}

#[tokio::test]
async fn forgot_password_does_not_enumerate_accounts() {
    let provider = Provider::spawn(test_config()).await;
    provider.register("new@x.com", "Abcdef1!").await;

    let (known_status, known) = provider.post("Auth/forgot-password", None, json!({ "email": "new@x.com" })).await;
    let (unknown_status, unknown) = provider.post("Auth/forgot-password", None, json!({ "email": "ghost@x.com" })).await;
    assert_eq!(known_status, 200);
    assert_eq!(unknown_status, 200);
    assert_eq!(known["message"], unknown["message"]);
    assert!(known["otp"].is_string());
    assert!(unknown.get("otp").is_none());
}

#[tokio::test]
async fn forgot_password_hides_code_without_echo() {
    let config = ServerConfig { echo_otp: false, ..test_config() };
    let provider = Provider::spawn(config).await;
    provider.register("new@x.com", "Abcdef1!").await;

    let (status, body) = provider.post("Auth/forgot-password", None, json!({ "email": "new@x.com" })).await;
    assert_eq!(status, 200);
    assert!(body.get("otp").is_none());
}

#[tokio::test]
async fn forgot_password_rejects_bad_email() {
    let provider = Provider::spawn(test_config()).await;
    let (status, _) = provider.post("Auth/forgot-password", None, json!({ "email": "nope" })).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn reset_password_with_code_revokes_sessions() {
    let provider = Provider::spawn(test_config()).await;
    provider.register("new@x.com", "Abcdef1!").await;
    let old_token = provider.token_for("new@x.com", "Abcdef1!").await;

    let (_, forgot) = provider.post("Auth/forgot-password", None, json!({ "email": "new@x.com" })).await;
    let otp = forgot["otp"].as_str().unwrap().to_ascii_lowercase();

    let body = json!({ "otp": otp, "newPassword": "Reset123!" });
    let (status, reply) = provider.post("Auth/reset-password", None, body.clone()).await;
    assert_eq!(status, 200, "{reply}");

    assert_eq!(provider.get("Auth/me", Some(&old_token)).await.0, 401);
    assert_eq!(provider.login("new@x.com", "Abcdef1!").await.0, 401);
    assert_eq!(provider.login("new@x.com", "Reset123!").await.0, 200);

    let (status, reply) = provider.post("Auth/reset-password", None, body).await;
    assert_eq!(status, 400, "code is single use");
    assert_eq!(reply["message"], "Invalid or expired code.");
}

#[tokio::test]
async fn code_only_reset_guesses_are_limited() {
    let provider = Provider::spawn(test_config()).await;
    provider.register("new@x.com", "Abcdef1!").await;
    let (_, forgot) = provider.post("Auth/forgot-password", None, json!({ "email": "new@x.com" })).await;
    let otp = forgot["otp"].as_str().unwrap().to_owned();
    let wrong = if otp == "ABC234" { "ABC235" } else { "ABC234" };

    for _ in 0..crate::services::reset::MAX_FAILED_ATTEMPTS {
        let body = json!({ "otp": wrong, "newPassword": "Reset123!" });
        assert_eq!(provider.post("Auth/reset-password", None, body).await.0, 400);
    }

    let body = json!({ "otp": otp, "newPassword": "Reset123!" });
    let (status, reply) = provider.post("Auth/reset-password", None, body).await;
    assert_eq!(status, 400, "{reply}");
    assert_eq!(provider.login("new@x.com", "Abcdef1!").await.0, 200);
}

#[tokio::test]
async fn reset_password_applies_policy() {
    let provider = Provider::spawn(test_config()).await;
    let body = json!({ "email": "new@x.com", "otp": "ABC234", "newPassword": "weak" });
    let (status, _) = provider.post("Auth/reset-password", None, body).await;
    assert_eq!(status, 400);
}

// =============================================================================
// health
// =============================================================================

#[tokio::test]
async fn health_reports_ok() {
    let provider = Provider::spawn(test_config()).await;
    assert_eq!(provider.get("health", None).await, (200, json!({ "status": "ok" })));
}
