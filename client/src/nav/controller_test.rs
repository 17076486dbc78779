use std::time::Duration;

use super::*;
use crate::net::config::ClientConfig;
use crate::state::credentials::{CredentialStore, SESSION_KEY, TOKEN_KEY};
use crate::state::storage::{KeyValueStore, MemoryStore};
use crate::test_support::{
    EXPIRED_TOKEN, USER_TOKEN, gateway_for, mock_provider, sign_in, spawn_provider, unreachable_provider,
};
use identity::Role;
use reqwest::Method;

async fn mock_controller() -> Arc<NavigationController> {
    let gateway = gateway_for(&spawn_provider(mock_provider()).await);
    Arc::new(NavigationController::new(RouteTable::standard(), Arc::new(gateway)))
}

async fn offline_controller() -> Arc<NavigationController> {
    let gateway = gateway_for(&unreachable_provider().await);
    Arc::new(NavigationController::new(RouteTable::standard(), Arc::new(gateway)))
}

fn store_of(controller: &NavigationController) -> &CredentialStore {
    controller.gateway().store()
}

// =============================================================================
// navigate
// =============================================================================

#[tokio::test]
async fn anonymous_protected_route_goes_to_login() {
    let controller = offline_controller().await;
    let outcome = controller.navigate("/content-history").unwrap();

    assert_eq!(outcome.location, LOGIN_PATH);
    assert_eq!(outcome.first_reason(), Some(RedirectReason::NoSession));
    assert!(!outcome.navbar);
    assert_eq!(controller.return_to().as_deref(), Some("/content-history"));
    assert_eq!(controller.current_location().as_deref(), Some(LOGIN_PATH));
}

#[tokio::test]
async fn public_route_renders_for_anonymous() {
    let controller = offline_controller().await;
    let outcome = controller.navigate("/register").unwrap();
    assert_eq!(outcome.location, "/register");
    assert!(!outcome.redirected());
}

#[tokio::test]
async fn root_follows_alias_to_dashboard() {
    let controller = offline_controller().await;
    sign_in(store_of(&controller), USER_TOKEN, "new@x.com", Role::User);

    let outcome = controller.navigate("/").unwrap();
    assert_eq!(outcome.location, DASHBOARD_PATH);
    assert_eq!(outcome.first_reason(), Some(RedirectReason::Alias));
    assert!(outcome.navbar);
}

#[tokio::test]
async fn unknown_route_falls_back_home() {
    let controller = offline_controller().await;
    sign_in(store_of(&controller), USER_TOKEN, "new@x.com", Role::User);

    let outcome = controller.navigate("/no/such/page").unwrap();
    assert_eq!(outcome.location, DASHBOARD_PATH);
    let reasons: Vec<_> = outcome.redirects.iter().map(|r| r.reason).collect();
    assert_eq!(reasons, vec![RedirectReason::UnknownRoute, RedirectReason::Alias]);
}

#[tokio::test]
async fn user_on_admin_route_goes_home_and_keeps_session() {
    let controller = offline_controller().await;
    sign_in(store_of(&controller), USER_TOKEN, "new@x.com", Role::User);
    let before = store_of(&controller).read();

    let outcome = controller.navigate("/admin/dashboard").unwrap();
    assert_eq!(outcome.first_reason(), Some(RedirectReason::WrongRole));
    assert_eq!(outcome.redirects[0].to, HOME_PATH);
    assert_eq!(outcome.location, DASHBOARD_PATH);
    assert_eq!(store_of(&controller).read(), before);
}

#[tokio::test]
async fn admin_reaches_admin_console_without_navbar() {
    let controller = offline_controller().await;
    sign_in(store_of(&controller), "admin-token", "admin@x.com", Role::Admin);

    let outcome = controller.navigate("/admin/users").unwrap();
    assert_eq!(outcome.location, "/admin/users");
    assert!(!outcome.navbar);
}

#[tokio::test]
async fn redirect_loop_is_reported() {
    let gateway = gateway_for(&unreachable_provider().await);
    let table = RouteTable::new(vec![], vec![("/a", "/b"), ("/b", "/a")], "/a");
    let controller = NavigationController::new(table, Arc::new(gateway));

    let err = controller.navigate("/a").unwrap_err();
    assert!(matches!(err, NavError::RedirectLoop { ref path } if path == "/a"), "{err:?}");
    assert_eq!(controller.current_location(), None);
}

#[tokio::test]
async fn location_changes_are_published() {
    let controller = offline_controller().await;
    let mut rx = controller.subscribe_location();

    controller.navigate("/register").unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().as_deref(), Some("/register"));

    controller.navigate("/register").unwrap();
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn malformed_record_resolves_anonymous_and_is_cleared() {
    let backend = Arc::new(MemoryStore::new());
    let store = Arc::new(CredentialStore::new(backend.clone()));
    let gateway = AuthGateway::new(&ClientConfig::new(unreachable_provider().await), store).unwrap();
    let controller = NavigationController::new(RouteTable::standard(), Arc::new(gateway));
    backend.set_all(&[(SESSION_KEY, "{\"email\":"), (TOKEN_KEY, USER_TOKEN)]).unwrap();

    let outcome = controller.navigate("/dashboard").unwrap();
    assert_eq!(outcome.location, LOGIN_PATH);
    assert_eq!(backend.get(SESSION_KEY).unwrap(), None);
    assert_eq!(backend.get(TOKEN_KEY).unwrap(), None);
}

// =============================================================================
// login / logout
// =============================================================================

#[tokio::test]
async fn login_replays_remembered_destination() {
    let controller = mock_controller().await;
    controller.navigate("/settings/security").unwrap();

    let outcome = controller.login("new@x.com", "Abcdef1!").await.unwrap();
    assert_eq!(outcome.location, "/settings/security");
    assert_eq!(controller.return_to(), None);
}

#[tokio::test]
async fn login_lands_on_role_home() {
    let controller = mock_controller().await;
    controller.navigate("/login").unwrap();
    assert_eq!(controller.login("new@x.com", "Abcdef1!").await.unwrap().location, DASHBOARD_PATH);

    let admin = mock_controller().await;
    assert_eq!(admin.login("admin@x.com", "Admin123!").await.unwrap().location, ADMIN_HOME_PATH);
}

#[tokio::test]
async fn login_skips_destination_the_role_cannot_view() {
    let controller = mock_controller().await;
    controller.navigate("/admin/analytics").unwrap();
    assert_eq!(controller.return_to().as_deref(), Some("/admin/analytics"));

    let outcome = controller.login("new@x.com", "Abcdef1!").await.unwrap();
    assert_eq!(outcome.location, DASHBOARD_PATH);
}

#[tokio::test]
async fn failed_login_stays_put() {
    let controller = mock_controller().await;
    controller.navigate("/login").unwrap();

    let err = controller.login("x@x.com", "wrong").await.unwrap_err();
    assert!(matches!(err, NavError::Auth(AuthError::InvalidCredentials)), "{err:?}");
    assert_eq!(controller.current_location().as_deref(), Some(LOGIN_PATH));
    assert_eq!(store_of(&controller).read(), None);
}

#[tokio::test]
async fn logout_routes_to_login_even_offline() {
    let controller = offline_controller().await;
    sign_in(store_of(&controller), USER_TOKEN, "new@x.com", Role::User);
    controller.navigate("/pricing").unwrap();

    let outcome = controller.logout().await.unwrap();
    assert_eq!(outcome.location, LOGIN_PATH);
    assert_eq!(outcome.first_reason(), Some(RedirectReason::SignedOut));
    assert_eq!(controller.session(), Session::Anonymous);
    assert_eq!(controller.return_to(), None);
}

#[tokio::test]
async fn logout_from_public_page_still_lands_on_login() {
    let controller = offline_controller().await;
    controller.navigate("/register").unwrap();
    let outcome = controller.logout().await.unwrap();
    assert_eq!(outcome.location, LOGIN_PATH);
}

// =============================================================================
// session-change listener
// =============================================================================

async fn wait_for_location(rx: &mut watch::Receiver<Option<String>>, expected: &str) {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|l| l.as_deref() == Some(expected)))
        .await
        .expect("location change within timeout")
        .expect("controller alive");
}

#[tokio::test]
async fn rejected_token_moves_every_view_to_login() {
    let controller = mock_controller().await;
    sign_in(store_of(&controller), EXPIRED_TOKEN, "new@x.com", Role::User);
    controller.navigate("/template-library").unwrap();

    let second = Arc::new(NavigationController::new(RouteTable::standard(), controller.gateway().clone()));
    second.navigate("/settings/profile").unwrap();

    let _first_listener = controller.spawn_listener();
    let _second_listener = second.spawn_listener();
    let mut first_rx = controller.subscribe_location();
    let mut second_rx = second.subscribe_location();

    let err = controller.gateway().protected(Method::GET, "templates", None).await.unwrap_err();
    assert_eq!(err, AuthError::Unauthorized);

    wait_for_location(&mut first_rx, LOGIN_PATH).await;
    wait_for_location(&mut second_rx, LOGIN_PATH).await;
    assert_eq!(store_of(&controller).read(), None);
    assert_eq!(controller.navigate("/dashboard").unwrap().first_reason(), Some(RedirectReason::NoSession));
    assert_eq!(controller.navigate("/admin").unwrap().first_reason(), Some(RedirectReason::NoSession));
}

#[tokio::test]
async fn listener_exits_when_controller_dropped() {
    let controller = offline_controller().await;
    let store = controller.gateway().store().clone();
    let handle = controller.spawn_listener();
    drop(controller);

    sign_in(&store, USER_TOKEN, "new@x.com", Role::User);
    tokio::time::timeout(Duration::from_secs(2), handle).await.expect("listener exits").unwrap();
}

#[tokio::test]
async fn reevaluate_before_navigation_is_none() {
    let controller = offline_controller().await;
    assert_eq!(controller.reevaluate().unwrap(), None);
}
