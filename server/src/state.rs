//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the typed config plus the in-memory account, session, and reset
//! stores. Every store is a cheap handle over `Arc`-shared maps, so cloning
//! the state per request shares the same data.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::rate_limit::LoginThrottle;
use crate::services::accounts::AccountStore;
use crate::services::reset::ResetStore;
use crate::services::session::SessionStore;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub accounts: AccountStore,
    pub sessions: SessionStore,
    pub resets: ResetStore,
    pub login_throttle: LoginThrottle,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            accounts: AccountStore::new(config.hash_cost),
            sessions: SessionStore::new(config.session_ttl),
            resets: ResetStore::new(config.otp_ttl),
            login_throttle: LoginThrottle::new(config.login_max_failures, config.login_failure_window),
            config: Arc::new(config),
        }
    }
}
