//! Navigation orchestration over the route table.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every navigation resolves the requested path against the table, asks the
//! guard about the current session, and follows redirects until a screen is
//! allowed. The committed location is published on a `watch` channel.
//!
//! A listener task subscribed to the credential store re-runs the decision
//! for the current location on every session change, so a token rejected by
//! any protected call moves every controller sharing the store to `/login`.

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::guard::{self, GuardDecision};
use super::routes::{
    ADMIN_HOME_PATH, DASHBOARD_PATH, HOME_PATH, LOGIN_PATH, Resolution, RouteDescriptor, RouteTable, normalize_path,
};
use crate::net::api::AuthGateway;
use crate::net::types::AuthError;
use crate::state::auth::{Session, SessionResolver};
use crate::state::credentials::SessionEvent;

/// Upper bound on redirects followed for one navigation.
pub const MAX_REDIRECTS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectReason {
    Alias,
    UnknownRoute,
    NoSession,
    WrongRole,
    SignedOut,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub from: String,
    pub to: String,
    pub reason: RedirectReason,
}

/// Where a navigation ended up and how it got there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavOutcome {
    pub location: String,
    pub route: RouteDescriptor,
    pub navbar: bool,
    pub redirects: Vec<Redirect>,
}

impl NavOutcome {
    #[must_use]
    pub fn redirected(&self) -> bool {
        !self.redirects.is_empty()
    }

    /// Reason for the first redirect taken, if any.
    #[must_use]
    pub fn first_reason(&self) -> Option<RedirectReason> {
        self.redirects.first().map(|r| r.reason)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("redirect loop while resolving {path}")]
    RedirectLoop { path: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, Default)]
struct NavState {
    location: Option<String>,
    /// Protected destination the user was last turned away from.
    return_to: Option<String>,
}

pub struct NavigationController {
    table: RouteTable,
    resolver: SessionResolver,
    gateway: Arc<AuthGateway>,
    state: Mutex<NavState>,
    location: watch::Sender<Option<String>>,
}

impl NavigationController {
    #[must_use]
    pub fn new(table: RouteTable, gateway: Arc<AuthGateway>) -> Self {
        let resolver = SessionResolver::new(gateway.store().clone());
        let (location, _) = watch::channel(None);
        Self { table, resolver, gateway, state: Mutex::new(NavState::default()), location }
    }

    fn state(&self) -> MutexGuard<'_, NavState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<AuthGateway> {
        &self.gateway
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.resolver.current()
    }

    #[must_use]
    pub fn current_location(&self) -> Option<String> {
        self.state().location.clone()
    }

    #[must_use]
    pub fn return_to(&self) -> Option<String> {
        self.state().return_to.clone()
    }

    /// Receiver that observes every committed location change.
    #[must_use]
    pub fn subscribe_location(&self) -> watch::Receiver<Option<String>> {
        self.location.subscribe()
    }

    #[must_use]
    pub fn shows_navbar(&self, path: &str) -> bool {
        self.table.shows_navbar(path)
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Navigate to `path` under the current session.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::RedirectLoop`] if the table redirects more than
    /// [`MAX_REDIRECTS`] times.
    pub fn navigate(&self, path: &str) -> Result<NavOutcome, NavError> {
        let session = self.resolver.current();
        let mut state = self.state();
        let outcome = self.resolve(path, &session, &mut state)?;
        self.commit(&mut state, &outcome);
        Ok(outcome)
    }

    /// Re-run the decision for the current location. `None` before the first
    /// navigation.
    ///
    /// # Errors
    ///
    /// Same as [`Self::navigate`].
    pub fn reevaluate(&self) -> Result<Option<NavOutcome>, NavError> {
        let session = self.resolver.current();
        let mut state = self.state();
        let Some(current) = state.location.clone() else {
            return Ok(None);
        };
        let outcome = self.resolve(&current, &session, &mut state)?;
        if outcome.redirected() {
            tracing::info!(from = %current, to = %outcome.location, reason = ?outcome.first_reason(), "session change moved location");
        }
        self.commit(&mut state, &outcome);
        Ok(Some(outcome))
    }

    fn resolve(&self, requested: &str, session: &Session, state: &mut NavState) -> Result<NavOutcome, NavError> {
        let start = normalize_path(requested);
        let mut path = start.clone();
        let mut redirects = Vec::new();

        loop {
            if redirects.len() > MAX_REDIRECTS {
                tracing::warn!(path = %start, "redirect loop");
                return Err(NavError::RedirectLoop { path: start });
            }

            let (to, reason) = match self.table.resolve(&path) {
                Resolution::Alias(to) => (to, RedirectReason::Alias),
                Resolution::Unknown => (self.table.fallback(), RedirectReason::UnknownRoute),
                Resolution::Route(route) => match guard::evaluate(route, session) {
                    GuardDecision::Allowed => {
                        let navbar = self.table.shows_navbar(&path);
                        return Ok(NavOutcome { location: path, route: *route, navbar, redirects });
                    }
                    GuardDecision::DeniedNoSession => {
                        state.return_to = Some(path.clone());
                        (LOGIN_PATH, RedirectReason::NoSession)
                    }
                    GuardDecision::DeniedWrongRole => (HOME_PATH, RedirectReason::WrongRole),
                },
            };

            tracing::debug!(from = %path, to, ?reason, "redirect");
            redirects.push(Redirect { from: path, to: to.to_owned(), reason });
            path = to.to_owned();
        }
    }

    fn commit(&self, state: &mut NavState, outcome: &NavOutcome) {
        state.location = Some(outcome.location.clone());
        self.location.send_if_modified(|current| {
            if current.as_deref() == Some(outcome.location.as_str()) {
                false
            } else {
                *current = Some(outcome.location.clone());
                true
            }
        });
    }

    fn allows(&self, path: &str, session: &Session) -> bool {
        match self.table.resolve(path) {
            Resolution::Route(route) => guard::evaluate(route, session).is_allowed(),
            Resolution::Alias(_) | Resolution::Unknown => false,
        }
    }

    // -------------------------------------------------------------------------
    // Session transitions
    // -------------------------------------------------------------------------

    /// Sign in, then continue at the remembered destination when the new
    /// session may view it, otherwise at the role's landing page.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Auth`] when the sign-in fails; the location is
    /// left unchanged.
    pub async fn login(&self, email: &str, password: &str) -> Result<NavOutcome, NavError> {
        let credentials = self.gateway.login(email, password).await?;
        let session = Session::Authenticated { token: credentials.token, profile: credentials.profile };

        let remembered = self.state().return_to.take();
        let target = match remembered {
            Some(path) if self.allows(&path, &session) => path,
            _ if session.role().is_some_and(identity::Role::is_admin) => ADMIN_HOME_PATH.to_owned(),
            _ => DASHBOARD_PATH.to_owned(),
        };
        self.navigate(&target)
    }

    /// Sign out and move to the login screen whatever the current route.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Auth`] if the local record could not be removed;
    /// the location still moves to the login screen.
    pub async fn logout(&self) -> Result<NavOutcome, NavError> {
        let signed_out = self.gateway.logout().await;

        let session = self.resolver.current();
        let mut state = self.state();
        state.return_to = None;
        let previous = state.location.clone();
        let mut outcome = self.resolve(LOGIN_PATH, &session, &mut state)?;
        if let Some(from) = previous.filter(|p| p != LOGIN_PATH) {
            outcome.redirects.insert(0, Redirect { from, to: LOGIN_PATH.to_owned(), reason: RedirectReason::SignedOut });
        }
        self.commit(&mut state, &outcome);
        drop(state);

        signed_out?;
        Ok(outcome)
    }

    /// React to one credential-store event.
    pub fn handle_event(&self, event: &SessionEvent) -> Option<NavOutcome> {
        match event {
            SessionEvent::Stored(record) => tracing::debug!(email = %record.email, "session stored"),
            SessionEvent::Cleared(reason) => tracing::debug!(?reason, "session cleared"),
        }
        match self.reevaluate() {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "re-evaluation after session change failed");
                None
            }
        }
    }

    /// Spawn the task that re-evaluates the current location on every
    /// session change. The task holds a weak reference and exits once the
    /// controller is dropped.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.resolver.store().subscribe();
        let controller = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => Some(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session listener lagged");
                        None
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                match event {
                    Some(event) => {
                        controller.handle_event(&event);
                    }
                    None => {
                        if let Err(e) = controller.reevaluate() {
                            tracing::warn!(error = %e, "re-evaluation after lag failed");
                        }
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for NavigationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationController")
            .field("routes", &self.table.routes().len())
            .field("location", &self.current_location())
            .finish_non_exhaustive()
    }
}
