//! Per-navigation access decision.
//!
//! Pure: the decision depends only on the route and the session passed in,
//! and is recomputed on every navigation.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use super::routes::{Capability, RouteDescriptor};
use crate::state::auth::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Allowed,
    /// Protected route with no session; continue at the login screen.
    DeniedNoSession,
    /// Admin route for a non-admin session; continue at home.
    DeniedWrongRole,
}

impl GuardDecision {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[must_use]
pub fn evaluate(route: &RouteDescriptor, session: &Session) -> GuardDecision {
    match (route.capability, session.role()) {
        (Capability::Public, _) => GuardDecision::Allowed,
        (_, None) => GuardDecision::DeniedNoSession,
        (Capability::Admin, Some(role)) if !role.is_admin() => GuardDecision::DeniedWrongRole,
        (Capability::User | Capability::Admin, Some(_)) => GuardDecision::Allowed,
    }
}
