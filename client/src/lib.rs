//! Scribe session controller.
//!
//! SYSTEM CONTEXT
//! ==============
//! Decides, for every navigation request, whether the current user may view a
//! screen, and keeps the locally cached identity in step with the remote
//! authentication provider.
//!
//! Layering, leaf to root:
//! - `state::storage` durable key-value backends
//! - `state::credentials` the single writer-guarded credential record
//! - `state::auth` session resolution from the stored record
//! - `net::api` provider calls (login, register, logout, password flows)
//! - `nav::guard` per-navigation allow/deny decisions
//! - `nav::controller` route table orchestration and session-change reactions

pub mod nav;
pub mod net;
pub mod state;

pub use nav::controller::{NavError, NavOutcome, NavigationController, Redirect, RedirectReason};
pub use nav::guard::GuardDecision;
pub use nav::routes::{Capability, RouteDescriptor, RouteTable};
pub use net::api::AuthGateway;
pub use net::config::{ClientConfig, ClientTimeouts, ConfigError};
pub use net::types::{AuthError, AuthResult, Credentials};
pub use state::auth::{Session, SessionResolver};
pub use state::credentials::{ClearReason, CredentialRecord, CredentialStore, SessionEvent};
pub use state::storage::{FileStore, KeyValueStore, MemoryStore, StoreError};

#[cfg(test)]
pub(crate) mod test_support;
