//! Route-level authorization.
//!
//! SYSTEM CONTEXT
//! ==============
//! `routes` declares the navigable surface, `guard` makes the per-navigation
//! decision, and `controller` follows redirects and reacts to session changes.

pub mod controller;
pub mod guard;
pub mod routes;
