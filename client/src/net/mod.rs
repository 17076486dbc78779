//! Networking modules for the authentication provider.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` performs the provider calls, `config` reads the client settings, and
//! `types` defines the normalized outcome of every call.

pub mod api;
pub mod config;
pub mod types;
