//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own account, session, and reset-code logic so route
//! handlers can stay focused on protocol translation and auth plumbing.

pub mod accounts;
pub mod reset;
pub mod session;
