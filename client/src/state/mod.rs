//! Client-side identity state.
//!
//! SYSTEM CONTEXT
//! ==============
//! `storage` abstracts the durable key-value backend, `credentials` owns the
//! persisted session record and broadcasts changes, and `auth` derives the
//! current [`auth::Session`] from it. Nothing outside `credentials` touches
//! the backend keys directly.

pub mod auth;
pub mod credentials;
pub mod storage;
