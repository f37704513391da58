//! # Pennywise Shared Library
//!
//! Types and pure logic shared by the Pennywise client crates: the session
//! data model, route gating, entitlement checks, credential validation and
//! the credential persistence port.
//!
//! ## Module Organization
//!
//! - `models`: User snapshot and session state machine
//! - `auth`: Route gate, entitlement model, credential payloads
//! - `storage`: Persistence port for the token and user snapshot

pub mod auth;
pub mod models;
pub mod storage;

/// Current version of the Pennywise shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
