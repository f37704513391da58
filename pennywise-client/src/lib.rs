//! # Pennywise Client Library
//!
//! This library provides the client core of Pennywise: the signed-in
//! session, the PIN lock, entitlement checks and payment confirmation,
//! against the Pennywise REST backend.
//!
//! ## Modules
//!
//! - `api`: Backend identity API, HTTP client and global `401` interception
//! - `client`: Assembly of the core from configuration
//! - `config`: Configuration management
//! - `error`: Error taxonomy
//! - `navigation`: Forced navigation channel
//! - `session`: Session store

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod navigation;
pub mod session;

pub use client::Pennywise;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use session::SessionStore;
