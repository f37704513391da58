/// Error handling for the client core
///
/// This module provides the error type every session operation returns.
/// Variants follow how a caller is expected to react:
///
/// - **Local, user-facing**: `InvalidCredentials`, `InvalidPin`, `Validation`
///   (show inline, keep the current state)
/// - **Global, structural**: `Unauthorized` (the session was already cleared
///   and a navigation to login published)
/// - **Retryable**: `Network`, `Server`
/// - **Ordering**: `Superseded` (a newer session operation won; nothing was
///   applied)
///
/// # Example
///
/// ```
/// use pennywise_client::error::{ClientError, ClientResult};
///
/// fn check(pin_ok: bool) -> ClientResult<()> {
///     if !pin_ok {
///         return Err(ClientError::InvalidPin);
///     }
///     Ok(())
/// }
///
/// assert_eq!(check(false).unwrap_err().to_string(), "Incorrect PIN");
/// ```

use crate::api::ApiError;
use pennywise_payments::gateway::GatewayError;
use pennywise_shared::auth::credentials::ValidationErrorDetail;
use pennywise_shared::auth::entitlement::EntitlementError;
use pennywise_shared::storage::StorageError;
use thiserror::Error;

/// Client result type alias
pub type ClientResult<T> = Result<T, ClientError>;

/// Unified client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// Login or registration rejected
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The bearer credential is invalid or expired
    #[error("Session expired, please sign in again")]
    Unauthorized,

    /// PIN verification failed
    #[error("Incorrect PIN")]
    InvalidPin,

    /// The operation needs a signed-in session
    #[error("Not signed in")]
    NotAuthenticated,

    /// PIN verification was requested while unlocked
    #[error("App is not locked")]
    NotLocked,

    /// Input rejected before any network call
    #[error("Validation failed: {}", describe(.0))]
    Validation(Vec<ValidationErrorDetail>),

    /// A newer session operation completed first; the response was discarded
    #[error("Superseded by a newer session operation")]
    Superseded,

    /// The request failed in transit or the response was unreadable
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with an error status
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Input that could not be turned into a request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Credential persistence failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A Pro capability was requested by a free account
    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
}

fn describe(details: &[ValidationErrorDetail]) -> String {
    details
        .iter()
        .map(|d| format!("{}: {}", d.field, d.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ApiError> for ClientError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidCredentials => ClientError::InvalidCredentials,
            ApiError::InvalidPin => ClientError::InvalidPin,
            ApiError::Unauthorized => ClientError::Unauthorized,
            ApiError::NotAuthenticated => ClientError::NotAuthenticated,
            ApiError::InvalidRequest(msg) => ClientError::InvalidRequest(msg),
            ApiError::Transport(msg) => ClientError::Network(msg),
            ApiError::InvalidResponse(msg) => {
                ClientError::Network(format!("invalid response: {}", msg))
            }
            ApiError::Server { status, message } => ClientError::Server { status, message },
        }
    }
}

impl From<GatewayError> for ClientError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unauthorized => ClientError::Unauthorized,
            GatewayError::NotAuthenticated => ClientError::NotAuthenticated,
            GatewayError::InvalidRequest(msg) => ClientError::InvalidRequest(msg),
            GatewayError::Transport(msg) => ClientError::Network(msg),
            GatewayError::InvalidResponse(msg) => {
                ClientError::Network(format!("invalid response: {}", msg))
            }
            GatewayError::Server { status, message } => ClientError::Server { status, message },
        }
    }
}

impl From<Vec<ValidationErrorDetail>> for ClientError {
    fn from(details: Vec<ValidationErrorDetail>) -> Self {
        ClientError::Validation(details)
    }
}
