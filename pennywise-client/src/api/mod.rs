/// Backend identity API
///
/// This module defines the identity endpoints the session store consumes and
/// the hook the HTTP layer uses to report an invalid bearer credential.
///
/// # Endpoints
///
/// ```text
/// POST /auth/register {name, email, password} → {token, user}
/// POST /auth/login    {email, password}       → {token, user}
/// GET  /auth/me                               → user
/// PUT  /auth/pin      {pin}                   → 2xx
/// POST /auth/verify-pin {pin}                 → 2xx | 401
/// POST /auth/forgot-password?email=           → 2xx
/// ```
///
/// # Implementations
///
/// - [`HttpApi`]: reqwest client against a live backend
/// - [`MockAuthApi`]: in-memory accounts for tests and demos

pub mod http;
pub mod mock;

pub use http::HttpApi;
pub use mock::MockAuthApi;

use async_trait::async_trait;
use pennywise_payments::gateway::GatewayError;
use pennywise_shared::auth::credentials::{
    ForgotPasswordRequest, LoginRequest, PinRequest, RegisterRequest,
};
use pennywise_shared::models::User;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Login or registration was rejected
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// PIN verification was rejected
    #[error("Invalid PIN")]
    InvalidPin,

    /// The bearer credential was rejected (HTTP 401)
    #[error("Unauthorized")]
    Unauthorized,

    /// The endpoint needs a bearer credential and none is stored
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The response body did not match the contract
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Returns true if the backend answered and refused the credential
    ///
    /// Transport failures, 5xx answers and undecodable bodies say nothing
    /// about the credential itself.
    pub fn rejects_credential(&self) -> bool {
        match self {
            ApiError::Unauthorized | ApiError::InvalidCredentials | ApiError::NotAuthenticated => {
                true
            }
            ApiError::Server { status, .. } => (400..500).contains(status),
            ApiError::InvalidPin
            | ApiError::InvalidRequest(_)
            | ApiError::Transport(_)
            | ApiError::InvalidResponse(_) => false,
        }
    }
}

impl From<ApiError> for GatewayError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized | ApiError::InvalidCredentials | ApiError::InvalidPin => {
                GatewayError::Unauthorized
            }
            ApiError::NotAuthenticated => GatewayError::NotAuthenticated,
            ApiError::InvalidRequest(msg) => GatewayError::InvalidRequest(msg),
            ApiError::Transport(msg) => GatewayError::Transport(msg),
            ApiError::Server { status, message } => GatewayError::Server { status, message },
            ApiError::InvalidResponse(msg) => GatewayError::InvalidResponse(msg),
        }
    }
}

/// Result of login and registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Bearer credential for subsequent requests
    pub token: String,

    /// Signed-in user
    pub user: User,
}

/// Identity endpoints
///
/// Implementations attach the stored bearer credential themselves; callers
/// never pass tokens around.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges credentials for a session
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError>;

    /// Creates an account and signs it in
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError>;

    /// Fetches the current user for the stored credential
    async fn me(&self) -> Result<User, ApiError>;

    /// Sets or replaces the account PIN
    async fn update_pin(&self, request: &PinRequest) -> Result<(), ApiError>;

    /// Checks a PIN against the account
    async fn verify_pin(&self, request: &PinRequest) -> Result<(), ApiError>;

    /// Requests a password reset email
    async fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<(), ApiError>;
}

/// Receiver of the global `401` signal
///
/// Registered with the HTTP layer; invoked for every `401` except the
/// credential checks of login and PIN verification.
pub trait UnauthorizedHandler: Send + Sync {
    /// Clears the session and forces the login view
    fn on_unauthorized(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_credential() {
        assert!(ApiError::Unauthorized.rejects_credential());
        assert!(ApiError::NotAuthenticated.rejects_credential());
        assert!(ApiError::Server {
            status: 404,
            message: "User not found".to_string()
        }
        .rejects_credential());

        assert!(!ApiError::Transport("connection refused".to_string()).rejects_credential());
        assert!(!ApiError::Server {
            status: 503,
            message: "unavailable".to_string()
        }
        .rejects_credential());
        assert!(!ApiError::InvalidResponse("eof".to_string()).rejects_credential());
    }
}
