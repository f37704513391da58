/// Payment gateway contract
///
/// This module defines the two backend operations the reconciler and the
/// checkout hand-off depend on, and the entitlement hook the reconciler calls
/// once a payment is confirmed.
///
/// # Backend Contract
///
/// ```text
/// POST /payments/checkout {origin_url}  → {url, session_id}
/// GET  /payments/status/{session_id}    → {status, payment_status, amount, currency}
/// ```
///
/// A checkout session is confirmed when `payment_status == "paid"` and dead
/// when `status == "expired"`. Anything else is still pending.
///
/// # Example
///
/// ```
/// use pennywise_payments::gateway::PaymentStatusResponse;
///
/// let status: PaymentStatusResponse = serde_json::from_str(
///     r#"{"status":"complete","payment_status":"paid","amount":9.99,"currency":"usd"}"#,
/// ).unwrap();
///
/// assert!(status.is_paid());
/// assert!(!status.is_expired());
/// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider value of `payment_status` for a settled payment
pub const PAYMENT_STATUS_PAID: &str = "paid";

/// Provider value of `status` for an abandoned checkout session
pub const SESSION_STATUS_EXPIRED: &str = "expired";

/// Gateway errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// The backend rejected the bearer credential (HTTP 401)
    #[error("Unauthorized")]
    Unauthorized,

    /// No session is available to authenticate the request
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The request could not be built from the given input
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

impl GatewayError {
    /// Returns true if the failure may clear up on a later attempt
    ///
    /// Credential and request errors will not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_) | GatewayError::Server { .. } | GatewayError::InvalidResponse(_)
        )
    }
}

/// Result of `POST /payments/checkout`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// External redirect target (the provider's hosted checkout page)
    pub url: String,

    /// Provider checkout session identifier
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Result of `GET /payments/status/{session_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    /// Checkout session status (`open`, `complete`, `expired`)
    #[serde(default)]
    pub status: String,

    /// Payment status (`unpaid`, `paid`, `no_payment_required`)
    #[serde(default)]
    pub payment_status: String,

    /// Amount charged, in major currency units
    #[serde(default)]
    pub amount: Option<f64>,

    /// ISO currency code
    #[serde(default)]
    pub currency: Option<String>,
}

impl PaymentStatusResponse {
    /// Creates a still-pending status
    pub fn pending() -> Self {
        PaymentStatusResponse {
            status: "open".to_string(),
            payment_status: "unpaid".to_string(),
            amount: None,
            currency: None,
        }
    }

    /// Creates a settled status
    pub fn paid(amount: f64, currency: &str) -> Self {
        PaymentStatusResponse {
            status: "complete".to_string(),
            payment_status: PAYMENT_STATUS_PAID.to_string(),
            amount: Some(amount),
            currency: Some(currency.to_string()),
        }
    }

    /// Creates an expired status
    pub fn expired() -> Self {
        PaymentStatusResponse {
            status: SESSION_STATUS_EXPIRED.to_string(),
            payment_status: "unpaid".to_string(),
            amount: None,
            currency: None,
        }
    }

    /// Returns true if the payment has settled
    pub fn is_paid(&self) -> bool {
        self.payment_status == PAYMENT_STATUS_PAID
    }

    /// Returns true if the checkout session can no longer be paid
    pub fn is_expired(&self) -> bool {
        self.status == SESSION_STATUS_EXPIRED
    }
}

/// Backend payment operations
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a provider checkout session for the Pro subscription
    ///
    /// `origin_url` is the client origin the provider returns to.
    async fn create_checkout(&self, origin_url: &str) -> Result<CheckoutSession, GatewayError>;

    /// Queries the status of a checkout session
    async fn payment_status(&self, session_id: &str)
        -> Result<PaymentStatusResponse, GatewayError>;
}

/// Receiver of confirmed entitlement upgrades
///
/// Implemented by the session store. Must be idempotent; the reconciler
/// calls it once per confirmed payment and does not re-verify.
pub trait EntitlementSink: Send + Sync {
    /// Applies the Pro entitlement locally
    fn upgrade_to_pro(&self);
}
