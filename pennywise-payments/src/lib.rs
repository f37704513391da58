///! # Pennywise Payments Library
///!
///! This library confirms Pro subscription payments made through an external
///! checkout provider and applies the resulting entitlement.
///!
///! ## Modules
///!
///! - `gateway`: Backend payment contract and entitlement hook
///! - `checkout`: Checkout hand-off
///! - `return_route`: Interpreting the provider's return URL
///! - `reconciler`: Bounded status polling state machine
///! - `mock`: Scripted gateway for tests and demos
///!
///! ## Example
///!
///! ```no_run
///! use pennywise_payments::mock::{CountingSink, MockGateway};
///! use pennywise_payments::reconciler::{PaymentReconciler, ReconcilerConfig};
///! use std::sync::Arc;
///!
///! # async fn example() {
///! let reconciler = PaymentReconciler::new(
///!     "cs_123",
///!     Arc::new(MockGateway::new()),
///!     Arc::new(CountingSink::new()),
///!     ReconcilerConfig::default(),
///! );
///! let _task = reconciler.start();
///! # }
///! ```

pub mod checkout;
pub mod gateway;
pub mod mock;
pub mod reconciler;
pub mod return_route;

pub use gateway::{
    CheckoutSession, EntitlementSink, GatewayError, PaymentGateway, PaymentStatusResponse,
};
pub use reconciler::{
    PaymentReconciler, ReconcileOutcome, ReconcileState, ReconcileStatus, ReconcileTask,
    ReconcileView, ReconcilerConfig,
};
pub use return_route::{parse_return, PaymentReturn};
