/// Scripted payment gateway for testing and demos
///
/// `MockGateway` replays a queue of status responses, one per poll, and falls
/// back to a pending status once the script runs out. It counts every status
/// query so tests can assert exactly how many polls were issued.
///
/// # Example
///
/// ```
/// use pennywise_payments::gateway::{PaymentGateway, PaymentStatusResponse};
/// use pennywise_payments::mock::MockGateway;
///
/// # async fn example() {
/// let gateway = MockGateway::new()
///     .then_status(PaymentStatusResponse::pending())
///     .then_status(PaymentStatusResponse::paid(9.99, "usd"));
///
/// assert!(!gateway.payment_status("cs_1").await.unwrap().is_paid());
/// assert!(gateway.payment_status("cs_1").await.unwrap().is_paid());
/// assert_eq!(gateway.polls(), 2);
/// # }
/// ```

use crate::gateway::{
    CheckoutSession, EntitlementSink, GatewayError, PaymentGateway, PaymentStatusResponse,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Mock gateway with a scripted status sequence
#[derive(Debug, Default)]
pub struct MockGateway {
    script: Mutex<VecDeque<Result<PaymentStatusResponse, GatewayError>>>,
    polls: AtomicU32,
    latency: Option<Duration>,
    checkout_url: Option<String>,
}

impl MockGateway {
    /// Creates a gateway that reports pending forever
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a status response to the script
    pub fn then_status(self, status: PaymentStatusResponse) -> Self {
        self.push(Ok(status));
        self
    }

    /// Appends a failed query to the script
    pub fn then_error(self, error: GatewayError) -> Self {
        self.push(Err(error));
        self
    }

    /// Appends `count` pending responses to the script
    pub fn then_pending(self, count: usize) -> Self {
        for _ in 0..count {
            self.push(Ok(PaymentStatusResponse::pending()));
        }
        self
    }

    /// Delays every status query
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Sets the URL returned by checkout
    pub fn with_checkout_url(mut self, url: impl Into<String>) -> Self {
        self.checkout_url = Some(url.into());
        self
    }

    /// Number of status queries received so far
    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    fn push(&self, entry: Result<PaymentStatusResponse, GatewayError>) {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(entry);
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout(&self, origin_url: &str) -> Result<CheckoutSession, GatewayError> {
        let url = self
            .checkout_url
            .clone()
            .unwrap_or_else(|| format!("https://checkout.example/pay?return={}", origin_url));

        Ok(CheckoutSession {
            url,
            session_id: Some("cs_mock".to_string()),
        })
    }

    async fn payment_status(
        &self,
        session_id: &str,
    ) -> Result<PaymentStatusResponse, GatewayError> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(session_id = %session_id, poll, "Mock gateway status query");

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(PaymentStatusResponse::pending()))
    }
}

/// Entitlement sink that counts upgrades
#[derive(Debug, Default)]
pub struct CountingSink {
    upgrades: AtomicU32,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of upgrades received
    pub fn upgrades(&self) -> u32 {
        self.upgrades.load(Ordering::SeqCst)
    }
}

impl EntitlementSink for CountingSink {
    fn upgrade_to_pro(&self) {
        self.upgrades.fetch_add(1, Ordering::SeqCst);
    }
}
