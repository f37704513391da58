/// Payment reconciliation
///
/// This module implements the polling state machine that confirms an
/// externally completed checkout and promotes the local session to Pro.
///
/// # States
///
/// ```text
///              ┌──────── paid ────────> Success   (upgrade_to_pro, once)
///              │
/// Checking ────┼─────── expired ──────> Failed
///    ↺         │
///  pending /   └── max attempts spent ─> TimedOut
///  transient
///  error
/// ```
///
/// `Checking` is the only non-terminal state. Once a terminal state is
/// reached no further status query is issued.
///
/// # Polling Strategy
///
/// - Fixed interval between polls (default 2 seconds, no backoff)
/// - At most `max_attempts` polls (default 10); the 10th unresolved poll
///   moves straight to `TimedOut`
/// - Transient query errors consume an attempt like a pending answer
/// - A `401` ends reconciliation as `Failed`: the session is already gone
///
/// # Lifetime
///
/// A reconciler runs at most one polling loop. A second `start` while the
/// loop is active is ignored. Dropping the [`ReconcileTask`] (or calling
/// `cancel`) invalidates the loop synchronously: no further poll is
/// scheduled and a response that arrives afterwards is discarded.
///
/// # Example
///
/// ```
/// use pennywise_payments::gateway::PaymentStatusResponse;
/// use pennywise_payments::mock::{CountingSink, MockGateway};
/// use pennywise_payments::reconciler::{
///     PaymentReconciler, ReconcileOutcome, ReconcileStatus, ReconcilerConfig,
/// };
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() {
/// let gateway = Arc::new(MockGateway::new().then_status(PaymentStatusResponse::paid(9.99, "usd")));
/// let sink = Arc::new(CountingSink::new());
/// let config = ReconcilerConfig::new(Duration::from_millis(10), 10);
///
/// let reconciler = PaymentReconciler::new("cs_123", gateway, sink.clone(), config);
/// let task = reconciler.start().expect("first start");
///
/// assert_eq!(task.finished().await, ReconcileOutcome::Finished(ReconcileStatus::Success));
/// assert_eq!(sink.upgrades(), 1);
/// # }
/// ```

use crate::gateway::{EntitlementSink, GatewayError, PaymentGateway, PaymentStatusResponse};
use chrono::{DateTime, Utc};
use pennywise_shared::auth::gate::Route;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default delay between status polls (2 seconds)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Default poll budget
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Reconciler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Fixed delay between polls
    pub poll_interval: Duration,

    /// Maximum number of polls before timing out
    pub max_attempts: u32,
}

impl ReconcilerConfig {
    /// Creates a configuration
    ///
    /// A zero attempt budget is raised to one poll.
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        ReconcilerConfig {
            poll_interval,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

/// Reconciliation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    /// Still waiting for confirmation
    Checking,

    /// Payment confirmed and entitlement applied
    Success,

    /// Checkout session expired (or the session was revoked)
    Failed,

    /// Poll budget spent without a verdict
    TimedOut,
}

impl ReconcileStatus {
    /// Returns true for every status except `Checking`
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReconcileStatus::Checking)
    }
}

impl fmt::Display for ReconcileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileStatus::Checking => write!(f, "checking"),
            ReconcileStatus::Success => write!(f, "success"),
            ReconcileStatus::Failed => write!(f, "failed"),
            ReconcileStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Observable reconciliation state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileState {
    /// Current status
    pub status: ReconcileStatus,

    /// Polls completed so far (never exceeds `max_attempts`)
    pub attempt_count: u32,

    /// Poll budget
    pub max_attempts: u32,

    /// Last query error, if the most recent poll failed
    pub last_error: Option<String>,

    /// Amount charged, once confirmed
    pub amount: Option<f64>,

    /// Currency of the charge, once confirmed
    pub currency: Option<String>,

    /// When the reconciler was created
    pub started_at: DateTime<Utc>,

    /// When the most recent poll completed
    pub last_polled_at: Option<DateTime<Utc>>,
}

impl ReconcileState {
    fn new(max_attempts: u32) -> Self {
        ReconcileState {
            status: ReconcileStatus::Checking,
            attempt_count: 0,
            max_attempts,
            last_error: None,
            amount: None,
            currency: None,
            started_at: Utc::now(),
            last_polled_at: None,
        }
    }
}

/// What the payment return page renders
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ReconcileView {
    /// Progress indicator with the 1-indexed attempt in flight
    Checking { attempt: u32, max_attempts: u32 },

    /// Confirmation with a continuation into the Pro feature
    Success {
        continue_to: Route,
        amount: Option<f64>,
        currency: Option<String>,
    },

    /// Payment failed; retry goes back to checkout
    Failed { retry_to: Route },

    /// Confirmation did not arrive in time; retry goes back to checkout
    TimedOut { retry_to: Route },
}

impl From<&ReconcileState> for ReconcileView {
    fn from(state: &ReconcileState) -> Self {
        match state.status {
            ReconcileStatus::Checking => ReconcileView::Checking {
                attempt: (state.attempt_count + 1).min(state.max_attempts),
                max_attempts: state.max_attempts,
            },
            ReconcileStatus::Success => ReconcileView::Success {
                continue_to: Route::Insights,
                amount: state.amount,
                currency: state.currency.clone(),
            },
            ReconcileStatus::Failed => ReconcileView::Failed {
                retry_to: Route::Settings,
            },
            ReconcileStatus::TimedOut => ReconcileView::TimedOut {
                retry_to: Route::Settings,
            },
        }
    }
}

/// How a polling loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Reached a terminal status
    Finished(ReconcileStatus),

    /// Torn down before reaching one
    Cancelled,
}

/// Verdict for a single poll
enum Verdict {
    Paid(PaymentStatusResponse),
    Expired,
    Revoked,
    Pending(Option<GatewayError>),
}

impl Verdict {
    fn classify(result: Result<PaymentStatusResponse, GatewayError>) -> Self {
        match result {
            Ok(status) if status.is_paid() => Verdict::Paid(status),
            Ok(status) if status.is_expired() => Verdict::Expired,
            Ok(_) => Verdict::Pending(None),
            Err(e) if e.is_transient() => Verdict::Pending(Some(e)),
            Err(_) => Verdict::Revoked,
        }
    }
}

/// Polling coordinator for one checkout session
pub struct PaymentReconciler {
    /// Instance id for logging
    id: Uuid,

    /// External checkout session id
    session_id: String,

    config: ReconcilerConfig,

    gateway: Arc<dyn PaymentGateway>,

    sink: Arc<dyn EntitlementSink>,

    state: watch::Sender<ReconcileState>,

    /// Reentrancy guard: set while a loop is active
    running: AtomicBool,

    /// Lifetime handle; cancelled on teardown
    cancel_token: CancellationToken,
}

impl PaymentReconciler {
    /// Creates a reconciler in the `Checking` state
    ///
    /// # Arguments
    ///
    /// * `session_id` - Checkout session id from the return URL
    /// * `gateway` - Status source
    /// * `sink` - Receives the upgrade once the payment is confirmed
    /// * `config` - Poll interval and budget
    pub fn new(
        session_id: impl Into<String>,
        gateway: Arc<dyn PaymentGateway>,
        sink: Arc<dyn EntitlementSink>,
        config: ReconcilerConfig,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(ReconcileState::new(config.max_attempts));

        Arc::new(PaymentReconciler {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            config,
            gateway,
            sink,
            state,
            running: AtomicBool::new(false),
            cancel_token: CancellationToken::new(),
        })
    }

    /// Checkout session being reconciled
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ReconcileState {
        self.state.borrow().clone()
    }

    /// Current status
    pub fn status(&self) -> ReconcileStatus {
        self.state.borrow().status
    }

    /// Presentational view of the current state
    pub fn view(&self) -> ReconcileView {
        ReconcileView::from(&*self.state.borrow())
    }

    /// Subscribes to state changes
    pub fn subscribe(&self) -> watch::Receiver<ReconcileState> {
        self.state.subscribe()
    }

    /// Returns true while a polling loop is active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns true once torn down
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Starts the polling loop in a background task
    ///
    /// Returns `None` without polling if a loop is already active, the
    /// reconciler reached a terminal status, or it was cancelled.
    pub fn start(self: &Arc<Self>) -> Option<ReconcileTask> {
        if self.cancel_token.is_cancelled() || self.status().is_terminal() {
            tracing::debug!(
                reconciler_id = %self.id,
                status = %self.status(),
                "Reconciler is finished, not starting"
            );
            return None;
        }

        if !self.try_acquire() {
            return None;
        }

        let reconciler = Arc::clone(self);
        let join = tokio::spawn(async move {
            let outcome = reconciler.poll_loop().await;
            reconciler.running.store(false, Ordering::SeqCst);
            outcome
        });

        Some(ReconcileTask {
            cancel_token: self.cancel_token.clone(),
            join: Some(join),
        })
    }

    /// Tears the reconciler down
    ///
    /// Idempotent. The status stays where it was; an in-flight response is
    /// discarded and no further poll is scheduled.
    pub fn cancel(&self) {
        if !self.cancel_token.is_cancelled() {
            tracing::debug!(reconciler_id = %self.id, "Reconciler cancelled");
        }
        self.cancel_token.cancel();
    }

    fn try_acquire(&self) -> bool {
        let acquired = self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();

        if !acquired {
            tracing::debug!(
                reconciler_id = %self.id,
                "Polling loop already active, ignoring start"
            );
        }

        acquired
    }

    async fn poll_loop(&self) -> ReconcileOutcome {
        tracing::info!(
            reconciler_id = %self.id,
            session_id = %self.session_id,
            max_attempts = self.config.max_attempts,
            "Starting payment reconciliation"
        );

        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return ReconcileOutcome::Cancelled,
                result = self.gateway.payment_status(&self.session_id) => result,
            };

            // Teardown may have raced the response.
            if self.cancel_token.is_cancelled() {
                tracing::debug!(reconciler_id = %self.id, "Discarding late status response");
                return ReconcileOutcome::Cancelled;
            }

            if let Some(status) = self.apply(Verdict::classify(result)) {
                return ReconcileOutcome::Finished(status);
            }

            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return ReconcileOutcome::Cancelled,
                _ = sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Records one poll; returns the terminal status if reached
    fn apply(&self, verdict: Verdict) -> Option<ReconcileStatus> {
        let max_attempts = self.config.max_attempts;
        let mut upgrade = false;

        self.state.send_modify(|state| {
            state.attempt_count = (state.attempt_count + 1).min(max_attempts);
            state.last_polled_at = Some(Utc::now());
            state.last_error = None;

            match verdict {
                Verdict::Paid(status) => {
                    state.status = ReconcileStatus::Success;
                    state.amount = status.amount;
                    state.currency = status.currency;
                    upgrade = true;
                }
                Verdict::Expired => state.status = ReconcileStatus::Failed,
                Verdict::Revoked => {
                    state.status = ReconcileStatus::Failed;
                    state.last_error = Some(GatewayError::Unauthorized.to_string());
                }
                Verdict::Pending(error) => {
                    state.last_error = error.map(|e| e.to_string());
                    if state.attempt_count >= max_attempts {
                        state.status = ReconcileStatus::TimedOut;
                    }
                }
            }
        });

        let state = self.state.borrow().clone();

        if upgrade {
            self.sink.upgrade_to_pro();
        }

        match state.status {
            ReconcileStatus::Checking => {
                match &state.last_error {
                    Some(error) => tracing::warn!(
                        reconciler_id = %self.id,
                        attempt = state.attempt_count,
                        error = %error,
                        "Payment status query failed, will retry"
                    ),
                    None => tracing::debug!(
                        reconciler_id = %self.id,
                        attempt = state.attempt_count,
                        "Payment still pending"
                    ),
                }
                None
            }
            status => {
                tracing::info!(
                    reconciler_id = %self.id,
                    session_id = %self.session_id,
                    attempts = state.attempt_count,
                    status = %status,
                    "Payment reconciliation finished"
                );
                Some(status)
            }
        }
    }
}

impl fmt::Debug for PaymentReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentReconciler")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// Handle to a running polling loop
///
/// Dropping the handle without awaiting [`ReconcileTask::finished`] cancels
/// the loop.
#[derive(Debug)]
pub struct ReconcileTask {
    cancel_token: CancellationToken,
    join: Option<JoinHandle<ReconcileOutcome>>,
}

impl ReconcileTask {
    /// Cancels the loop
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Waits for the loop to end
    pub async fn finished(mut self) -> ReconcileOutcome {
        let Some(join) = self.join.take() else {
            return ReconcileOutcome::Cancelled;
        };

        match join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Reconciler task aborted");
                ReconcileOutcome::Cancelled
            }
        }
    }
}

impl Drop for ReconcileTask {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.cancel_token.cancel();
        }
    }
}
