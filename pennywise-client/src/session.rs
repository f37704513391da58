/// Session store
///
/// The session store is the single owner of the signed-in identity, the PIN
/// lock and the persisted credentials. Every mutation goes through a named
/// operation and the [`SessionState::apply`] reducer; observers follow along
/// through a `watch` channel.
///
/// # Operations
///
/// | Operation        | Network              | Persists | Notes                                  |
/// |------------------|----------------------|----------|----------------------------------------|
/// | `bootstrap`      | `GET /auth/me`       | yes      | rejection signs out and purges         |
/// | `login`          | `POST /auth/login`   | yes      | locked iff the user has a PIN          |
/// | `register`       | `POST /auth/register`| yes      | never starts locked                    |
/// | `logout`         |                      | purge    | idempotent                             |
/// | `update_pin`     | `PUT /auth/pin`      | yes      |                                        |
/// | `verify_pin`     | `POST /auth/verify-pin` | no    | only while locked                      |
/// | `lock_app`       |                      | no       | no-op without a PIN                    |
/// | `upgrade_to_pro` |                      | no       | idempotent, optimistic                 |
/// | `refresh`        | `GET /auth/me`       | yes      | keeps the lock flag                    |
///
/// # Ordering
///
/// Operations may overlap. Identity-replacing operations (bootstrap, login,
/// register, logout, invalidation) advance an epoch when they start, and a
/// response is applied only if no other identity operation started since.
/// Operations on the current identity (PIN, refresh) additionally require the
/// session token to be unchanged. A stale response is discarded and reported
/// as [`ClientError::Superseded`].
///
/// Persisted credentials are written inside the same critical section as the
/// in-memory state, token and user together. A PIN value reported by the
/// backend is replaced by a marker before it is held or written.
///
/// # Example
///
/// ```
/// use pennywise_client::api::MockAuthApi;
/// use pennywise_client::session::SessionStore;
/// use pennywise_shared::auth::gate::GateDecision;
/// use pennywise_shared::storage::MemoryCredentialStore;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), pennywise_client::error::ClientError> {
/// let api = Arc::new(MockAuthApi::new().with_account("Ada", "ada@example.com", "secret1"));
/// let store = SessionStore::new(api, Arc::new(MemoryCredentialStore::new()));
///
/// store.bootstrap().await;
/// assert_eq!(store.gate(), GateDecision::RedirectToLogin);
///
/// store.login("ada@example.com", "secret1").await?;
/// assert_eq!(store.gate(), GateDecision::ShowContent);
/// # Ok(())
/// # }
/// ```

use crate::api::{ApiError, AuthApi, UnauthorizedHandler};
use crate::error::{ClientError, ClientResult};
use crate::navigation::{Navigator, Redirect};
use pennywise_payments::gateway::EntitlementSink;
use pennywise_shared::auth::credentials::{
    validate_request, ForgotPasswordRequest, LoginRequest, PinRequest, RegisterRequest,
};
use pennywise_shared::auth::entitlement::{Capability, Entitlement};
use pennywise_shared::auth::gate::{GateDecision, Route};
use pennywise_shared::models::{AuthenticatedSession, SessionAction, SessionState, User};
use pennywise_shared::storage::{CredentialStore, StoredCredentials};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

/// Snapshot of the identity an in-flight request belongs to
#[derive(Debug, Clone)]
struct Ticket {
    epoch: u64,

    /// Token the request was issued for; `None` for identity-replacing operations
    token: Option<String>,
}

/// Single writer of session state
pub struct SessionStore {
    api: Arc<dyn AuthApi>,
    credentials: Arc<dyn CredentialStore>,
    state: watch::Sender<SessionState>,
    epoch: AtomicU64,
    navigator: Navigator,
}

impl SessionStore {
    /// Creates a store in the loading state
    ///
    /// Call [`SessionStore::bootstrap`] before reading session fields.
    pub fn new(api: Arc<dyn AuthApi>, credentials: Arc<dyn CredentialStore>) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::default());

        Arc::new(SessionStore {
            api,
            credentials,
            state,
            epoch: AtomicU64::new(0),
            navigator: Navigator::new(),
        })
    }

    /// Restores the session from persisted credentials
    ///
    /// A missing, unreadable or rejected credential resolves to the signed
    /// out state; it is never reported as an error. Loading is cleared in
    /// every case.
    ///
    /// Stored credentials are purged only when the backend refuses them. If
    /// the backend cannot be reached the session starts signed out but the
    /// credentials stay on disk for the next launch.
    pub async fn bootstrap(&self) -> SessionState {
        let ticket = self.advance();

        let stored = self.credentials.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read stored credentials");
            None
        });

        match stored {
            None => {
                tracing::debug!("No stored session");
                self.discard_if_current(&ticket);
            }
            Some(stored) => match self.api.me().await {
                Ok(user) => {
                    let session = AuthenticatedSession::new(stored.token, user);
                    let locked = session.is_locked();
                    match self.commit(&ticket, SessionAction::Established(session)) {
                        Ok(()) => tracing::info!(locked, "Session restored"),
                        Err(ClientError::Superseded) => {
                            tracing::debug!("Discarding stale bootstrap response")
                        }
                        Err(e) => tracing::warn!(error = %e, "Failed to restore session"),
                    }
                }
                Err(e) if e.rejects_credential() => {
                    tracing::warn!(error = %e, "Stored session rejected, signing out");
                    self.discard_if_current(&ticket);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Backend unreachable, keeping stored session");
                    self.forget_if_current(&ticket);
                }
            },
        }

        self.state
            .send_if_modified(|state| state.apply(SessionAction::LoadingFinished));

        self.snapshot()
    }

    /// Signs in with email and password
    ///
    /// # Errors
    ///
    /// - `Validation` if the input is malformed (no request is sent)
    /// - `InvalidCredentials` if the backend rejects the credentials
    /// - `Superseded` if another identity operation started meanwhile
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<User> {
        let request = LoginRequest::new(email, password);
        validate_request(&request)?;

        let ticket = self.advance();
        let auth = self
            .api
            .login(&request)
            .await
            .map_err(|e| self.reject(&ticket, e))?;

        let user = auth.user.redacted();
        let session = AuthenticatedSession::new(auth.token, user.clone());
        let locked = session.is_locked();
        self.commit(&ticket, SessionAction::Established(session))?;

        tracing::info!(user_id = %user.id, locked, "Signed in");
        Ok(user)
    }

    /// Creates an account and signs it in, unlocked
    pub async fn register(&self, name: &str, email: &str, password: &str) -> ClientResult<User> {
        let request = RegisterRequest::new(name, email, password);
        validate_request(&request)?;

        let ticket = self.advance();
        let auth = self
            .api
            .register(&request)
            .await
            .map_err(|e| self.reject(&ticket, e))?;

        let user = auth.user.redacted();
        self.commit(
            &ticket,
            SessionAction::Established(AuthenticatedSession::fresh(auth.token, user.clone())),
        )?;

        tracing::info!(user_id = %user.id, "Account registered");
        Ok(user)
    }

    /// Signs out
    ///
    /// Purges persisted credentials and in-memory state. Idempotent.
    pub fn logout(&self) {
        if self.clear_all() {
            tracing::info!("Signed out");
        }
    }

    /// Ends the session after the backend rejected the credential
    ///
    /// Like [`SessionStore::logout`], and also forces the login view.
    pub fn invalidate(&self) {
        if self.clear_all() {
            tracing::warn!("Session credential rejected, signing out");
        }
        self.navigator.redirect(Route::Login);
    }

    /// Sets or replaces the account PIN
    ///
    /// # Errors
    ///
    /// - `Validation` unless the PIN is 4-6 digits
    /// - `NotAuthenticated` without a session
    /// - `Unauthorized` if the backend rejects the credential
    pub async fn update_pin(&self, pin: &str) -> ClientResult<()> {
        let request = PinRequest::new(pin);
        validate_request(&request)?;

        let ticket = self.observe()?;
        self.api
            .update_pin(&request)
            .await
            .map_err(|e| self.reject(&ticket, e))?;

        self.commit(&ticket, SessionAction::PinSet)?;

        tracing::info!("PIN updated");
        Ok(())
    }

    /// Verifies the PIN and releases the lock
    ///
    /// On `InvalidPin` the lock stays engaged; the caller should clear its
    /// input and prompt again.
    ///
    /// # Errors
    ///
    /// - `NotLocked` unless the lock is engaged
    /// - `Validation` unless the PIN is 4-6 digits
    /// - `InvalidPin` if the backend rejects the PIN
    pub async fn verify_pin(&self, pin: &str) -> ClientResult<()> {
        if !self.state.borrow().is_locked() {
            return Err(ClientError::NotLocked);
        }

        let request = PinRequest::new(pin);
        validate_request(&request)?;

        let ticket = self.observe()?;
        self.api
            .verify_pin(&request)
            .await
            .map_err(|e| self.reject(&ticket, e))?;

        self.unlock_app(&ticket)
    }

    /// Engages the PIN lock
    ///
    /// No-op unless the user has a PIN.
    pub fn lock_app(&self) {
        if self
            .state
            .send_if_modified(|state| state.apply(SessionAction::Locked))
        {
            tracing::info!("App locked");
        }
    }

    fn unlock_app(&self, ticket: &Ticket) -> ClientResult<()> {
        self.commit(ticket, SessionAction::Unlocked)?;
        tracing::info!("App unlocked");
        Ok(())
    }

    /// Marks the signed-in user as Pro
    ///
    /// Local and optimistic: callers confirm the payment first. Idempotent;
    /// a no-op without a session.
    pub fn upgrade_to_pro(&self) {
        if self
            .state
            .send_if_modified(|state| state.apply(SessionAction::ProGranted))
        {
            tracing::info!("Upgraded to Pro");
        }
    }

    /// Re-reads the user from `GET /auth/me`
    ///
    /// Replaces the user wholesale, keeping the lock flag (a user without a
    /// PIN is always unlocked).
    pub async fn refresh(&self) -> ClientResult<User> {
        let ticket = self.observe()?;
        let user = self
            .api
            .me()
            .await
            .map_err(|e| self.reject(&ticket, e))?
            .redacted();

        self.commit(&ticket, SessionAction::UserRefreshed(user.clone()))?;

        tracing::debug!(user_id = %user.id, is_pro = user.is_pro, "User refreshed");
        Ok(user)
    }

    /// Refreshes the user periodically until `cancel` fires
    ///
    /// Ticks while signed out are skipped. Failures are logged and retried
    /// on the next tick.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                if !store.state.borrow().is_authenticated() {
                    continue;
                }

                match store.refresh().await {
                    Ok(_) | Err(ClientError::Superseded) => {}
                    Err(e) => tracing::warn!(error = %e, "Entitlement refresh failed"),
                }
            }

            tracing::debug!("Entitlement refresher stopped");
        })
    }

    /// Requests a password reset email
    ///
    /// Succeeds whether or not the account exists.
    pub async fn forgot_password(&self, email: &str) -> ClientResult<()> {
        let request = ForgotPasswordRequest::new(email);
        validate_request(&request)?;

        self.api.forgot_password(&request).await?;
        tracing::info!("Password reset requested");
        Ok(())
    }

    /// Current state
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// State changes as a stream, starting with the current state
    pub fn changes(&self) -> WatchStream<SessionState> {
        WatchStream::new(self.state.subscribe())
    }

    /// Gate decision for protected content
    pub fn gate(&self) -> GateDecision {
        self.state.borrow().protected_gate()
    }

    /// Gate decision for the login and registration screens
    pub fn public_gate(&self) -> GateDecision {
        self.state.borrow().public_gate()
    }

    /// Entitlement view of the current state
    pub fn entitlement(&self) -> Entitlement {
        Entitlement::from_state(&self.state.borrow())
    }

    /// Checks a capability before invoking it
    pub fn require(&self, capability: Capability) -> ClientResult<()> {
        Ok(self.entitlement().require(capability)?)
    }

    /// Forced navigation publisher
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Subscribes to forced navigations
    pub fn navigation(&self) -> watch::Receiver<Option<Redirect>> {
        self.navigator.subscribe()
    }

    fn advance(&self) -> Ticket {
        Ticket {
            epoch: self.epoch.fetch_add(1, Ordering::SeqCst) + 1,
            token: None,
        }
    }

    fn observe(&self) -> ClientResult<Ticket> {
        let token = self
            .state
            .borrow()
            .token()
            .map(str::to_string)
            .ok_or(ClientError::NotAuthenticated)?;

        Ok(Ticket {
            epoch: self.epoch.load(Ordering::SeqCst),
            token: Some(token),
        })
    }

    fn is_current(&self, ticket: &Ticket, state: &SessionState) -> bool {
        self.epoch.load(Ordering::SeqCst) == ticket.epoch
            && ticket
                .token
                .as_deref()
                .map_or(true, |token| state.token() == Some(token))
    }

    /// Maps a failed request, ending the session on `Unauthorized`
    ///
    /// The HTTP layer may already have invalidated the session; that bumps
    /// the epoch, so it is not repeated here.
    fn reject(&self, ticket: &Ticket, err: ApiError) -> ClientError {
        if err == ApiError::Unauthorized && self.epoch.load(Ordering::SeqCst) == ticket.epoch {
            self.invalidate();
        }
        ClientError::from(err)
    }

    /// Applies an action if the ticket is still current
    ///
    /// Actions that change identity data are persisted before the new state
    /// is published; a persistence failure leaves the state untouched.
    fn commit(&self, ticket: &Ticket, action: SessionAction) -> ClientResult<()> {
        let persist = matches!(
            action,
            SessionAction::Established(_)
                | SessionAction::PinSet
                | SessionAction::UserRefreshed(_)
        );
        let mut outcome = Ok(());

        self.state.send_if_modified(|state| {
            if !self.is_current(ticket, state) {
                outcome = Err(ClientError::Superseded);
                return false;
            }

            let mut next = state.clone();
            if !next.apply(action) {
                return false;
            }

            if persist {
                if let Some(session) = next.session() {
                    let stored =
                        StoredCredentials::new(session.token().to_string(), session.user().clone());
                    if let Err(e) = self.credentials.save(&stored) {
                        tracing::error!(error = %e, "Failed to persist credentials");
                        outcome = Err(ClientError::Storage(e));
                        return false;
                    }
                }
            }

            *state = next;
            true
        });

        outcome
    }

    fn discard_if_current(&self, ticket: &Ticket) {
        self.state.send_if_modified(|state| {
            if !self.is_current(ticket, state) {
                return false;
            }
            self.purge();
            state.apply(SessionAction::Cleared)
        });
    }

    fn forget_if_current(&self, ticket: &Ticket) {
        self.state.send_if_modified(|state| {
            self.is_current(ticket, state) && state.apply(SessionAction::Cleared)
        });
    }

    fn clear_all(&self) -> bool {
        self.advance();
        self.state.send_if_modified(|state| {
            self.purge();
            state.apply(SessionAction::Cleared)
        })
    }

    fn purge(&self) {
        if let Err(e) = self.credentials.clear() {
            tracing::error!(error = %e, "Failed to clear stored credentials");
        }
    }
}

impl EntitlementSink for SessionStore {
    fn upgrade_to_pro(&self) {
        SessionStore::upgrade_to_pro(self);
    }
}

impl UnauthorizedHandler for SessionStore {
    fn on_unauthorized(&self) {
        self.invalidate();
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SessionStore")
            .field("loading", &state.loading)
            .field("authenticated", &state.is_authenticated())
            .field("locked", &state.is_locked())
            .field("epoch", &self.epoch.load(Ordering::SeqCst))
            .finish()
    }
}
