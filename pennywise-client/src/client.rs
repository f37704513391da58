/// Client assembly
///
/// Wires the credential file, the HTTP client, the session store and the
/// payment reconciler together:
///
/// ```text
/// Pennywise
///   ├─> FileCredentialStore   (persisted token + user)
///   ├─> HttpApi               (reqwest, bearer from the store)
///   │     └─> 401 ─> SessionStore::invalidate
///   ├─> SessionStore          (identity, lock, entitlement)
///   └─> PaymentReconciler     (one per payment return)
///           └─> SessionStore::upgrade_to_pro
/// ```
///
/// # Example
///
/// ```no_run
/// use pennywise_client::client::Pennywise;
/// use pennywise_client::config::ClientConfig;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = Pennywise::new(ClientConfig::from_env()?)?;
/// client.session().bootstrap().await;
/// println!("{:?}", client.session().gate());
/// # Ok(())
/// # }
/// ```

use crate::api::{HttpApi, UnauthorizedHandler};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::session::SessionStore;
use pennywise_payments::checkout::begin_checkout;
use pennywise_payments::gateway::{CheckoutSession, EntitlementSink, PaymentGateway};
use pennywise_payments::reconciler::PaymentReconciler;
use pennywise_payments::return_route::{parse_return, PaymentReturn};
use pennywise_shared::storage::{CredentialStore, FileCredentialStore};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Assembled client core
#[derive(Debug)]
pub struct Pennywise {
    config: ClientConfig,
    api: Arc<HttpApi>,
    session: Arc<SessionStore>,
}

impl Pennywise {
    /// Creates a client persisting credentials to the configured file
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let credentials = Arc::new(FileCredentialStore::new(
            config.storage.credentials_path.clone(),
        ));
        Self::with_store(config, credentials)
    }

    /// Creates a client over an arbitrary credential store
    pub fn with_store(
        config: ClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> ClientResult<Self> {
        let api = Arc::new(HttpApi::new(
            &config.api.base_url,
            config.api.request_timeout,
            credentials.clone(),
        )?);

        let session = SessionStore::new(api.clone(), credentials);
        let weak = Arc::downgrade(&session);
        let handler: Weak<dyn UnauthorizedHandler> = weak;
        api.set_unauthorized_handler(handler);

        tracing::debug!(base_url = %api.base_url(), "Client initialized");

        Ok(Pennywise {
            config,
            api,
            session,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session store
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// HTTP client
    pub fn api(&self) -> &Arc<HttpApi> {
        &self.api
    }

    /// Starts the background entitlement refresh, if configured
    pub fn spawn_refresh(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        self.config
            .refresh_interval
            .map(|period| self.session.spawn_refresh(period, cancel))
    }

    /// Opens a Pro checkout and returns the provider redirect
    ///
    /// # Errors
    ///
    /// - `NotAuthenticated` without a session
    /// - `InvalidRequest` if the origin is not an http(s) URL
    pub async fn checkout(&self, origin_url: &str) -> ClientResult<CheckoutSession> {
        if !self.session.snapshot().is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }

        Ok(begin_checkout(self.api.as_ref(), origin_url).await?)
    }

    /// Handles the payment return URL
    ///
    /// Returns a reconciler for the carried session id, not yet started.
    /// Without a session id nothing is reconciled and a navigation to
    /// settings is published.
    pub fn payment_return(&self, return_url: &str) -> Option<Arc<PaymentReconciler>> {
        match parse_return(return_url) {
            PaymentReturn::Reconcile { session_id } => Some(self.reconciler(session_id)),
            PaymentReturn::Redirect(route) => {
                tracing::info!(route = %route, "Payment return without session id");
                self.session.navigator().redirect(route);
                None
            }
        }
    }

    /// Creates a reconciler for a checkout session
    pub fn reconciler(&self, session_id: impl Into<String>) -> Arc<PaymentReconciler> {
        let gateway: Arc<dyn PaymentGateway> = self.api.clone();
        let sink: Arc<dyn EntitlementSink> = self.session.clone();

        PaymentReconciler::new(session_id, gateway, sink, self.config.payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pennywise_shared::auth::gate::Route;
    use pennywise_shared::storage::MemoryCredentialStore;

    fn client() -> Pennywise {
        Pennywise::with_store(
            ClientConfig::new("http://127.0.0.1:9/api"),
            Arc::new(MemoryCredentialStore::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_return_without_session_redirects_to_settings() {
        let client = client();
        let mut navigation = client.session().navigation();

        assert!(client.payment_return("/payment/success").is_none());

        navigation.changed().await.unwrap();
        assert_eq!(navigation.borrow().unwrap().route, Route::Settings);
    }

    #[tokio::test]
    async fn test_return_with_session_builds_reconciler() {
        let client = client();
        let reconciler = client
            .payment_return("/payment/success?session_id=cs_42")
            .unwrap();

        assert_eq!(reconciler.session_id(), "cs_42");
        assert!(!reconciler.is_running());
    }

    #[tokio::test]
    async fn test_checkout_requires_session() {
        let client = client();
        client.session().bootstrap().await;

        let result = client.checkout("https://app.example").await;
        assert!(matches!(result, Err(ClientError::NotAuthenticated)));
    }

    #[test]
    fn test_unauthorized_handler_does_not_keep_session_alive() {
        let client = client();
        let session = Arc::downgrade(client.session());
        assert_eq!(Arc::strong_count(client.session()), 1);

        drop(client);
        assert!(session.upgrade().is_none());
    }

    #[test]
    fn test_refresh_disabled() {
        let mut config = ClientConfig::new("http://127.0.0.1:9/api");
        config.refresh_interval = None;
        let client =
            Pennywise::with_store(config, Arc::new(MemoryCredentialStore::new())).unwrap();

        assert!(client.spawn_refresh(CancellationToken::new()).is_none());
    }
}
