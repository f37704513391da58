/// In-memory identity backend for testing and demos
///
/// `MockAuthApi` keeps a small account table and answers the identity
/// endpoints the way the real backend does, including `401` for a revoked
/// credential. An optional latency makes races observable on a paused clock.
///
/// # Example
///
/// ```
/// use pennywise_client::api::{AuthApi, MockAuthApi};
/// use pennywise_shared::auth::credentials::LoginRequest;
///
/// # async fn example() {
/// let api = MockAuthApi::new().with_account("Ada", "ada@example.com", "secret1");
/// let auth = api.login(&LoginRequest::new("ada@example.com", "secret1")).await.unwrap();
/// assert_eq!(auth.user.name, "Ada");
/// # }
/// ```

use super::{ApiError, AuthApi, AuthResponse};
use async_trait::async_trait;
use pennywise_shared::auth::credentials::{
    ForgotPasswordRequest, LoginRequest, PinRequest, RegisterRequest,
};
use pennywise_shared::models::User;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct MockAccount {
    password: String,
    pin: Option<String>,
    user: User,
}

#[derive(Debug, Default)]
struct Accounts {
    by_email: HashMap<String, MockAccount>,
    signed_in: Option<String>,
}

/// Mock identity backend
///
/// Like the real backend, the user object echoes the account PIN in its
/// `pin` field.
#[derive(Debug, Default)]
pub struct MockAuthApi {
    accounts: Mutex<Accounts>,
    revoked: AtomicBool,
    offline: AtomicBool,
    requests: AtomicU32,
    latency: Option<Duration>,
}

impl MockAuthApi {
    /// Creates a backend with no accounts
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a free account without a PIN
    pub fn with_account(self, name: &str, email: &str, password: &str) -> Self {
        {
            let mut accounts = self.lock();
            let id = format!("user-{}", accounts.by_email.len() + 1);
            accounts.by_email.insert(
                email.to_string(),
                MockAccount {
                    password: password.to_string(),
                    pin: None,
                    user: User {
                        id,
                        name: name.to_string(),
                        email: email.to_string(),
                        pin_hash: None,
                        is_pro: false,
                    },
                },
            );
        }
        self
    }

    /// Configures a PIN on an existing account
    pub fn with_pin(self, email: &str, pin: &str) -> Self {
        if let Some(account) = self.lock().by_email.get_mut(email) {
            account.pin = Some(pin.to_string());
            account.user.pin_hash = Some(pin.to_string());
        }
        self
    }

    /// Treats the stored credential as belonging to `email`
    pub fn signed_in_as(self, email: &str) -> Self {
        self.lock().signed_in = Some(email.to_string());
        self
    }

    /// Delays every request
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every authenticated endpoint answer `401` from now on
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    /// Makes every authenticated endpoint fail in transport
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Grants Pro on the server side only
    pub fn grant_pro(&self, email: &str) {
        if let Some(account) = self.lock().by_email.get_mut(email) {
            account.user.is_pro = true;
        }
    }

    /// Server-side view of an account
    pub fn user(&self, email: &str) -> Option<User> {
        self.lock().by_email.get(email).map(|a| a.user.clone())
    }

    /// Number of requests received
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Accounts> {
        self.accounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn round_trip(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn with_current<T>(
        &self,
        f: impl FnOnce(&mut MockAccount) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        if self.revoked.load(Ordering::SeqCst) {
            return Err(ApiError::Unauthorized);
        }

        let mut accounts = self.lock();
        let Some(email) = accounts.signed_in.clone() else {
            return Err(ApiError::Unauthorized);
        };

        match accounts.by_email.get_mut(&email) {
            Some(account) => f(account),
            None => Err(ApiError::Unauthorized),
        }
    }

    fn issue(&self, email: &str, user: User) -> AuthResponse {
        self.lock().signed_in = Some(email.to_string());
        AuthResponse {
            token: format!("token-{}", user.id),
            user,
        }
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.round_trip().await;

        let user = {
            let accounts = self.lock();
            match accounts.by_email.get(&request.email) {
                Some(account) if account.password == request.password => account.user.clone(),
                _ => return Err(ApiError::InvalidCredentials),
            }
        };

        self.revoked.store(false, Ordering::SeqCst);
        Ok(self.issue(&request.email, user))
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.round_trip().await;

        let user = {
            let mut accounts = self.lock();
            if accounts.by_email.contains_key(&request.email) {
                return Err(ApiError::InvalidCredentials);
            }

            let user = User {
                id: format!("user-{}", accounts.by_email.len() + 1),
                name: request.name.clone(),
                email: request.email.clone(),
                pin_hash: None,
                is_pro: false,
            };
            accounts.by_email.insert(
                request.email.clone(),
                MockAccount {
                    password: request.password.clone(),
                    pin: None,
                    user: user.clone(),
                },
            );
            user
        };

        self.revoked.store(false, Ordering::SeqCst);
        Ok(self.issue(&request.email, user))
    }

    async fn me(&self) -> Result<User, ApiError> {
        self.round_trip().await;
        self.with_current(|account| Ok(account.user.clone()))
    }

    async fn update_pin(&self, request: &PinRequest) -> Result<(), ApiError> {
        self.round_trip().await;
        self.with_current(|account| {
            account.pin = Some(request.pin.clone());
            account.user.pin_hash = Some(request.pin.clone());
            Ok(())
        })
    }

    async fn verify_pin(&self, request: &PinRequest) -> Result<(), ApiError> {
        self.round_trip().await;
        self.with_current(|account| match &account.pin {
            Some(pin) if *pin == request.pin => Ok(()),
            Some(_) => Err(ApiError::InvalidPin),
            None => Err(ApiError::Server {
                status: 400,
                message: "PIN not set".to_string(),
            }),
        })
    }

    async fn forgot_password(&self, _request: &ForgotPasswordRequest) -> Result<(), ApiError> {
        self.round_trip().await;
        Ok(())
    }
}
