/// HTTP implementation of the backend API
///
/// `HttpApi` speaks JSON over HTTPS with reqwest. Every request carries the
/// stored bearer credential when one exists, read fresh from the credential
/// store so a logout is honored by the very next request.
///
/// # Unauthorized Interception
///
/// A `401` on any endpoint is reported to the registered
/// [`UnauthorizedHandler`] before the error is returned, regardless of which
/// operation triggered it. The two credential checks are exempt:
///
/// - `POST /auth/login` → [`ApiError::InvalidCredentials`]
/// - `POST /auth/verify-pin` → [`ApiError::InvalidPin`]
///
/// # Example
///
/// ```no_run
/// use pennywise_client::api::{AuthApi, HttpApi};
/// use pennywise_shared::auth::credentials::LoginRequest;
/// use pennywise_shared::storage::MemoryCredentialStore;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let api = HttpApi::new(
///     "http://localhost:8001/api",
///     Duration::from_secs(30),
///     Arc::new(MemoryCredentialStore::new()),
/// )?;
/// let auth = api.login(&LoginRequest::new("ada@example.com", "secret1")).await?;
/// println!("Signed in as {}", auth.user.name);
/// # Ok(())
/// # }
/// ```

use super::{ApiError, AuthApi, AuthResponse, UnauthorizedHandler};
use async_trait::async_trait;
use pennywise_payments::gateway::{
    CheckoutSession, GatewayError, PaymentGateway, PaymentStatusResponse,
};
use pennywise_shared::auth::credentials::{
    ForgotPasswordRequest, LoginRequest, PinRequest, RegisterRequest,
};
use pennywise_shared::models::User;
use pennywise_shared::storage::CredentialStore;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

/// How a `401` on an endpoint is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    /// Credential invalid: notify the unauthorized handler
    Intercept,

    /// Wrong email or password (400 or 401)
    InvalidCredentials,

    /// Wrong PIN
    InvalidPin,
}

#[derive(Serialize)]
struct CheckoutRequest<'a> {
    origin_url: &'a str,
}

/// reqwest-backed API client
pub struct HttpApi {
    client: reqwest::Client,
    base_url: Url,
    credentials: Arc<dyn CredentialStore>,
    unauthorized: RwLock<Option<Weak<dyn UnauthorizedHandler>>>,
}

impl HttpApi {
    /// Creates a client
    ///
    /// # Arguments
    ///
    /// * `base_url` - Backend base URL including the `/api` prefix
    /// * `timeout` - Per-request timeout
    /// * `credentials` - Source of the bearer credential
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the base URL does not parse, or `Transport`
    /// if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid API URL: {}", e)))?;

        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidRequest(format!(
                "API URL cannot be a base: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpApi {
            client,
            base_url,
            credentials,
            unauthorized: RwLock::new(None),
        })
    }

    /// Registers the receiver of the global `401` signal
    ///
    /// Held weakly; the session store owns the client, not the reverse.
    pub fn set_unauthorized_handler(&self, handler: Weak<dyn UnauthorizedHandler>) {
        *self
            .unauthorized
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handler);
    }

    /// Backend base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest("API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn token(&self) -> Option<String> {
        match self.credentials.load() {
            Ok(credentials) => credentials.map(|c| c.token),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stored credentials");
                None
            }
        }
    }

    fn notify_unauthorized(&self) {
        let handler = self
            .unauthorized
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .and_then(Weak::upgrade);

        match handler {
            Some(handler) => handler.on_unauthorized(),
            None => tracing::warn!("Received 401 with no session registered"),
        }
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        rejection: Rejection,
    ) -> Result<Response, ApiError> {
        let request = match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match (status.as_u16(), rejection) {
            (401, Rejection::Intercept) => {
                tracing::warn!(url = %response.url().path(), "Request rejected with 401");
                self.notify_unauthorized();
                Err(ApiError::Unauthorized)
            }
            (400 | 401, Rejection::InvalidCredentials) => Err(ApiError::InvalidCredentials),
            (401, Rejection::InvalidPin) => Err(ApiError::InvalidPin),
            (code, _) => Err(ApiError::Server {
                status: code,
                message: error_message(response).await,
            }),
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self
            .execute(self.client.get(url), Rejection::Intercept)
            .await?;
        decode(response).await
    }
}

impl fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpApi")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

/// Extracts `detail` or `message` from an error body
async fn error_message(response: Response) -> String {
    let fallback = response
        .status()
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string();

    match response.json::<serde_json::Value>().await {
        Ok(body) => body
            .get("detail")
            .or_else(|| body.get("message"))
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .unwrap_or(fallback),
        Err(_) => fallback,
    }
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let url = self.url(&["auth", "login"])?;
        let response = self
            .execute(
                self.client.post(url).json(request),
                Rejection::InvalidCredentials,
            )
            .await?;
        decode(response).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let url = self.url(&["auth", "register"])?;
        let response = self
            .execute(
                self.client.post(url).json(request),
                Rejection::InvalidCredentials,
            )
            .await?;
        decode(response).await
    }

    async fn me(&self) -> Result<User, ApiError> {
        self.get(self.url(&["auth", "me"])?).await
    }

    async fn update_pin(&self, request: &PinRequest) -> Result<(), ApiError> {
        let url = self.url(&["auth", "pin"])?;
        self.execute(self.client.put(url).json(request), Rejection::Intercept)
            .await?;
        Ok(())
    }

    async fn verify_pin(&self, request: &PinRequest) -> Result<(), ApiError> {
        let url = self.url(&["auth", "verify-pin"])?;
        self.execute(self.client.post(url).json(request), Rejection::InvalidPin)
            .await?;
        Ok(())
    }

    async fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<(), ApiError> {
        let mut url = self.url(&["auth", "forgot-password"])?;
        url.query_pairs_mut().append_pair("email", &request.email);

        self.execute(self.client.post(url), Rejection::Intercept)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for HttpApi {
    async fn create_checkout(&self, origin_url: &str) -> Result<CheckoutSession, GatewayError> {
        if self.token().is_none() {
            return Err(GatewayError::NotAuthenticated);
        }

        let url = self.url(&["payments", "checkout"])?;
        let response = self
            .execute(
                self.client.post(url).json(&CheckoutRequest { origin_url }),
                Rejection::Intercept,
            )
            .await?;
        Ok(decode(response).await?)
    }

    async fn payment_status(
        &self,
        session_id: &str,
    ) -> Result<PaymentStatusResponse, GatewayError> {
        let url = self.url(&["payments", "status", session_id])?;
        Ok(self.get(url).await?)
    }
}
