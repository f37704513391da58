#![allow(dead_code)]

/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - An in-process fake backend (axum) on an ephemeral localhost port
/// - Account and payment scripting helpers
/// - Client construction over a temporary credential file

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use pennywise_client::{ClientConfig, Pennywise};
use pennywise_payments::reconciler::ReconcilerConfig;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Fixed price of the Pro plan
pub const PRO_PRICE: f64 = 9.99;

/// Account stored by the fake backend
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub pin: Option<String>,
    pub is_pro: bool,
}

impl Account {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "name": self.name,
            "is_pro": self.is_pro,
            "pin": self.pin,
        })
    }
}

/// One scripted answer of the payment status endpoint
#[derive(Debug, Clone)]
pub enum StatusReply {
    Pending,
    Paid,
    Expired,
    Error(u16),
}

/// Fake backend state
#[derive(Debug, Default)]
pub struct Backend {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, String>,
    checkouts: HashMap<String, String>,
    payments: HashMap<String, VecDeque<StatusReply>>,
    pub status_polls: u32,
    pub last_origin: Option<String>,
    pub reset_requests: Vec<String>,
    next_id: u32,
}

type Shared = Arc<Mutex<Backend>>;
type Failure = (StatusCode, Json<Value>);

fn fail(status: StatusCode, detail: &str) -> Failure {
    (status, Json(json!({ "detail": detail })))
}

fn lock(backend: &Shared) -> MutexGuard<'_, Backend> {
    backend.lock().unwrap_or_else(|p| p.into_inner())
}

impl Backend {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn issue_token(&mut self, email: &str) -> String {
        let token = format!("tok-{}", self.next_id());
        self.tokens.insert(token.clone(), email.to_string());
        token
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<String, Failure> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(|token| self.tokens.get(token).cloned())
            .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
    }
}

#[derive(Deserialize)]
struct RegisterBody {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct PinBody {
    pin: String,
}

#[derive(Deserialize)]
struct CheckoutBody {
    origin_url: String,
}

#[derive(Deserialize)]
struct EmailQuery {
    email: String,
}

async fn register(
    State(backend): State<Shared>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<Value>, Failure> {
    let mut b = lock(&backend);
    if b.accounts.contains_key(&body.email) {
        return Err(fail(StatusCode::BAD_REQUEST, "Email already registered"));
    }

    let account = Account {
        id: format!("user-{}", b.next_id()),
        name: body.name,
        email: body.email.clone(),
        password: body.password,
        pin: None,
        is_pro: false,
    };
    let user = account.to_json();
    b.accounts.insert(body.email.clone(), account);
    let token = b.issue_token(&body.email);

    Ok(Json(json!({ "token": token, "user": user })))
}

async fn login(
    State(backend): State<Shared>,
    Json(body): Json<LoginBody>,
) -> Result<Json<Value>, Failure> {
    let mut b = lock(&backend);
    let user = match b.accounts.get(&body.email) {
        Some(account) if account.password == body.password => account.to_json(),
        _ => return Err(fail(StatusCode::UNAUTHORIZED, "Invalid credentials")),
    };
    let token = b.issue_token(&body.email);

    Ok(Json(json!({ "token": token, "user": user })))
}

async fn me(State(backend): State<Shared>, headers: HeaderMap) -> Result<Json<Value>, Failure> {
    let b = lock(&backend);
    let email = b.authenticate(&headers)?;
    Ok(Json(b.accounts[&email].to_json()))
}

async fn update_pin(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<PinBody>,
) -> Result<Json<Value>, Failure> {
    let mut b = lock(&backend);
    let email = b.authenticate(&headers)?;
    if let Some(account) = b.accounts.get_mut(&email) {
        account.pin = Some(body.pin);
    }
    Ok(Json(json!({ "message": "PIN updated" })))
}

async fn verify_pin(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<PinBody>,
) -> Result<Json<Value>, Failure> {
    let b = lock(&backend);
    let email = b.authenticate(&headers)?;
    match &b.accounts[&email].pin {
        None => Err(fail(StatusCode::BAD_REQUEST, "PIN not set")),
        Some(pin) if *pin == body.pin => Ok(Json(json!({ "valid": true }))),
        Some(_) => Err(fail(StatusCode::UNAUTHORIZED, "Invalid PIN")),
    }
}

async fn forgot_password(
    State(backend): State<Shared>,
    Query(query): Query<EmailQuery>,
) -> Json<Value> {
    lock(&backend).reset_requests.push(query.email);
    Json(json!({ "message": "If the email exists, a reset link will be sent" }))
}

async fn checkout(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<Value>, Failure> {
    let mut b = lock(&backend);
    let email = b.authenticate(&headers)?;

    let session_id = format!("cs_test_{}", b.next_id());
    b.checkouts.insert(session_id.clone(), email);
    b.last_origin = Some(body.origin_url.clone());

    Ok(Json(json!({
        "url": format!("https://checkout.stripe.test/pay/{}", session_id),
        "session_id": session_id,
    })))
}

async fn payment_status(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, Failure> {
    let mut b = lock(&backend);
    b.authenticate(&headers)?;
    b.status_polls += 1;

    let reply = b
        .payments
        .get_mut(&session_id)
        .and_then(VecDeque::pop_front)
        .unwrap_or(StatusReply::Pending);

    let (status, payment_status) = match reply {
        StatusReply::Pending => ("open", "unpaid"),
        StatusReply::Expired => ("expired", "unpaid"),
        StatusReply::Paid => {
            if let Some(email) = b.checkouts.get(&session_id).cloned() {
                if let Some(account) = b.accounts.get_mut(&email) {
                    account.is_pro = true;
                }
            }
            ("complete", "paid")
        }
        StatusReply::Error(code) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return Err(fail(status, "Payment provider unavailable"));
        }
    };

    Ok(Json(json!({
        "status": status,
        "payment_status": payment_status,
        "amount": PRO_PRICE,
        "currency": "usd",
    })))
}

fn router(backend: Shared) -> Router {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/auth/pin", put(update_pin))
        .route("/api/auth/verify-pin", post(verify_pin))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/payments/checkout", post(checkout))
        .route("/api/payments/status/:session_id", get(payment_status))
        .with_state(backend)
}

/// Test context containing the fake backend and a credential directory
pub struct TestContext {
    pub backend: Shared,
    pub base_url: String,
    pub dir: TempDir,
    server: JoinHandle<()>,
}

impl TestContext {
    /// Starts a fake backend on an ephemeral port
    pub async fn new() -> anyhow::Result<Self> {
        let backend: Shared = Arc::new(Mutex::new(Backend::default()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = router(backend.clone());

        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("fake backend stopped: {}", e);
            }
        });

        Ok(TestContext {
            backend,
            base_url: format!("http://{}/api", addr),
            dir: tempfile::tempdir()?,
            server,
        })
    }

    /// Path of the credential file shared by every client of this context
    pub fn credentials_path(&self) -> PathBuf {
        self.dir.path().join("credentials.json")
    }

    /// Client configuration with a fast reconciler
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.base_url.clone());
        config.api.request_timeout = Duration::from_secs(5);
        config.storage.credentials_path = self.credentials_path();
        config.payments = ReconcilerConfig::new(Duration::from_millis(20), 10);
        config.refresh_interval = None;
        config
    }

    /// New client over the shared credential file (a "fresh process")
    pub fn client(&self) -> anyhow::Result<Pennywise> {
        Ok(Pennywise::new(self.config())?)
    }

    /// New client with a custom configuration
    pub fn client_with(&self, config: ClientConfig) -> anyhow::Result<Pennywise> {
        Ok(Pennywise::new(config)?)
    }

    /// Shuts the backend down; later requests fail to connect
    pub async fn stop_backend(&mut self) {
        self.server.abort();
        let _ = (&mut self.server).await;
    }

    /// Creates an account directly in the backend
    pub fn add_account(&self, name: &str, email: &str, password: &str, pin: Option<&str>) {
        let mut b = lock(&self.backend);
        let id = format!("user-{}", b.next_id());
        b.accounts.insert(
            email.to_string(),
            Account {
                id,
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                pin: pin.map(str::to_string),
                is_pro: false,
            },
        );
    }

    /// Scripts the status replies for a checkout session
    pub fn script_payment(&self, session_id: &str, replies: impl IntoIterator<Item = StatusReply>) {
        lock(&self.backend)
            .payments
            .insert(session_id.to_string(), replies.into_iter().collect());
    }

    /// Invalidates every issued token
    pub fn revoke_tokens(&self) {
        lock(&self.backend).tokens.clear();
    }

    /// Number of payment status queries received
    pub fn status_polls(&self) -> u32 {
        lock(&self.backend).status_polls
    }

    /// Origin sent with the last checkout
    pub fn last_origin(&self) -> Option<String> {
        lock(&self.backend).last_origin.clone()
    }

    /// Emails of password reset requests
    pub fn reset_requests(&self) -> Vec<String> {
        lock(&self.backend).reset_requests.clone()
    }

    /// Server-side Pro flag of an account
    pub fn is_pro(&self, email: &str) -> bool {
        lock(&self.backend)
            .accounts
            .get(email)
            .is_some_and(|a| a.is_pro)
    }

    /// Raw contents of the credential file, if present
    pub fn credential_file(&self) -> Option<serde_json::Map<String, Value>> {
        let contents = std::fs::read_to_string(self.credentials_path()).ok()?;
        serde_json::from_str(&contents).ok()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server.abort();
    }
}
