/// Configuration management for the client
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `PENNYWISE_API_URL`: Backend base URL including the `/api` prefix (required)
/// - `PENNYWISE_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 30)
/// - `PENNYWISE_CREDENTIALS_PATH`: Credential file (default: .pennywise/credentials.json)
/// - `PENNYWISE_POLL_INTERVAL_MS`: Delay between payment status polls (default: 2000)
/// - `PENNYWISE_POLL_MAX_ATTEMPTS`: Payment status poll budget (default: 10)
/// - `PENNYWISE_REFRESH_INTERVAL_SECS`: Entitlement refresh period, 0 disables (default: 300)
/// - `RUST_LOG`: Log level (default: pennywise_client=info)
///
/// # Example
///
/// ```no_run
/// use pennywise_client::config::ClientConfig;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = ClientConfig::from_env()?;
/// println!("Talking to {}", config.api.base_url);
/// # Ok(())
/// # }
/// ```

use pennywise_payments::reconciler::{ReconcilerConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default credential file location
pub const DEFAULT_CREDENTIALS_PATH: &str = ".pennywise/credentials.json";

/// Complete client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend API configuration
    pub api: ApiConfig,

    /// Credential persistence configuration
    pub storage: StorageConfig,

    /// Payment reconciliation configuration
    pub payments: ReconcilerConfig,

    /// Period of the background entitlement refresh (`None` disables it)
    pub refresh_interval: Option<Duration>,
}

/// Backend API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://budget.example/api`
    pub base_url: String,

    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Credential persistence configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path of the credential file
    pub credentials_path: PathBuf,
}

impl ClientConfig {
    /// Creates a configuration with defaults for everything but the API URL
    pub fn new(base_url: impl Into<String>) -> Self {
        ClientConfig {
            api: ApiConfig {
                base_url: base_url.into(),
                request_timeout: Duration::from_secs(30),
            },
            storage: StorageConfig {
                credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
            },
            payments: ReconcilerConfig::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS),
            refresh_interval: Some(Duration::from_secs(300)),
        }
    }

    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `PENNYWISE_API_URL` is missing or not an http(s) URL
    /// - A numeric variable does not parse
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("PENNYWISE_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| anyhow::anyhow!("PENNYWISE_API_URL environment variable is required"))?;

        let scheme_ok = reqwest::Url::parse(&base_url)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !scheme_ok {
            anyhow::bail!("PENNYWISE_API_URL must be an http or https URL, got {}", base_url);
        }

        let timeout_secs: u64 = parse_var(&lookup, "PENNYWISE_REQUEST_TIMEOUT_SECS", 30)?;
        let poll_interval_ms: u64 = parse_var(
            &lookup,
            "PENNYWISE_POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL.as_millis() as u64,
        )?;
        let max_attempts: u32 =
            parse_var(&lookup, "PENNYWISE_POLL_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let refresh_secs: u64 = parse_var(&lookup, "PENNYWISE_REFRESH_INTERVAL_SECS", 300)?;

        if max_attempts == 0 {
            anyhow::bail!("PENNYWISE_POLL_MAX_ATTEMPTS must be at least 1");
        }

        let credentials_path = lookup("PENNYWISE_CREDENTIALS_PATH")
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CREDENTIALS_PATH.to_string());

        Ok(ClientConfig {
            api: ApiConfig {
                base_url,
                request_timeout: Duration::from_secs(timeout_secs),
            },
            storage: StorageConfig {
                credentials_path: PathBuf::from(credentials_path),
            },
            payments: ReconcilerConfig::new(Duration::from_millis(poll_interval_ms), max_attempts),
            refresh_interval: (refresh_secs > 0).then(|| Duration::from_secs(refresh_secs)),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", key, raw, e)),
    }
}
