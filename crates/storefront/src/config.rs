//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FRESHCART_API_URL` - Base URL of the FreshCart API server
//!
//! ## Optional
//! - `FRESHCART_CURRENCY` - ISO currency code for display (default: USD)
//! - `FRESHCART_REQUEST_TIMEOUT_SECS` - Per-request HTTP timeout (default: 10)
//! - `FRESHCART_CATALOG_TTL_SECS` - Product list cache TTL (default: 300)
//! - `FRESHCART_EMAIL` - Login email used at start-up
//! - `FRESHCART_PASSWORD` - Login password used at start-up
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use freshcart_core::{CurrencyCode, Email};

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// API server connection settings
    pub api: ApiConfig,
    /// Currency used when formatting amounts
    pub currency: CurrencyCode,
    /// Credentials for automatic login, if configured
    pub credentials: Option<Credentials>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// API server connection settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL; endpoint paths are joined onto it
    pub base_url: Url,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// How long a fetched product list stays fresh
    pub catalog_ttl: Duration,
}

impl ApiConfig {
    /// Settings for `base_url` with default timeouts.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout: Duration::from_secs(10),
            catalog_ttl: Duration::from_secs(300),
        }
    }
}

/// Login credentials.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct Credentials {
    /// Login email
    pub email: Email,
    /// Login password
    pub password: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = parse_base_url(&get_required_env("FRESHCART_API_URL")?)?;
        let request_timeout = get_duration_secs("FRESHCART_REQUEST_TIMEOUT_SECS", 10)?;
        let catalog_ttl = get_duration_secs("FRESHCART_CATALOG_TTL_SECS", 300)?;

        let currency = get_env_or_default("FRESHCART_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("FRESHCART_CURRENCY".to_string(), e))?;

        let credentials = Credentials::from_env()?;

        Ok(Self {
            api: ApiConfig {
                base_url,
                request_timeout,
                catalog_ttl,
            },
            currency,
            credentials,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl Credentials {
    /// Both variables or neither; one without the other is a mistake.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        match (
            get_optional_env("FRESHCART_EMAIL"),
            get_optional_env("FRESHCART_PASSWORD"),
        ) {
            (Some(email), Some(password)) => {
                let email = Email::parse(&email).map_err(|e| {
                    ConfigError::InvalidEnvVar("FRESHCART_EMAIL".to_string(), e.to_string())
                })?;
                Ok(Some(Self {
                    email,
                    password: SecretString::from(password),
                }))
            }
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::MissingEnvVar("FRESHCART_PASSWORD".to_string())),
            (None, Some(_)) => Err(ConfigError::MissingEnvVar("FRESHCART_EMAIL".to_string())),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a whole number of seconds, rejecting zero.
fn get_duration_secs(key: &str, default: u64) -> Result<Duration, ConfigError> {
    let secs = get_env_or_default(key, &default.to_string())
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Parse the API base URL.
///
/// A trailing slash is added so that `Url::join` appends endpoint paths
/// instead of replacing the last segment.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid =
        |reason: String| ConfigError::InvalidEnvVar("FRESHCART_API_URL".to_string(), reason);

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
