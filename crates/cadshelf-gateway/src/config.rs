//! Gateway configuration.
//!
//! Loaded from `CADSHELF_*` environment variables, with defaults from
//! `cadshelf_core::defaults`.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CADSHELF_API_URL` | `https://cad.onshape.com/api/v6` | REST API base URL |
//! | `CADSHELF_ACCESS_KEY` | none | API access key |
//! | `CADSHELF_SECRET_KEY` | none | API secret key |
//! | `CADSHELF_TIMEOUT_SECS` | `30` | Per-request timeout |
//! | `CADSHELF_MAX_RETRIES` | `2` | Retries for transient failures |
//! | `CADSHELF_RETRY_BACKOFF_MS` | `500` | Backoff unit between retries |
//! | `CADSHELF_PAGE_SIZE` | `20` | Listing page size |

use std::env;

use thiserror::Error;
use tracing::debug;

use cadshelf_core::defaults;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for cadshelf_core::Error {
    fn from(e: ConfigError) -> Self {
        cadshelf_core::Error::Config(e.to_string())
    }
}

/// Connection settings for [`crate::HttpGateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the REST API, without trailing slash.
    pub base_url: String,
    /// API access key (sent as the basic-auth user).
    pub access_key: Option<String>,
    /// API secret key (sent as the basic-auth password).
    pub secret_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Backoff unit in milliseconds; attempt `n` waits `n * backoff`.
    pub retry_backoff_ms: u64,
    /// Listing page size.
    pub page_size: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::API_URL.to_string(),
            access_key: None,
            secret_key: None,
            timeout_seconds: defaults::HTTP_TIMEOUT_SECS,
            max_retries: defaults::HTTP_MAX_RETRIES,
            retry_backoff_ms: defaults::HTTP_RETRY_BACKOFF_MS,
            page_size: defaults::LIST_PAGE_SIZE,
        }
    }
}

impl GatewayConfig {
    /// Create config from environment variables (with defaults).
    pub fn from_env() -> Self {
        let base_url =
            env::var("CADSHELF_API_URL").unwrap_or_else(|_| defaults::API_URL.to_string());
        let config = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key: env::var("CADSHELF_ACCESS_KEY").ok().filter(|v| !v.is_empty()),
            secret_key: env::var("CADSHELF_SECRET_KEY").ok().filter(|v| !v.is_empty()),
            timeout_seconds: env::var("CADSHELF_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::HTTP_TIMEOUT_SECS),
            max_retries: env::var("CADSHELF_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::HTTP_MAX_RETRIES),
            retry_backoff_ms: env::var("CADSHELF_RETRY_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::HTTP_RETRY_BACKOFF_MS),
            page_size: env::var("CADSHELF_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::LIST_PAGE_SIZE)
                .max(1),
        };
        debug!(base_url = %config.base_url, "Gateway config loaded from environment");
        config
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set API credentials.
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set retry count and backoff.
    pub fn with_retries(mut self, max_retries: u32, retry_backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = retry_backoff_ms;
        self
    }

    /// Set the listing page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "API base_url cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "API base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "timeout_seconds must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate and additionally require credentials.
    pub fn validate_with_credentials(&self) -> ConfigResult<()> {
        self.validate()?;
        if self.access_key.is_none() {
            return Err(ConfigError::Missing("CADSHELF_ACCESS_KEY"));
        }
        if self.secret_key.is_none() {
            return Err(ConfigError::Missing("CADSHELF_SECRET_KEY"));
        }
        Ok(())
    }
}
