//! Error types for cadshelf.

use thiserror::Error;

use crate::models::DataKind;

/// Result type alias using cadshelf's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cadshelf operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream service unreachable, timed out, throttled, or returned 5xx.
    /// Retried by the gateway's own policy, never by callers.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Document, workspace, version, or element does not exist remotely.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials rejected. Recurs for every document, so batches abort on it.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A non-metadata fetch failed and the field was downgraded to empty.
    #[error("Partial data loss in {field}: {message}")]
    PartialDataLoss { field: DataKind, message: String },

    /// A persisted record exists but cannot be parsed.
    #[error("Corrupt local record {path}: {message}")]
    LocalStoreCorrupt { path: String, message: String },

    /// HTTP request rejected for a reason other than auth or missing resource.
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// PDF rendering failed
    #[error("Render error: {0}")]
    Render(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map a non-success HTTP status to the error taxonomy.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status {
            401 | 403 => Error::Unauthorized(format!("HTTP {}: {}", status, detail)),
            404 => Error::NotFound(format!("HTTP {}: {}", status, detail)),
            429 | 500..=599 => Error::UpstreamUnavailable(format!("HTTP {}: {}", status, detail)),
            _ => Error::Request(format!("HTTP {}: {}", status, detail)),
        }
    }

    /// True for failures the gateway may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::UpstreamUnavailable(_))
    }

    /// True for credential failures that must terminate a batch.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Error::from_status(status.as_u16(), e.to_string());
        }
        if e.is_timeout() || e.is_connect() || e.is_request() {
            return Error::UpstreamUnavailable(e.to_string());
        }
        if e.is_decode() {
            return Error::Serialization(e.to_string());
        }
        Error::Request(e.to_string())
    }
}
