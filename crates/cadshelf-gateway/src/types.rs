//! Wire envelopes that wrap the core gateway types.

use serde::Deserialize;

use cadshelf_core::ThumbnailDescriptor;

/// Response of the thumbnail info endpoint.
#[derive(Debug, Deserialize)]
pub struct ThumbnailInfo {
    #[serde(default)]
    pub sizes: Vec<ThumbnailDescriptor>,
}

/// Error body returned by the API on non-success responses.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// Best human-readable detail from a raw error body.
    pub fn detail(raw: &str) -> String {
        match serde_json::from_str::<ApiErrorBody>(raw) {
            Ok(ApiErrorBody { message: Some(msg) }) => msg,
            _ => raw.chars().take(200).collect(),
        }
    }
}
