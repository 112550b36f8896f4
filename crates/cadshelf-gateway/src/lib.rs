//! # cadshelf-gateway
//!
//! HTTP client for the remote CAD document service.
//!
//! This crate provides:
//! - [`HttpGateway`], a `reqwest` implementation of `DocumentGateway`
//! - Environment-driven [`GatewayConfig`]
//! - Retry of transient upstream failures with linear backoff
//! - An in-memory mock gateway (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use cadshelf_core::DocumentGateway;
//! use cadshelf_gateway::HttpGateway;
//!
//! #[tokio::main]
//! async fn main() {
//!     let gateway = HttpGateway::from_env().unwrap();
//!     let doc = gateway.get_document("0123456789abcdef01234567").await.unwrap();
//!     println!("{}", doc.name);
//! }
//! ```

pub mod config;
pub mod http;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::{ConfigError, GatewayConfig};
pub use http::HttpGateway;
