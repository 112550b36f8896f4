//! # cadshelf-core
//!
//! Core types, traits, and error taxonomy for cadshelf.
//!
//! This crate provides the record model persisted per remote CAD document,
//! the wire types exchanged with the remote document service, and the
//! trait seams (`DocumentGateway`, `RecordStore`) the sync engine is built on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod remote;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use remote::*;
pub use traits::*;
