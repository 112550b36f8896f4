//! # cadshelf-sync
//!
//! The sync engine: fetch a document's remote state, merge it with the local
//! record without losing user edits, persist it, and pull the preview
//! thumbnail. Batches drive the same pipeline over a remote listing, with
//! optional PDF rendering and upload per document.

pub mod batch;
pub mod gallery;
pub mod reconcile;
pub mod render;
pub mod service;
pub mod snapshot;
pub mod thumbnails;
pub mod upload;

pub use batch::{
    select_documents, BatchCriteria, BatchFailure, BatchOptions, BatchRunner, BatchStage,
    BatchSummary,
};
pub use gallery::{build_manifest, write_manifest, GalleryEntry, GalleryManifest};
pub use reconcile::{ReconcileConfig, Reconciler};
pub use render::{render_and_store, CommandPdfRenderer, PdfRenderer};
pub use service::{SyncConfig, SyncOutcome, SyncService};
pub use snapshot::{fetch_snapshot, RemoteSnapshot};
pub use thumbnails::ThumbnailMaterializer;
pub use upload::{PdfUploader, UploadOutcome};
