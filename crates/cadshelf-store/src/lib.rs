//! # cadshelf-store
//!
//! Local persistence for cadshelf: one pretty-printed JSON record per
//! document under `records/`, plus thumbnail and PDF assets with sidecar
//! metadata under `thumbnails/` and `pdfs/`.

pub mod assets;
pub mod fs;
pub mod records;
pub mod slug;

pub use assets::{
    compute_content_hash, detect_media_type, AssetKind, AssetMeta, AssetStore, StoredAsset,
};
pub use records::FsRecordStore;
pub use slug::{collision_slug, escaped_id, slugify, storage_slug};
