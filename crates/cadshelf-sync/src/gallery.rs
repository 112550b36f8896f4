//! Gallery manifest consumed by the static-site renderer.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use cadshelf_core::defaults::GALLERY_MANIFEST;
use cadshelf_core::{Author, RecordStore, Result};
use cadshelf_store::fs::write_atomic;
use cadshelf_store::{storage_slug, AssetKind, AssetStore};

/// One document in the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEntry {
    pub document_id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    /// Thumbnail path relative to the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// PDF path relative to the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryManifest {
    pub generated_at: DateTime<Utc>,
    pub documents: Vec<GalleryEntry>,
}

/// Build the manifest from every stored record, sorted by title.
pub async fn build_manifest(
    store: &dyn RecordStore,
    assets: &AssetStore,
) -> Result<GalleryManifest> {
    let records = store.list_all().await?;
    let mut documents = Vec::with_capacity(records.len());

    for record in records {
        let id = record.document_id.as_str();
        let slug = store
            .slug_of(id)
            .await?
            .unwrap_or_else(|| storage_slug(&record.title, id));
        documents.push(GalleryEntry {
            document_id: record.document_id.clone(),
            slug,
            thumbnail: assets.relative_path(AssetKind::Thumbnail, id).await?,
            pdf: assets.relative_path(AssetKind::Pdf, id).await?,
            title: record.title,
            description: record.description,
            labels: record.labels,
            created_at: record.created_at,
            author: record.user_data.author,
        });
    }

    documents.sort_by(|a, b| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.document_id.cmp(&b.document_id))
    });

    Ok(GalleryManifest {
        generated_at: Utc::now(),
        documents,
    })
}

/// Build and write `gallery.json` at the data root.
#[instrument(skip_all, fields(subsystem = "sync", component = "gallery", op = "write_manifest"))]
pub async fn write_manifest(store: &dyn RecordStore, assets: &AssetStore) -> Result<PathBuf> {
    let manifest = build_manifest(store, assets).await?;
    let path = assets.root().join(GALLERY_MANIFEST);

    let mut json = serde_json::to_string_pretty(&manifest)?;
    json.push('\n');
    write_atomic(&path, json.as_bytes()).await?;

    info!(
        path = %path.display(),
        result_count = manifest.documents.len(),
        "Gallery manifest written"
    );
    Ok(path)
}
