//! Binary assets (thumbnails, PDFs) keyed by document id.
//!
//! Every asset `{dir}/{documentId}.{ext}` has a sidecar
//! `{dir}/{documentId}.meta.json` recording which document it belongs to and
//! the hash of its bytes, so artifacts correlate without relying on slugs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use cadshelf_core::defaults::{PDFS_DIR, THUMBNAILS_DIR, THUMBNAIL_MEDIA_TYPE};
use cadshelf_core::{Error, Result};

use crate::fs::{remove_if_exists, write_atomic};

const SIDECAR_SUFFIX: &str = "meta.json";
const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Asset kinds with their own directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Thumbnail,
    Pdf,
}

impl AssetKind {
    fn dir_name(&self) -> &'static str {
        match self {
            Self::Thumbnail => THUMBNAILS_DIR,
            Self::Pdf => PDFS_DIR,
        }
    }
}

/// Sidecar metadata written next to each asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    pub document_id: String,
    pub slug: String,
    pub media_type: String,
    /// `blake3:{hex}`
    pub content_hash: String,
    /// Where the bytes came from (thumbnail href, renderer name).
    pub source: String,
    pub stored_at: DateTime<Utc>,
}

impl AssetMeta {
    /// File name of the asset this sidecar describes.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.document_id, extension_for(&self.media_type))
    }
}

/// Outcome of storing an asset.
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub path: PathBuf,
    pub meta: AssetMeta,
    /// False when identical bytes were already stored.
    pub changed: bool,
}

/// Compute BLAKE3 hash of data with "blake3:" prefix.
pub fn compute_content_hash(data: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(data).to_hex())
}

/// Media type from the declared type, else magic bytes, else PNG.
pub fn detect_media_type(declared: Option<&str>, bytes: &[u8]) -> String {
    if let Some(declared) = declared.map(str::trim).filter(|d| !d.is_empty()) {
        return declared.to_string();
    }
    infer::get(bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| THUMBNAIL_MEDIA_TYPE.to_string())
}

/// File extension for a media type.
pub fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        PDF_MEDIA_TYPE => "pdf",
        _ => "bin",
    }
}

/// Reject ids that cannot be used as a file name.
fn check_id(document_id: &str) -> Result<&str> {
    if document_id.is_empty()
        || document_id.starts_with('.')
        || document_id.contains(['/', '\\'])
    {
        return Err(Error::InvalidInput(format!(
            "Invalid document id for asset path: {:?}",
            document_id
        )));
    }
    Ok(document_id)
}

/// Filesystem storage for thumbnails and PDFs.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Asset store rooted at the data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, kind: AssetKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    fn sidecar_path(&self, kind: AssetKind, document_id: &str) -> PathBuf {
        self.dir(kind)
            .join(format!("{}.{}", document_id, SIDECAR_SUFFIX))
    }

    /// Read an asset's sidecar. A missing or unreadable sidecar is `None`.
    pub async fn meta(&self, kind: AssetKind, document_id: &str) -> Result<Option<AssetMeta>> {
        let path = self.sidecar_path(kind, check_id(document_id)?);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let raw = fs::read(&path).await?;
        match serde_json::from_slice(&raw) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable asset sidecar");
                Ok(None)
            }
        }
    }

    /// Path of a stored asset, relative to the data directory.
    pub async fn relative_path(&self, kind: AssetKind, document_id: &str) -> Result<Option<String>> {
        let meta = match self.meta(kind, document_id).await? {
            Some(meta) => meta,
            None => return Ok(None),
        };
        let file_name = meta.file_name();
        if !fs::try_exists(self.dir(kind).join(&file_name)).await? {
            return Ok(None);
        }
        Ok(Some(format!("{}/{}", kind.dir_name(), file_name)))
    }

    async fn store(
        &self,
        kind: AssetKind,
        document_id: &str,
        slug: &str,
        media_type: String,
        bytes: &[u8],
        source: &str,
    ) -> Result<StoredAsset> {
        let document_id = check_id(document_id)?;
        let content_hash = compute_content_hash(bytes);
        let dir = self.dir(kind);
        let previous = self.meta(kind, document_id).await?;

        let meta = AssetMeta {
            document_id: document_id.to_string(),
            slug: slug.to_string(),
            media_type,
            content_hash,
            source: source.to_string(),
            stored_at: Utc::now(),
        };
        let path = dir.join(meta.file_name());

        if let Some(ref prev) = previous {
            let same_bytes = prev.content_hash == meta.content_hash
                && prev.media_type == meta.media_type
                && fs::try_exists(&path).await?;
            if same_bytes {
                if prev.slug != meta.slug {
                    let updated = AssetMeta {
                        slug: meta.slug.clone(),
                        ..prev.clone()
                    };
                    self.write_sidecar(kind, &updated).await?;
                    return Ok(StoredAsset { path, meta: updated, changed: false });
                }
                debug!(document_id, content_hash = %prev.content_hash, "Asset unchanged, skipping write");
                return Ok(StoredAsset { path, meta: prev.clone(), changed: false });
            }
            let old_path = dir.join(prev.file_name());
            if old_path != path {
                remove_if_exists(&old_path).await?;
            }
        }

        write_atomic(&path, bytes).await?;
        self.write_sidecar(kind, &meta).await?;
        info!(
            document_id,
            path = %path.display(),
            size_bytes = bytes.len(),
            media_type = %meta.media_type,
            "Asset stored"
        );
        Ok(StoredAsset { path, meta, changed: true })
    }

    async fn write_sidecar(&self, kind: AssetKind, meta: &AssetMeta) -> Result<()> {
        let mut json = serde_json::to_string_pretty(meta)?;
        json.push('\n');
        write_atomic(&self.sidecar_path(kind, &meta.document_id), json.as_bytes()).await
    }

    /// Store preview thumbnail bytes for a document.
    pub async fn store_thumbnail(
        &self,
        document_id: &str,
        slug: &str,
        declared_media_type: Option<&str>,
        bytes: &[u8],
        source: &str,
    ) -> Result<StoredAsset> {
        let media_type = detect_media_type(declared_media_type, bytes);
        self.store(AssetKind::Thumbnail, document_id, slug, media_type, bytes, source)
            .await
    }

    /// Store a rendered PDF for a document.
    pub async fn store_pdf(
        &self,
        document_id: &str,
        slug: &str,
        bytes: &[u8],
        source: &str,
    ) -> Result<StoredAsset> {
        self.store(
            AssetKind::Pdf,
            document_id,
            slug,
            PDF_MEDIA_TYPE.to_string(),
            bytes,
            source,
        )
        .await
    }

    /// Path where a document's PDF is stored.
    pub fn pdf_path(&self, document_id: &str) -> Result<PathBuf> {
        Ok(self
            .dir(AssetKind::Pdf)
            .join(format!("{}.pdf", check_id(document_id)?)))
    }

    /// Read a document's stored PDF, if any.
    pub async fn read_pdf(&self, document_id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.pdf_path(document_id)?;
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        Ok(Some(fs::read(&path).await?))
    }
}
