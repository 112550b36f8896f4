//! Single-document sync: fetch, merge, persist, materialize.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};

use cadshelf_core::defaults::{DATA_DIR, UPLOAD_DELAY_MS};
use cadshelf_core::{DataKind, DocumentGateway, DocumentRecord, Error, RecordStore, Result};
use cadshelf_store::{storage_slug, AssetStore};

use crate::reconcile::{ReconcileConfig, Reconciler};
use crate::snapshot::fetch_snapshot;
use crate::thumbnails::ThumbnailMaterializer;

/// Settings shared by sync, batch, and upload workflows.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Root of `records/`, `thumbnails/`, `pdfs/`, and the gallery manifest.
    pub data_dir: PathBuf,
    pub reconcile: ReconcileConfig,
    /// Pause between successive uploads in a batch.
    pub upload_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_DIR),
            reconcile: ReconcileConfig::default(),
            upload_delay: Duration::from_millis(UPLOAD_DELAY_MS),
        }
    }
}

impl SyncConfig {
    /// Load from environment variables.
    ///
    /// - `CADSHELF_DATA_DIR` (default `./data`)
    /// - `CADSHELF_UPLOAD_DELAY_MS` (default 2000)
    /// - see [`ReconcileConfig::from_env`]
    pub fn from_env() -> Self {
        let data_dir = std::env::var("CADSHELF_DATA_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DATA_DIR));

        let upload_delay_ms = std::env::var("CADSHELF_UPLOAD_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(UPLOAD_DELAY_MS);

        Self {
            data_dir,
            reconcile: ReconcileConfig::from_env(),
            upload_delay: Duration::from_millis(upload_delay_ms),
        }
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }
}

/// Result of syncing one document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub document_id: String,
    pub title: String,
    /// Storage key of the written record.
    pub slug: String,
    /// Fields that came back empty because their fetch failed.
    pub degraded: Vec<DataKind>,
    /// Path of the local preview thumbnail, when one was materialized.
    pub thumbnail: Option<PathBuf>,
    #[serde(skip)]
    pub record: DocumentRecord,
}

/// Drives the sync of individual documents.
pub struct SyncService {
    gateway: Arc<dyn DocumentGateway>,
    store: Arc<dyn RecordStore>,
    assets: AssetStore,
    reconciler: Reconciler,
    materializer: ThumbnailMaterializer,
}

impl SyncService {
    pub fn new(
        gateway: Arc<dyn DocumentGateway>,
        store: Arc<dyn RecordStore>,
        assets: AssetStore,
        reconciler: Reconciler,
    ) -> Self {
        let materializer = ThumbnailMaterializer::new(gateway.clone(), assets.clone());
        Self {
            gateway,
            store,
            assets,
            reconciler,
            materializer,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn DocumentGateway> {
        &self.gateway
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Sync one document and persist the merged record.
    ///
    /// Fails on metadata errors, credential errors, and local write errors.
    /// Field fetch failures and thumbnail download failures only log.
    #[instrument(skip(self), fields(subsystem = "sync", component = "service", op = "sync_document"))]
    pub async fn sync_document(&self, document_id: &str) -> Result<SyncOutcome> {
        let snapshot = fetch_snapshot(self.gateway.as_ref(), document_id).await?;

        let prior = match self.store.load(document_id).await {
            Ok(prior) => prior,
            Err(e @ Error::LocalStoreCorrupt { .. }) => {
                warn!(document_id, error = %e, "Prior record unreadable, treating as absent");
                None
            }
            Err(e) => return Err(e),
        };

        let record = self.reconciler.reconcile(&snapshot, prior.as_ref());
        self.store.save(document_id, &record).await?;

        let slug = self
            .store
            .slug_of(document_id)
            .await?
            .unwrap_or_else(|| storage_slug(&record.title, document_id));

        let thumbnail = match self.reconciler.preview_descriptor(&snapshot) {
            Some(descriptor) => match self
                .materializer
                .materialize(document_id, &slug, descriptor)
                .await
            {
                Ok(stored) => Some(stored.path),
                Err(e) => {
                    warn!(
                        document_id,
                        document_name = %record.title,
                        field = "thumbnail",
                        error = %e,
                        "Thumbnail download failed, record kept"
                    );
                    None
                }
            },
            None => None,
        };

        info!(
            document_name = %record.title,
            slug = %slug,
            degraded = snapshot.degraded.len(),
            "Document synced"
        );

        Ok(SyncOutcome {
            document_id: document_id.to_string(),
            title: record.title.clone(),
            slug,
            degraded: snapshot.degraded,
            thumbnail,
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.upload_delay, Duration::from_millis(2000));
    }

    #[test]
    fn test_sync_config_builders() {
        let config = SyncConfig::default()
            .with_data_dir("/tmp/shelf")
            .with_upload_delay(Duration::ZERO);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/shelf"));
        assert!(config.upload_delay.is_zero());
    }
}
