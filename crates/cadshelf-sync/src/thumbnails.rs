//! Downloads the canonical preview thumbnail into local storage.

use std::sync::Arc;

use tracing::{debug, instrument};

use cadshelf_core::{DocumentGateway, Result, ThumbnailDescriptor};
use cadshelf_store::{AssetStore, StoredAsset};

/// Fetches preview thumbnail bytes and stores them keyed by document id.
pub struct ThumbnailMaterializer {
    gateway: Arc<dyn DocumentGateway>,
    assets: AssetStore,
}

impl ThumbnailMaterializer {
    pub fn new(gateway: Arc<dyn DocumentGateway>, assets: AssetStore) -> Self {
        Self { gateway, assets }
    }

    /// Download and store `descriptor`'s bytes. Identical bytes already on
    /// disk are left untouched.
    #[instrument(skip(self, descriptor), fields(subsystem = "sync", component = "thumbnails", op = "materialize", size = %descriptor.size))]
    pub async fn materialize(
        &self,
        document_id: &str,
        slug: &str,
        descriptor: &ThumbnailDescriptor,
    ) -> Result<StoredAsset> {
        let bytes = self.gateway.download_thumbnail(&descriptor.href).await?;
        let stored = self
            .assets
            .store_thumbnail(
                document_id,
                slug,
                descriptor.media_type.as_deref(),
                &bytes,
                &descriptor.href,
            )
            .await?;
        debug!(changed = stored.changed, size_bytes = bytes.len(), "Thumbnail materialized");
        Ok(stored)
    }
}
