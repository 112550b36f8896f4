//! Uploading rendered PDFs back into their document.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use cadshelf_core::{AssetUpload, DocumentGateway, Error, RecordStore, Result};
use cadshelf_store::{storage_slug, AssetStore};

const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Result of one PDF upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub document_id: String,
    pub workspace_id: String,
    pub element_id: String,
    /// True when an existing element was replaced.
    pub updated: bool,
}

/// Uploads a document's stored PDF as a blob element and remembers the
/// element id in `userData.pdfElementId`.
pub struct PdfUploader {
    gateway: Arc<dyn DocumentGateway>,
    store: Arc<dyn RecordStore>,
    assets: AssetStore,
}

impl PdfUploader {
    pub fn new(
        gateway: Arc<dyn DocumentGateway>,
        store: Arc<dyn RecordStore>,
        assets: AssetStore,
    ) -> Self {
        Self {
            gateway,
            store,
            assets,
        }
    }

    /// Upload the stored PDF for `document_id`.
    ///
    /// Targets `userData.workspaceId`, else the main workspace. Replaces the
    /// element named by `userData.pdfElementId` when set; if that element no
    /// longer exists a new one is created.
    #[instrument(skip(self), fields(subsystem = "sync", component = "upload", op = "upload_pdf"))]
    pub async fn upload(&self, document_id: &str) -> Result<UploadOutcome> {
        let mut record = self
            .store
            .load(document_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No local record for {}", document_id)))?;

        let workspace_id = record
            .target_workspace_id()
            .map(str::to_string)
            .ok_or_else(|| {
                Error::InvalidInput(format!("No target workspace known for {}", document_id))
            })?;

        let bytes = self
            .assets
            .read_pdf(document_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No rendered PDF for {}", document_id)))?;

        let slug = self
            .store
            .slug_of(document_id)
            .await?
            .unwrap_or_else(|| storage_slug(&record.title, document_id));

        let upload = AssetUpload {
            document_id: document_id.to_string(),
            workspace_id: workspace_id.clone(),
            filename: format!("{}.pdf", slug),
            display_name: Some(record.title.clone()).filter(|t| !t.is_empty()),
            media_type: PDF_MEDIA_TYPE.to_string(),
            bytes,
        };

        let (asset, updated) = match record.user_data.pdf_element_id.clone() {
            Some(element_id) => match self
                .gateway
                .update_document_asset(&element_id, upload.clone())
                .await
            {
                Ok(asset) => (asset, true),
                Err(Error::NotFound(msg)) => {
                    warn!(element_id = %element_id, error = %msg, "PDF element gone, uploading new one");
                    (self.gateway.upload_document_asset(upload).await?, false)
                }
                Err(e) => return Err(e),
            },
            None => (self.gateway.upload_document_asset(upload).await?, false),
        };

        if record.user_data.pdf_element_id.as_deref() != Some(asset.id.as_str()) {
            record.user_data.pdf_element_id = Some(asset.id.clone());
            self.store.save(document_id, &record).await?;
        }

        info!(
            workspace_id = %workspace_id,
            element_id = %asset.id,
            updated,
            "PDF uploaded"
        );
        Ok(UploadOutcome {
            document_id: document_id.to_string(),
            workspace_id,
            element_id: asset.id,
            updated,
        })
    }
}
