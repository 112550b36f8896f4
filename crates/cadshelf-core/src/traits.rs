//! Core traits for cadshelf abstractions.
//!
//! These traits define the seams between the sync engine and its
//! collaborators, enabling an HTTP gateway and a filesystem store in
//! production and in-memory fakes in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::DocumentRecord;
use crate::remote::*;

// =============================================================================
// REMOTE GATEWAY
// =============================================================================

/// Authenticated access to the remote document service.
///
/// Every call is an independent failure boundary. Implementations own
/// transport concerns (auth, timeouts, retry of transient failures).
#[async_trait]
pub trait DocumentGateway: Send + Sync {
    /// Fetch core metadata. Fails with `NotFound` or `Unauthorized`.
    async fn get_document(&self, document_id: &str) -> Result<RemoteDocument>;

    /// List the workspaces of a document.
    async fn get_workspaces(&self, document_id: &str) -> Result<Vec<RemoteWorkspace>>;

    /// List the versions of a document, oldest first.
    async fn get_versions(&self, document_id: &str) -> Result<Vec<RemoteVersion>>;

    /// List the available thumbnail renderings of a document.
    async fn get_thumbnail_descriptors(
        &self,
        document_id: &str,
    ) -> Result<Vec<ThumbnailDescriptor>>;

    /// Download thumbnail bytes from a descriptor's href.
    async fn download_thumbnail(&self, href: &str) -> Result<Vec<u8>>;

    /// Fetch one page of the document listing. `next` is the continuation
    /// pointer returned by the previous page.
    async fn list_documents(&self, query: &ListQuery, next: Option<&str>) -> Result<DocumentPage>;

    /// Store a new blob element in a document workspace.
    async fn upload_document_asset(&self, upload: AssetUpload) -> Result<UploadedAsset>;

    /// Replace the contents of an existing blob element.
    async fn update_document_asset(
        &self,
        element_id: &str,
        upload: AssetUpload,
    ) -> Result<UploadedAsset>;
}

// =============================================================================
// LOCAL STORE
// =============================================================================

/// Persistence for document records, one per document id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load the record for a document. `Ok(None)` when never synced,
    /// `Err(LocalStoreCorrupt)` when a file exists but does not parse.
    async fn load(&self, document_id: &str) -> Result<Option<DocumentRecord>>;

    /// Persist a record, replacing any previous one for the same id.
    async fn save(&self, document_id: &str, record: &DocumentRecord) -> Result<()>;

    /// All readable records. Unreadable files are skipped with a warning.
    async fn list_all(&self) -> Result<Vec<DocumentRecord>>;

    /// Storage key (file stem) of a document's record, if one exists.
    async fn slug_of(&self, document_id: &str) -> Result<Option<String>>;
}
