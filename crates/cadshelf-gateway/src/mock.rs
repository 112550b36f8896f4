//! In-memory gateway for deterministic testing.
//!
//! Serves canned documents, workspaces, versions, thumbnails, and listing
//! pages, and lets tests inject a failure for any single call.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cadshelf_gateway::mock::{MockFailure, MockGateway, MockOp};
//!
//! let gateway = MockGateway::new()
//!     .with_document("d1", "Bracket", &["meshtastic"])
//!     .fail("d1", MockOp::Versions, MockFailure::Unavailable);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use cadshelf_core::{
    AssetUpload, DocumentGateway, DocumentPage, DocumentSummary, Error, ListQuery,
    RemoteDocument, RemoteVersion, RemoteWorkspace, Result, ThumbnailDescriptor, UploadedAsset,
};

/// Continuation pointer prefix used by mock listing pages.
const PAGE_PREFIX: &str = "mock://page/";

/// Gateway call kinds, for failure injection and call inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Document,
    Workspaces,
    Versions,
    Thumbnails,
    Download,
    List,
    Upload,
}

/// Failure to inject for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    NotFound,
    Unauthorized,
    Unavailable,
}

impl MockFailure {
    fn to_error(self, target: &str) -> Error {
        match self {
            Self::NotFound => Error::NotFound(format!("mock: {}", target)),
            Self::Unauthorized => Error::Unauthorized(format!("mock: {}", target)),
            Self::Unavailable => Error::UpstreamUnavailable(format!("mock: {}", target)),
        }
    }
}

/// A recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub op: MockOp,
    pub target: String,
}

/// A recorded upload; `element_id` is set for update calls.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub element_id: Option<String>,
    pub upload: AssetUpload,
}

#[derive(Default)]
struct MockDocument {
    document: Option<RemoteDocument>,
    workspaces: Vec<RemoteWorkspace>,
    versions: Vec<RemoteVersion>,
    thumbnails: Vec<ThumbnailDescriptor>,
}

#[derive(Default)]
struct MockState {
    documents: HashMap<String, MockDocument>,
    failures: HashMap<(String, MockOp), MockFailure>,
    thumbnail_bytes: HashMap<String, Vec<u8>>,
    listing: Vec<DocumentSummary>,
    page_size: usize,
    calls: Vec<MockCall>,
    list_queries: Vec<ListQuery>,
    uploads: Vec<RecordedUpload>,
    next_element: u32,
}

/// Mock gateway for testing.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    /// Create an empty mock gateway.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panic inside a test holding the lock poisons it; keep serving.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a document with metadata only.
    pub fn with_document(self, id: &str, name: &str, labels: &[&str]) -> Self {
        let document = RemoteDocument {
            id: id.to_string(),
            name: name.to_string(),
            description: Some(format!("{} description", name)),
            created_at: Some("2024-03-01T10:00:00Z".to_string()),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        };
        self.with_remote_document(document)
    }

    /// Add a document from full metadata.
    pub fn with_remote_document(self, document: RemoteDocument) -> Self {
        let id = document.id.clone();
        self.state().documents.entry(id).or_default().document = Some(document);
        self
    }

    /// Set the workspaces of a document.
    pub fn with_workspaces(self, id: &str, workspaces: Vec<RemoteWorkspace>) -> Self {
        self.state().documents.entry(id.to_string()).or_default().workspaces = workspaces;
        self
    }

    /// Set the versions of a document.
    pub fn with_versions(self, id: &str, versions: Vec<RemoteVersion>) -> Self {
        self.state().documents.entry(id.to_string()).or_default().versions = versions;
        self
    }

    /// Set the thumbnail descriptors of a document.
    pub fn with_thumbnails(self, id: &str, thumbnails: Vec<ThumbnailDescriptor>) -> Self {
        self.state().documents.entry(id.to_string()).or_default().thumbnails = thumbnails;
        self
    }

    /// Serve bytes for a thumbnail href.
    pub fn with_thumbnail_bytes(self, href: &str, bytes: Vec<u8>) -> Self {
        self.state()
            .thumbnail_bytes
            .insert(href.to_string(), bytes);
        self
    }

    /// Serve a listing split into pages of `page_size` items.
    pub fn with_listing(self, items: Vec<DocumentSummary>, page_size: usize) -> Self {
        {
            let mut state = self.state();
            state.listing = items;
            state.page_size = page_size.max(1);
        }
        self
    }

    /// Fail every call of `op` for `target` (document id, href, or "list").
    pub fn fail(self, target: &str, op: MockOp, failure: MockFailure) -> Self {
        self.state()
            .failures
            .insert((target.to_string(), op), failure);
        self
    }

    /// Remove an injected failure.
    pub fn heal(&self, target: &str, op: MockOp) {
        self.state().failures.remove(&(target.to_string(), op));
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Number of calls of one kind.
    pub fn call_count(&self, op: MockOp) -> usize {
        self.state().calls.iter().filter(|c| c.op == op).count()
    }

    /// Queries passed to `list_documents` for first pages.
    pub fn list_queries(&self) -> Vec<ListQuery> {
        self.state().list_queries.clone()
    }

    /// All uploads and updates received.
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.state().uploads.clone()
    }

    fn enter(&self, op: MockOp, target: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(MockCall {
            op,
            target: target.to_string(),
        });
        match state.failures.get(&(target.to_string(), op)) {
            Some(failure) => Err(failure.to_error(target)),
            None => Ok(()),
        }
    }

    fn missing(id: &str) -> Error {
        Error::NotFound(format!("mock: document {}", id))
    }
}

#[async_trait]
impl DocumentGateway for MockGateway {
    async fn get_document(&self, document_id: &str) -> Result<RemoteDocument> {
        self.enter(MockOp::Document, document_id)?;
        self.state()
            .documents
            .get(document_id)
            .and_then(|d| d.document.clone())
            .ok_or_else(|| Self::missing(document_id))
    }

    async fn get_workspaces(&self, document_id: &str) -> Result<Vec<RemoteWorkspace>> {
        self.enter(MockOp::Workspaces, document_id)?;
        self.state()
            .documents
            .get(document_id)
            .map(|d| d.workspaces.clone())
            .ok_or_else(|| Self::missing(document_id))
    }

    async fn get_versions(&self, document_id: &str) -> Result<Vec<RemoteVersion>> {
        self.enter(MockOp::Versions, document_id)?;
        self.state()
            .documents
            .get(document_id)
            .map(|d| d.versions.clone())
            .ok_or_else(|| Self::missing(document_id))
    }

    async fn get_thumbnail_descriptors(
        &self,
        document_id: &str,
    ) -> Result<Vec<ThumbnailDescriptor>> {
        self.enter(MockOp::Thumbnails, document_id)?;
        self.state()
            .documents
            .get(document_id)
            .map(|d| d.thumbnails.clone())
            .ok_or_else(|| Self::missing(document_id))
    }

    async fn download_thumbnail(&self, href: &str) -> Result<Vec<u8>> {
        self.enter(MockOp::Download, href)?;
        self.state()
            .thumbnail_bytes
            .get(href)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("mock: thumbnail {}", href)))
    }

    async fn list_documents(&self, query: &ListQuery, next: Option<&str>) -> Result<DocumentPage> {
        self.enter(MockOp::List, "list")?;
        let mut state = self.state();

        let page_index = match next {
            None => {
                state.list_queries.push(query.clone());
                0
            }
            Some(href) => href
                .strip_prefix(PAGE_PREFIX)
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| Error::InvalidInput(format!("mock: bad pointer {}", href)))?,
        };

        let page_size = state.page_size.max(1);
        let start = page_index * page_size;
        let items: Vec<DocumentSummary> = state
            .listing
            .iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect();
        let next = if start + page_size < state.listing.len() {
            Some(format!("{}{}", PAGE_PREFIX, page_index + 1))
        } else {
            None
        };
        Ok(DocumentPage { items, next })
    }

    async fn upload_document_asset(&self, upload: AssetUpload) -> Result<UploadedAsset> {
        self.enter(MockOp::Upload, &upload.document_id)?;
        let mut state = self.state();
        state.next_element += 1;
        let id = format!("element-{}", state.next_element);
        state.uploads.push(RecordedUpload {
            element_id: None,
            upload,
        });
        Ok(UploadedAsset { id, href: None })
    }

    async fn update_document_asset(
        &self,
        element_id: &str,
        upload: AssetUpload,
    ) -> Result<UploadedAsset> {
        self.enter(MockOp::Upload, &upload.document_id)?;
        self.state().uploads.push(RecordedUpload {
            element_id: Some(element_id.to_string()),
            upload,
        });
        Ok(UploadedAsset {
            id: element_id.to_string(),
            href: None,
        })
    }
}
