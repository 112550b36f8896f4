//! Fetching the remote state of one document.
//!
//! Metadata is mandatory. Workspaces, versions, and thumbnails are each an
//! independent failure boundary: a failed fetch is logged as partial data
//! loss and the field comes back empty.

use std::future::Future;

use tracing::{debug, instrument, warn};

use cadshelf_core::{
    DataKind, DocumentGateway, Error, RemoteDocument, RemoteVersion, RemoteWorkspace, Result,
    ThumbnailDescriptor,
};

/// Everything fetched for one document in a single sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub document: RemoteDocument,
    pub workspaces: Vec<RemoteWorkspace>,
    pub versions: Vec<RemoteVersion>,
    pub thumbnails: Vec<ThumbnailDescriptor>,
    /// Fields whose fetch failed and were downgraded to empty.
    pub degraded: Vec<DataKind>,
}

impl RemoteSnapshot {
    /// Snapshot with metadata only and every other field empty.
    pub fn from_document(document: RemoteDocument) -> Self {
        Self {
            document,
            workspaces: Vec::new(),
            versions: Vec::new(),
            thumbnails: Vec::new(),
            degraded: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.degraded.is_empty()
    }
}

/// Fetch a document's snapshot. Fails only when metadata cannot be fetched
/// or credentials are rejected.
#[instrument(skip(gateway), fields(subsystem = "sync", component = "snapshot", op = "fetch"))]
pub async fn fetch_snapshot(
    gateway: &dyn DocumentGateway,
    document_id: &str,
) -> Result<RemoteSnapshot> {
    let document = gateway.get_document(document_id).await?;
    let name = document.name.clone();
    let mut snapshot = RemoteSnapshot::from_document(document);

    snapshot.workspaces = isolate(
        DataKind::Workspaces,
        document_id,
        &name,
        gateway.get_workspaces(document_id),
        &mut snapshot.degraded,
    )
    .await?;
    snapshot.versions = isolate(
        DataKind::Versions,
        document_id,
        &name,
        gateway.get_versions(document_id),
        &mut snapshot.degraded,
    )
    .await?;
    snapshot.thumbnails = isolate(
        DataKind::Thumbnails,
        document_id,
        &name,
        gateway.get_thumbnail_descriptors(document_id),
        &mut snapshot.degraded,
    )
    .await?;

    debug!(
        document_name = %name,
        workspaces = snapshot.workspaces.len(),
        versions = snapshot.versions.len(),
        thumbnails = snapshot.thumbnails.len(),
        degraded = snapshot.degraded.len(),
        "Snapshot fetched"
    );
    Ok(snapshot)
}

/// Await one field fetch, downgrading any failure except `Unauthorized` to
/// an empty value.
async fn isolate<T, F>(
    field: DataKind,
    document_id: &str,
    document_name: &str,
    fetch: F,
    degraded: &mut Vec<DataKind>,
) -> Result<Vec<T>>
where
    F: Future<Output = Result<Vec<T>>>,
{
    match fetch.await {
        Ok(values) => Ok(values),
        Err(e) if e.is_auth() => Err(e),
        Err(e) => {
            let loss = Error::PartialDataLoss {
                field,
                message: e.to_string(),
            };
            warn!(document_id, document_name, field = %field, error = %loss, "Field fetch failed, using empty value");
            degraded.push(field);
            Ok(Vec::new())
        }
    }
}
