//! Batch selection and sequential sync of many documents.
//!
//! Candidates come from the remote listing. Each one is synced fully
//! (sync, optional PDF, optional upload) before the next starts. A failing
//! document is logged and recorded in the summary; only credential failures
//! stop the batch.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use cadshelf_core::{
    DocumentFilter, DocumentGateway, DocumentSummary, Error, ListQuery, Result, SortOrder,
};

use crate::render::{render_and_store, PdfRenderer};
use crate::service::SyncService;
use crate::upload::PdfUploader;

/// Which remote documents a batch covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchCriteria {
    /// Only documents carrying this label (case-insensitive).
    pub label: Option<String>,
    pub filter: Option<DocumentFilter>,
    /// Free-text search.
    pub query: Option<String>,
    pub sort_column: Option<String>,
    pub sort_order: Option<SortOrder>,
    /// Page size override.
    pub limit: Option<u32>,
    /// Stop after the first listing page.
    pub single_page: bool,
}

impl BatchCriteria {
    /// Listing request for these criteria. A label search lists everything
    /// and filters locally, because the listing endpoint cannot filter by
    /// label.
    pub fn list_query(&self) -> ListQuery {
        let query = ListQuery {
            filter: self.filter,
            query: self.query.clone(),
            sort_column: self.sort_column.clone(),
            sort_order: self.sort_order,
            limit: self.limit,
        };
        if self.label.is_some() {
            query.unfiltered()
        } else {
            query
        }
    }

    /// Local filtering applied to listed documents.
    pub fn matches(&self, summary: &DocumentSummary) -> bool {
        let Some(ref label) = self.label else {
            return true;
        };
        if !summary.has_label(label) {
            return false;
        }
        // The remote search was dropped for the unfiltered listing; apply it
        // to names instead.
        match self.query.as_deref().filter(|q| !q.is_empty()) {
            Some(q) => summary.name.to_lowercase().contains(&q.to_lowercase()),
            None => true,
        }
    }
}

/// Optional steps run after each successful sync.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub render_pdf: bool,
    pub upload_pdf: bool,
    pub upload_delay: Duration,
}

/// Stage of the per-document pipeline a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStage {
    Sync,
    Render,
    Upload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub document_id: String,
    pub document_name: String,
    pub stage: BatchStage,
    pub reason: String,
}

/// Counts for a finished batch. `succeeded` and `failed` count syncs;
/// render and upload failures appear only in `failures`. An upload skipped
/// because its render failed is listed under the upload stage too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rendered: usize,
    pub uploaded: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn record_failure(&mut self, doc: &DocumentSummary, stage: BatchStage, err: &Error) {
        error!(
            document_id = %doc.id,
            document_name = %doc.name,
            stage = ?stage,
            error = %err,
            "Batch item failed"
        );
        self.failures.push(BatchFailure {
            document_id: doc.id.clone(),
            document_name: doc.name.clone(),
            stage,
            reason: err.to_string(),
        });
    }

    fn record_skipped(&mut self, doc: &DocumentSummary, stage: BatchStage, reason: &str) {
        warn!(
            document_id = %doc.id,
            document_name = %doc.name,
            stage = ?stage,
            reason,
            "Batch step skipped"
        );
        self.failures.push(BatchFailure {
            document_id: doc.id.clone(),
            document_name: doc.name.clone(),
            stage,
            reason: reason.to_string(),
        });
    }
}

/// Enumerate candidates for `criteria`, following continuation pointers
/// unless `single_page` is set.
#[instrument(skip(gateway), fields(subsystem = "sync", component = "batch", op = "select"))]
pub async fn select_documents(
    gateway: &dyn DocumentGateway,
    criteria: &BatchCriteria,
) -> Result<Vec<DocumentSummary>> {
    let query = criteria.list_query();
    let mut selected = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut seen_pointers = HashSet::new();
    let mut next: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = gateway.list_documents(&query, next.as_deref()).await?;
        pages += 1;
        for item in page.items {
            if criteria.matches(&item) && seen_ids.insert(item.id.clone()) {
                selected.push(item);
            }
        }

        if criteria.single_page {
            break;
        }
        match page.next {
            Some(pointer) if seen_pointers.insert(pointer.clone()) => next = Some(pointer),
            Some(pointer) => {
                warn!(next = %pointer, "Listing returned a repeated page pointer, stopping");
                break;
            }
            None => break,
        }
    }

    info!(pages, result_count = selected.len(), "Batch candidates selected");
    Ok(selected)
}

/// Runs batches against a [`SyncService`].
pub struct BatchRunner {
    service: Arc<SyncService>,
    renderer: Option<Arc<dyn PdfRenderer>>,
    uploader: PdfUploader,
}

impl BatchRunner {
    pub fn new(service: Arc<SyncService>, renderer: Option<Arc<dyn PdfRenderer>>) -> Self {
        let uploader = PdfUploader::new(
            service.gateway().clone(),
            service.store().clone(),
            service.assets().clone(),
        );
        Self {
            service,
            renderer,
            uploader,
        }
    }

    /// Select and process every matching document.
    pub async fn run(&self, criteria: &BatchCriteria, options: &BatchOptions) -> Result<BatchSummary> {
        let candidates = select_documents(self.service.gateway().as_ref(), criteria).await?;
        self.process(&candidates, options).await
    }

    /// Process the given documents in order.
    ///
    /// Returns `Err` only for credential failures; everything else is
    /// collected in the summary.
    #[instrument(skip_all, fields(subsystem = "sync", component = "batch", op = "process", candidates = candidates.len()))]
    pub async fn process(
        &self,
        candidates: &[DocumentSummary],
        options: &BatchOptions,
    ) -> Result<BatchSummary> {
        if options.render_pdf && self.renderer.is_none() {
            return Err(Error::Config(
                "PDF rendering requested but no PDF command is configured".to_string(),
            ));
        }

        let mut summary = BatchSummary::default();
        let mut upload_attempts = 0usize;

        for doc in candidates {
            summary.processed += 1;

            let outcome = match self.service.sync_document(&doc.id).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_auth() => {
                    error!(document_id = %doc.id, error = %e, "Credentials rejected, aborting batch");
                    return Err(e);
                }
                Err(e) => {
                    summary.failed += 1;
                    summary.record_failure(doc, BatchStage::Sync, &e);
                    continue;
                }
            };
            summary.succeeded += 1;

            let mut rendered = true;
            if let (true, Some(renderer)) = (options.render_pdf, &self.renderer) {
                rendered = match render_and_store(
                    renderer.as_ref(),
                    self.service.assets(),
                    &outcome.record,
                    &outcome.slug,
                    outcome.thumbnail.as_deref(),
                )
                .await
                {
                    Ok(_) => {
                        summary.rendered += 1;
                        true
                    }
                    Err(e) => {
                        summary.record_failure(doc, BatchStage::Render, &e);
                        false
                    }
                };
            }

            if options.upload_pdf {
                // A stale PDF from an earlier run must not be uploaded.
                if !rendered {
                    summary.record_skipped(doc, BatchStage::Upload, "render failed");
                    continue;
                }
                if upload_attempts > 0 && !options.upload_delay.is_zero() {
                    sleep(options.upload_delay).await;
                }
                upload_attempts += 1;
                match self.uploader.upload(&doc.id).await {
                    Ok(_) => summary.uploaded += 1,
                    Err(e) if e.is_auth() => return Err(e),
                    Err(e) => summary.record_failure(doc, BatchStage::Upload, &e),
                }
            }
        }

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            rendered = summary.rendered,
            uploaded = summary.uploaded,
            "Batch finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str, labels: &[&str]) -> DocumentSummary {
        DocumentSummary {
            id: name.to_lowercase(),
            name: name.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn test_label_search_lists_unfiltered() {
        let criteria = BatchCriteria {
            label: Some("meshtastic".into()),
            filter: Some(DocumentFilter::OwnedByMe),
            query: Some("case".into()),
            sort_column: Some("name".into()),
            ..Default::default()
        };
        let query = criteria.list_query();
        assert!(query.filter.is_none());
        assert!(query.query.is_none());
        assert_eq!(query.sort_column.as_deref(), Some("name"));
    }

    #[test]
    fn test_plain_search_keeps_remote_filters() {
        let criteria = BatchCriteria {
            filter: Some(DocumentFilter::Shared),
            query: Some("case".into()),
            ..Default::default()
        };
        let query = criteria.list_query();
        assert_eq!(query.filter, Some(DocumentFilter::Shared));
        assert_eq!(query.query.as_deref(), Some("case"));
    }

    #[test]
    fn test_matches_label_case_insensitive() {
        let criteria = BatchCriteria {
            label: Some("LoRa".into()),
            ..Default::default()
        };
        assert!(criteria.matches(&summary("Antenna", &["lora"])));
        assert!(!criteria.matches(&summary("Bracket", &["meshtastic"])));
    }

    #[test]
    fn test_matches_label_and_query_on_name() {
        let criteria = BatchCriteria {
            label: Some("lora".into()),
            query: Some("ante".into()),
            ..Default::default()
        };
        assert!(criteria.matches(&summary("Antenna Mount", &["lora"])));
        assert!(!criteria.matches(&summary("Case", &["lora"])));
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let value = serde_json::to_value(BatchSummary::default()).unwrap();
        assert_eq!(value["processed"], 0);
        assert!(value["failures"].as_array().unwrap().is_empty());
    }
}
