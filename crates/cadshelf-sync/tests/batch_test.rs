//! Batch selection and continuation against the in-memory gateway.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cadshelf_core::{DocumentRecord, DocumentSummary, Error, Result, RecordStore};
use cadshelf_gateway::mock::{MockFailure, MockGateway, MockOp};
use cadshelf_store::{AssetStore, FsRecordStore};
use cadshelf_sync::{
    select_documents, BatchCriteria, BatchOptions, BatchRunner, BatchStage, PdfRenderer,
    Reconciler, SyncService,
};

fn listed(id: &str, name: &str, labels: &[&str]) -> DocumentSummary {
    DocumentSummary {
        id: id.to_string(),
        name: name.to_string(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
    }
}

fn three_documents() -> MockGateway {
    MockGateway::new()
        .with_document("a", "Alpha", &["meshtastic"])
        .with_document("b", "Bravo", &["meshtastic"])
        .with_document("c", "Charlie", &["meshtastic"])
        .with_listing(
            vec![
                listed("a", "Alpha", &["meshtastic"]),
                listed("b", "Bravo", &["meshtastic"]),
                listed("c", "Charlie", &["meshtastic"]),
            ],
            2,
        )
}

async fn runner(
    gw: &MockGateway,
    dir: &Path,
    renderer: Option<Arc<dyn PdfRenderer>>,
) -> (BatchRunner, Arc<FsRecordStore>) {
    let store = Arc::new(FsRecordStore::open(dir).await.unwrap());
    let service = SyncService::new(
        Arc::new(gw.clone()),
        store.clone(),
        AssetStore::new(dir),
        Reconciler::default(),
    );
    (BatchRunner::new(Arc::new(service), renderer), store)
}

struct FakeRenderer;

#[async_trait]
impl PdfRenderer for FakeRenderer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn render(
        &self,
        record: &DocumentRecord,
        _thumbnail: Option<&Path>,
    ) -> Result<Vec<u8>> {
        if record.document_id == "c" {
            return Err(Error::Render("template error".to_string()));
        }
        Ok(format!("%PDF {}", record.title).into_bytes())
    }
}

#[tokio::test]
async fn test_batch_continues_past_failure() {
    let dir = tempfile::tempdir().unwrap();
    let gw = three_documents().fail("b", MockOp::Document, MockFailure::NotFound);
    let (runner, store) = runner(&gw, dir.path(), None).await;

    let summary = runner
        .run(&BatchCriteria::default(), &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].document_id, "b");
    assert_eq!(summary.failures[0].document_name, "Bravo");
    assert_eq!(summary.failures[0].stage, BatchStage::Sync);
    // The third document was still attempted.
    assert!(store.load("c").await.unwrap().is_some());
}

#[tokio::test]
async fn test_batch_aborts_on_unauthorized() {
    let dir = tempfile::tempdir().unwrap();
    let gw = three_documents().fail("b", MockOp::Document, MockFailure::Unauthorized);
    let (runner, store) = runner(&gw, dir.path(), None).await;

    let err = runner
        .run(&BatchCriteria::default(), &BatchOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_auth());
    assert!(store.load("a").await.unwrap().is_some());
    assert!(store.load("c").await.unwrap().is_none());
}

#[tokio::test]
async fn test_selection_follows_pages() {
    let gw = three_documents();
    let all = select_documents(&gw, &BatchCriteria::default()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(gw.call_count(MockOp::List), 2);
}

#[tokio::test]
async fn test_single_page_mode_stops_early() {
    let gw = three_documents();
    let criteria = BatchCriteria {
        single_page: true,
        ..Default::default()
    };
    let first_page = select_documents(&gw, &criteria).await.unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(gw.call_count(MockOp::List), 1);
}

#[tokio::test]
async fn test_label_selection_filters_client_side() {
    let gw = MockGateway::new().with_listing(
        vec![
            listed("a", "Alpha", &["meshtastic"]),
            listed("b", "Bravo", &["lora"]),
            listed("c", "Charlie", &["Meshtastic", "lora"]),
        ],
        10,
    );
    let criteria = BatchCriteria {
        label: Some("meshtastic".to_string()),
        filter: Some(cadshelf_core::DocumentFilter::Shared),
        ..Default::default()
    };

    let selected = select_documents(&gw, &criteria).await.unwrap();
    let ids: Vec<&str> = selected.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);

    let sent = gw.list_queries();
    assert!(sent[0].filter.is_none());
}

#[tokio::test]
async fn test_listing_failure_propagates() {
    let gw = three_documents().fail("list", MockOp::List, MockFailure::Unavailable);
    assert!(select_documents(&gw, &BatchCriteria::default()).await.is_err());
}

#[tokio::test]
async fn test_render_and_upload_failures_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let gw = three_documents();
    let (runner, store) = runner(&gw, dir.path(), Some(Arc::new(FakeRenderer))).await;

    let options = BatchOptions {
        render_pdf: true,
        upload_pdf: true,
        upload_delay: Duration::ZERO,
    };
    let summary = runner.run(&BatchCriteria::default(), &options).await.unwrap();

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.rendered, 2);
    // No workspaces are known for these documents, so uploads fail locally.
    assert_eq!(summary.uploaded, 0);
    let stages: Vec<BatchStage> = summary.failures.iter().map(|f| f.stage).collect();
    assert_eq!(
        stages,
        vec![BatchStage::Upload, BatchStage::Upload, BatchStage::Render, BatchStage::Upload]
    );
    assert_eq!(summary.failures[3].reason, "render failed");
    assert!(store.load("c").await.unwrap().is_some());
}

fn with_main_workspaces(gw: MockGateway) -> MockGateway {
    let ws = |id: &str| cadshelf_core::RemoteWorkspace {
        id: format!("ws-{}", id),
        name: "Main".to_string(),
        is_main: true,
        workspace_type: None,
    };
    gw.with_workspaces("a", vec![ws("a")])
        .with_workspaces("b", vec![ws("b")])
        .with_workspaces("c", vec![ws("c")])
}

#[tokio::test]
async fn test_failed_render_skips_upload_of_stale_pdf() {
    let dir = tempfile::tempdir().unwrap();
    AssetStore::new(dir.path())
        .store_pdf("c", "charlie", b"OLD charlie", "previous run")
        .await
        .unwrap();
    let gw = with_main_workspaces(three_documents());
    let (runner, _) = runner(&gw, dir.path(), Some(Arc::new(FakeRenderer))).await;

    let options = BatchOptions {
        render_pdf: true,
        upload_pdf: true,
        upload_delay: Duration::ZERO,
    };
    let summary = runner.run(&BatchCriteria::default(), &options).await.unwrap();

    assert_eq!(summary.rendered, 2);
    assert_eq!(summary.uploaded, 2);
    let uploaded: Vec<String> = gw.uploads().iter().map(|u| u.upload.document_id.clone()).collect();
    assert_eq!(uploaded, vec!["a", "b"]);

    let skipped = summary
        .failures
        .iter()
        .find(|f| f.document_id == "c" && f.stage == BatchStage::Upload)
        .unwrap();
    assert_eq!(skipped.reason, "render failed");
}

#[tokio::test(start_paused = true)]
async fn test_delay_follows_failed_upload_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let assets = AssetStore::new(dir.path());
    for id in ["a", "b", "c"] {
        assets.store_pdf(id, id, b"%PDF", "test").await.unwrap();
    }
    let gw = with_main_workspaces(three_documents()).fail(
        "a",
        MockOp::Upload,
        MockFailure::Unavailable,
    );
    let (runner, _) = runner(&gw, dir.path(), None).await;

    let options = BatchOptions {
        render_pdf: false,
        upload_pdf: true,
        upload_delay: Duration::from_secs(2),
    };
    let start = tokio::time::Instant::now();
    let summary = runner.run(&BatchCriteria::default(), &options).await.unwrap();

    assert_eq!(gw.call_count(MockOp::Upload), 3);
    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.failures[0].stage, BatchStage::Upload);
    assert!(start.elapsed() >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_uploads_are_spaced_by_delay() {
    let dir = tempfile::tempdir().unwrap();
    let gw = with_main_workspaces(three_documents());
    let (runner, _) = runner(&gw, dir.path(), Some(Arc::new(FakeRenderer))).await;

    let options = BatchOptions {
        render_pdf: true,
        upload_pdf: true,
        upload_delay: Duration::from_secs(2),
    };
    let start = tokio::time::Instant::now();
    let summary = runner.run(&BatchCriteria::default(), &options).await.unwrap();

    assert_eq!(summary.uploaded, 2);
    assert_eq!(gw.uploads().len(), 2);
    // One delay between the two uploads. "c" failed to render, so no upload
    // was attempted for it.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(4));
}

#[tokio::test]
async fn test_render_requested_without_renderer_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let gw = three_documents();
    let (runner, _) = runner(&gw, dir.path(), None).await;

    let options = BatchOptions {
        render_pdf: true,
        ..Default::default()
    };
    assert!(matches!(
        runner.run(&BatchCriteria::default(), &options).await,
        Err(Error::Config(_))
    ));
}
