//! End-to-end sync of single documents against the in-memory gateway.

use std::path::Path;
use std::sync::Arc;

use cadshelf_core::{
    DataKind, Error, RecordStore, RemoteVersion, RemoteWorkspace, ThumbnailDescriptor,
};
use cadshelf_gateway::mock::{MockFailure, MockGateway, MockOp};
use cadshelf_store::{AssetStore, FsRecordStore};
use cadshelf_sync::{write_manifest, PdfUploader, Reconciler, SyncService};
use tokio::fs;

const PREVIEW_HREF: &str = "https://cad.example.com/thumbs/doc1/300x170";
const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn gateway() -> MockGateway {
    MockGateway::new()
        .with_document("doc1", "Meshtastic Case", &["meshtastic"])
        .with_workspaces(
            "doc1",
            vec![RemoteWorkspace {
                id: "ws-main".to_string(),
                name: "Main".to_string(),
                is_main: true,
                workspace_type: None,
            }],
        )
        .with_versions(
            "doc1",
            vec![
                RemoteVersion {
                    id: "v0".to_string(),
                    name: "Start".to_string(),
                    description: None,
                    created_at: None,
                    microversion: None,
                },
                RemoteVersion {
                    id: "v1".to_string(),
                    name: "V1".to_string(),
                    description: Some("first cut".to_string()),
                    created_at: Some("2024-03-02T00:00:00Z".to_string()),
                    microversion: Some("m1".to_string()),
                },
            ],
        )
        .with_thumbnails(
            "doc1",
            vec![
                ThumbnailDescriptor {
                    size: "70x40".to_string(),
                    href: "https://cad.example.com/thumbs/doc1/70x40".to_string(),
                    media_type: Some("image/png".to_string()),
                },
                ThumbnailDescriptor {
                    size: "300x170".to_string(),
                    href: PREVIEW_HREF.to_string(),
                    media_type: None,
                },
            ],
        )
        .with_thumbnail_bytes(PREVIEW_HREF, PNG.to_vec())
}

async fn service(gw: &MockGateway, dir: &Path) -> (SyncService, Arc<FsRecordStore>) {
    let store = Arc::new(FsRecordStore::open(dir).await.unwrap());
    let service = SyncService::new(
        Arc::new(gw.clone()),
        store.clone(),
        AssetStore::new(dir),
        Reconciler::default(),
    );
    (service, store)
}

#[tokio::test]
async fn test_sync_writes_record_and_thumbnail() {
    let dir = tempfile::tempdir().unwrap();
    let gw = gateway();
    let (service, store) = service(&gw, dir.path()).await;

    let outcome = service.sync_document("doc1").await.unwrap();

    assert_eq!(outcome.slug, "meshtastic-case");
    assert!(outcome.degraded.is_empty());
    assert_eq!(
        outcome.thumbnail.as_deref(),
        Some(dir.path().join("thumbnails/doc1.png").as_path())
    );

    let record = store.load("doc1").await.unwrap().unwrap();
    assert_eq!(record.main_workspace_id.as_deref(), Some("ws-main"));
    assert_eq!(record.versions.len(), 1);
    assert_eq!(record.thumbnails.len(), 2);
    // Only the preview size is downloaded.
    assert_eq!(gw.call_count(MockOp::Download), 1);
}

#[tokio::test]
async fn test_resync_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let gw = gateway();
    let (service, _) = service(&gw, dir.path()).await;
    let path = dir.path().join("records/meshtastic-case.json");

    service.sync_document("doc1").await.unwrap();
    let first = fs::read(&path).await.unwrap();
    service.sync_document("doc1").await.unwrap();
    let second = fs::read(&path).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_versions_failure_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let gw = gateway().fail("doc1", MockOp::Versions, MockFailure::Unavailable);
    let (service, store) = service(&gw, dir.path()).await;

    let outcome = service.sync_document("doc1").await.unwrap();
    assert_eq!(outcome.degraded, vec![DataKind::Versions]);

    let record = store.load("doc1").await.unwrap().unwrap();
    assert_eq!(record.title, "Meshtastic Case");
    assert_eq!(record.description, "Meshtastic Case description");
    assert!(record.versions.is_empty());
    assert!(!record.thumbnails.is_empty());
}

#[tokio::test]
async fn test_metadata_failure_aborts_document() {
    let dir = tempfile::tempdir().unwrap();
    let gw = gateway().fail("doc1", MockOp::Document, MockFailure::NotFound);
    let (service, store) = service(&gw, dir.path()).await;

    let err = service.sync_document("doc1").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(store.load("doc1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unauthorized_field_fetch_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let gw = gateway().fail("doc1", MockOp::Thumbnails, MockFailure::Unauthorized);
    let (service, _) = service(&gw, dir.path()).await;

    assert!(service.sync_document("doc1").await.unwrap_err().is_auth());
}

#[tokio::test]
async fn test_thumbnail_download_failure_keeps_record() {
    let dir = tempfile::tempdir().unwrap();
    let gw = gateway().fail(PREVIEW_HREF, MockOp::Download, MockFailure::Unavailable);
    let (service, store) = service(&gw, dir.path()).await;

    let outcome = service.sync_document("doc1").await.unwrap();
    assert!(outcome.thumbnail.is_none());
    assert!(store.load("doc1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_corrupt_prior_record_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let records = dir.path().join("records");
    fs::create_dir_all(&records).await.unwrap();
    fs::write(
        records.join("meshtastic-case.json"),
        r#"{"documentId": "doc1", "versions": 42}"#,
    )
    .await
    .unwrap();

    let gw = gateway();
    let (service, store) = service(&gw, dir.path()).await;

    service.sync_document("doc1").await.unwrap();
    let record = store.load("doc1").await.unwrap().unwrap();
    assert_eq!(record.versions.len(), 1);
}

#[tokio::test]
async fn test_user_edits_survive_resync() {
    let dir = tempfile::tempdir().unwrap();
    let gw = gateway();
    let (service, store) = service(&gw, dir.path()).await;

    service.sync_document("doc1").await.unwrap();
    let mut edited = store.load("doc1").await.unwrap().unwrap();
    edited.user_data.labels = vec!["favorite".to_string()];
    edited
        .user_data
        .extra
        .insert("customNote".to_string(), serde_json::json!("x"));
    store.save("doc1", &edited).await.unwrap();

    service.sync_document("doc1").await.unwrap();
    let record = store.load("doc1").await.unwrap().unwrap();
    assert_eq!(record.labels, vec!["meshtastic", "favorite"]);
    assert_eq!(record.user_data.extra["customNote"], serde_json::json!("x"));
}

#[tokio::test]
async fn test_upload_writes_back_element_id_then_updates() {
    let dir = tempfile::tempdir().unwrap();
    let gw = gateway();
    let (service, store) = service(&gw, dir.path()).await;
    service.sync_document("doc1").await.unwrap();
    service
        .assets()
        .store_pdf("doc1", "meshtastic-case", b"%PDF-1.7", "test")
        .await
        .unwrap();

    let uploader = PdfUploader::new(Arc::new(gw.clone()), store.clone(), service.assets().clone());

    let first = uploader.upload("doc1").await.unwrap();
    assert!(!first.updated);
    assert_eq!(first.workspace_id, "ws-main");
    let record = store.load("doc1").await.unwrap().unwrap();
    assert_eq!(record.user_data.pdf_element_id.as_deref(), Some(first.element_id.as_str()));

    let second = uploader.upload("doc1").await.unwrap();
    assert!(second.updated);
    assert_eq!(second.element_id, first.element_id);

    let uploads = gw.uploads();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].upload.filename, "meshtastic-case.pdf");
    assert_eq!(uploads[1].element_id.as_deref(), Some(first.element_id.as_str()));
}

#[tokio::test]
async fn test_upload_without_pdf_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let gw = gateway();
    let (service, store) = service(&gw, dir.path()).await;
    service.sync_document("doc1").await.unwrap();

    let uploader = PdfUploader::new(Arc::new(gw.clone()), store, service.assets().clone());
    assert!(matches!(
        uploader.upload("doc1").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_gallery_manifest_lists_records() {
    let dir = tempfile::tempdir().unwrap();
    let gw = gateway().with_document("doc2", "Antenna Mount", &[]);
    let (service, store) = service(&gw, dir.path()).await;
    service.sync_document("doc1").await.unwrap();
    service.sync_document("doc2").await.unwrap();

    let path = write_manifest(store.as_ref(), service.assets()).await.unwrap();
    let manifest: serde_json::Value =
        serde_json::from_slice(&fs::read(&path).await.unwrap()).unwrap();

    let docs = manifest["documents"].as_array().unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["title"], "Antenna Mount");
    assert!(docs[0].get("thumbnail").is_none());
    assert_eq!(docs[1]["thumbnail"], "thumbnails/doc1.png");
    assert_eq!(docs[1]["slug"], "meshtastic-case");
}
