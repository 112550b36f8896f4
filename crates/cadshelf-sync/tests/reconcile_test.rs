//! Merge properties of the reconciliation engine.

use cadshelf_core::{
    DocumentRecord, RemoteDocument, RemoteVersion, RemoteWorkspace, ThumbnailDescriptor,
};
use cadshelf_sync::{Reconciler, RemoteSnapshot};
use serde_json::json;

fn version(id: &str, name: &str) -> RemoteVersion {
    RemoteVersion {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(format!("{} notes", name)),
        created_at: Some("2024-02-01T00:00:00Z".to_string()),
        microversion: Some(format!("m-{}", id)),
    }
}

fn full_snapshot() -> RemoteSnapshot {
    let mut snap = RemoteSnapshot::from_document(RemoteDocument {
        id: "doc1".to_string(),
        name: "Meshtastic Case".to_string(),
        description: Some("Enclosure for a T-Beam".to_string()),
        created_at: Some("2024-01-15T12:00:00.000+00:00".to_string()),
        labels: vec!["meshtastic".to_string()],
    });
    snap.workspaces = vec![RemoteWorkspace {
        id: "ws-main".to_string(),
        name: "Main".to_string(),
        is_main: true,
        workspace_type: Some("workspace".to_string()),
    }];
    snap.versions = vec![version("v0", "Start"), version("v1", "V1")];
    snap.thumbnails = vec![ThumbnailDescriptor {
        size: "300x170".to_string(),
        href: "https://cad.example.com/thumbs/doc1/300x170".to_string(),
        media_type: Some("image/png".to_string()),
    }];
    snap
}

fn prior(value: serde_json::Value) -> DocumentRecord {
    serde_json::from_value(value).expect("valid prior record")
}

#[test]
fn test_reconcile_is_idempotent() {
    let reconciler = Reconciler::default();
    let snap = full_snapshot();
    let seed = prior(json!({
        "documentId": "doc1",
        "notes": "abc",
        "userData": {"labels": [{"name": "favorite"}], "customNote": "x"}
    }));

    let first = reconciler.reconcile(&snap, Some(&seed));
    let second = reconciler.reconcile(&snap, Some(&first));

    assert_eq!(
        first.to_json_pretty().unwrap(),
        second.to_json_pretty().unwrap()
    );
}

#[test]
fn test_user_labels_are_preserved_and_merged() {
    let mut snap = full_snapshot();
    snap.document.labels = vec!["meshtastic".to_string()];
    let seed = prior(json!({
        "documentId": "doc1",
        "labels": ["meshtastic", "stale-remote"],
        "userData": {"labels": ["favorite"]}
    }));

    let record = Reconciler::default().reconcile(&snap, Some(&seed));

    assert_eq!(record.labels, vec!["meshtastic", "favorite"]);
    assert_eq!(record.user_data.labels, vec!["favorite"]);
}

#[test]
fn test_unknown_user_data_passes_through() {
    let seed = prior(json!({
        "documentId": "doc1",
        "userData": {"customNote": "x", "rating": {"stars": 5}}
    }));

    let record = Reconciler::default().reconcile(&full_snapshot(), Some(&seed));
    let value = serde_json::to_value(&record).unwrap();

    assert_eq!(value["userData"]["customNote"], json!("x"));
    assert_eq!(value["userData"]["rating"], json!({"stars": 5}));
}

#[test]
fn test_start_version_is_excluded() {
    let record = Reconciler::default().reconcile(&full_snapshot(), None);

    assert_eq!(record.versions.len(), 1);
    assert_eq!(record.versions[0].name, "V1");
    assert_eq!(record.versions[0].description, "V1 notes");
    assert_eq!(record.versions[0].microversion.as_deref(), Some("m-v1"));
}

#[test]
fn test_failed_fields_fall_back_to_empty_not_prior() {
    let mut snap = full_snapshot();
    snap.versions.clear();
    snap.workspaces.clear();
    let seed = prior(json!({
        "documentId": "doc1",
        "mainWorkspaceId": "old-ws",
        "versions": [{"id": "v9", "name": "Old"}]
    }));

    let record = Reconciler::default().reconcile(&snap, Some(&seed));

    assert_eq!(record.title, "Meshtastic Case");
    assert!(record.versions.is_empty());
    assert!(record.main_workspace_id.is_none());
}

#[test]
fn test_legacy_top_level_keys_move_to_user_data() {
    let seed = prior(json!({
        "documentId": "doc1",
        "title": "Old title",
        "notes": "abc",
        "workspaceId": "ws-legacy"
    }));

    let record = Reconciler::default().reconcile(&full_snapshot(), Some(&seed));
    let value = serde_json::to_value(&record).unwrap();

    assert_eq!(value["userData"]["notes"], json!("abc"));
    assert_eq!(value["userData"]["workspaceId"], json!("ws-legacy"));
    assert!(value.get("notes").is_none());
    assert!(value.get("workspaceId").is_none());
    assert_eq!(value["title"], json!("Meshtastic Case"));
}

#[test]
fn test_document_id_is_stable() {
    let mut snap = full_snapshot();
    snap.document.id = "doc1-alias".to_string();
    let seed = prior(json!({"documentId": "doc1"}));

    let record = Reconciler::default().reconcile(&snap, Some(&seed));
    assert_eq!(record.document_id, "doc1");
}

#[test]
fn test_created_at_is_verbatim() {
    let record = Reconciler::default().reconcile(&full_snapshot(), None);
    assert_eq!(
        record.created_at.as_deref(),
        Some("2024-01-15T12:00:00.000+00:00")
    );
}
