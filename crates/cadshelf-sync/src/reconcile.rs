//! The reconciliation engine: merge a fresh remote snapshot with the prior
//! persisted record.
//!
//! API-owned fields are rebuilt from the snapshot every time. Labels are the
//! union of remote and user labels. `userData` is carried forward key by key
//! and never replaced. Unknown root keys from older record formats are moved
//! under `userData`.
//!
//! The merge is pure: defaults come from [`ReconcileConfig`], never from the
//! environment, so the same inputs always yield the same record.

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use cadshelf_core::defaults::{MAIN_WORKSPACE_NAME, PREVIEW_THUMBNAIL_SIZE, SENTINEL_VERSION_NAME};
use cadshelf_core::{
    Author, DocumentRecord, RemoteVersion, RemoteWorkspace, ThumbnailDescriptor, ThumbnailEntry,
    UserData, VersionEntry, LEGACY_TOP_LEVEL_KEYS, RECOGNIZED_TOP_LEVEL_KEYS,
    RECOGNIZED_USER_DATA_KEYS,
};

use crate::snapshot::RemoteSnapshot;

/// Reconciliation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Author assigned to records whose `userData.author` is absent.
    /// Ignored when empty.
    pub default_author: Author,
    /// Version name that is never persisted.
    pub sentinel_version: String,
    /// Workspace name identifying the main workspace when no flag is set.
    pub main_workspace_name: String,
    /// Thumbnail size materialized locally.
    pub preview_size: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            default_author: Author::default(),
            sentinel_version: SENTINEL_VERSION_NAME.to_string(),
            main_workspace_name: MAIN_WORKSPACE_NAME.to_string(),
            preview_size: PREVIEW_THUMBNAIL_SIZE.to_string(),
        }
    }
}

impl ReconcileConfig {
    /// Load from environment variables.
    ///
    /// - `CADSHELF_AUTHOR_NAME`, `CADSHELF_AUTHOR_EMAIL`, `CADSHELF_AUTHOR_WEBSITE`
    /// - `CADSHELF_PREVIEW_SIZE` (default `300x170`)
    pub fn from_env() -> Self {
        let var = |key: &str| {
            std::env::var(key)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let preview_size = std::env::var("CADSHELF_PREVIEW_SIZE")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| PREVIEW_THUMBNAIL_SIZE.to_string());

        Self {
            default_author: Author {
                name: var("CADSHELF_AUTHOR_NAME"),
                email: var("CADSHELF_AUTHOR_EMAIL"),
                website: var("CADSHELF_AUTHOR_WEBSITE"),
            },
            preview_size,
            ..Self::default()
        }
    }

    pub fn with_default_author(mut self, author: Author) -> Self {
        self.default_author = author;
        self
    }

    pub fn with_preview_size(mut self, size: impl Into<String>) -> Self {
        self.preview_size = size.into();
        self
    }
}

/// Merges remote snapshots into persisted records.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Produce the record to persist for `snapshot`, given the prior record
    /// if one exists.
    pub fn reconcile(
        &self,
        snapshot: &RemoteSnapshot,
        prior: Option<&DocumentRecord>,
    ) -> DocumentRecord {
        let doc = &snapshot.document;
        // Identity is fixed by the first sync.
        let document_id = prior.map_or_else(|| doc.id.clone(), |p| p.document_id.clone());
        let mut record = DocumentRecord::new(document_id);

        record.title = doc.name.clone();
        record.description = doc.description.clone().unwrap_or_default();
        record.created_at = doc.created_at.clone();
        record.main_workspace_id = self.main_workspace(&snapshot.workspaces);
        record.versions = self.versions(&snapshot.versions);
        record.thumbnails = snapshot.thumbnails.iter().map(thumbnail_entry).collect();

        record.user_data = match prior {
            Some(prior) => carry_user_data(prior),
            None => UserData::default(),
        };
        if record.user_data.author.is_none() && !self.config.default_author.is_empty() {
            record.user_data.author = Some(self.config.default_author.clone());
        }

        record.labels = union_labels(&doc.labels, &record.user_data.labels);

        debug!(
            document_id = %record.document_id,
            versions = record.versions.len(),
            thumbnails = record.thumbnails.len(),
            labels = record.labels.len(),
            had_prior = prior.is_some(),
            "Record reconciled"
        );
        record
    }

    /// The descriptor of the canonical preview thumbnail, if offered.
    pub fn preview_descriptor<'a>(
        &self,
        snapshot: &'a RemoteSnapshot,
    ) -> Option<&'a ThumbnailDescriptor> {
        snapshot
            .thumbnails
            .iter()
            .find(|t| t.size == self.config.preview_size)
    }

    fn main_workspace(&self, workspaces: &[RemoteWorkspace]) -> Option<String> {
        workspaces
            .iter()
            .find(|w| w.is_main)
            .or_else(|| {
                workspaces
                    .iter()
                    .find(|w| w.name == self.config.main_workspace_name)
            })
            .map(|w| w.id.clone())
    }

    fn versions(&self, versions: &[RemoteVersion]) -> Vec<VersionEntry> {
        versions
            .iter()
            .filter(|v| v.name != self.config.sentinel_version)
            .map(|v| VersionEntry {
                id: v.id.clone(),
                name: v.name.clone(),
                description: v.description.clone().unwrap_or_default(),
                created_at: v.created_at.clone(),
                microversion: v.microversion.clone(),
            })
            .collect()
    }
}

fn thumbnail_entry(descriptor: &ThumbnailDescriptor) -> ThumbnailEntry {
    let (width, height) = match descriptor.dimensions() {
        Some((w, h)) => (Some(w), Some(h)),
        None => (None, None),
    };
    ThumbnailEntry {
        size: descriptor.size.clone(),
        url: descriptor.href.clone(),
        width,
        height,
        media_type: descriptor.media_type.clone(),
    }
}

/// Remote labels first, then user labels not already present. First
/// occurrence wins.
fn union_labels(remote: &[String], user: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(remote.len() + user.len());
    for label in remote.iter().chain(user) {
        if !out.contains(label) {
            out.push(label.clone());
        }
    }
    out
}

/// Prior `userData`, plus root keys from older formats moved under it.
/// Existing `userData` values always win over migrated ones.
fn carry_user_data(prior: &DocumentRecord) -> UserData {
    let mut user_data = prior.user_data.clone();

    for (key, value) in &prior.extra {
        let key = key.as_str();
        if RECOGNIZED_TOP_LEVEL_KEYS.contains(&key) {
            continue;
        }
        if LEGACY_TOP_LEVEL_KEYS.contains(&key) || RECOGNIZED_USER_DATA_KEYS.contains(&key) {
            seed_typed(&mut user_data, key, value);
        } else {
            user_data
                .extra
                .entry(key.to_string())
                .or_insert_with(|| value.clone());
        }
    }
    user_data
}

/// Root keys that map onto typed `userData` fields fill them only if unset.
/// A value that cannot fill its slot is kept under a `legacy*` key.
fn seed_typed(user_data: &mut UserData, key: &str, value: &JsonValue) {
    match key {
        "workspaceId" => seed_id(&mut user_data.workspace_id, &mut user_data.extra, key, value),
        "elementId" => seed_id(&mut user_data.element_id, &mut user_data.extra, key, value),
        "pdfElementId" => {
            seed_id(&mut user_data.pdf_element_id, &mut user_data.extra, key, value)
        }
        "author" => match coerce_author(value) {
            Some(author) if user_data.author.is_none() => user_data.author = Some(author),
            Some(author) if user_data.author.as_ref() == Some(&author) => {}
            _ => park(&mut user_data.extra, key, value),
        },
        _ => park(&mut user_data.extra, key, value),
    }
}

fn seed_id(
    slot: &mut Option<String>,
    extra: &mut Map<String, JsonValue>,
    key: &str,
    value: &JsonValue,
) {
    let id = match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    };
    match id {
        Some(id) if slot.is_none() => *slot = Some(id),
        Some(id) if slot.as_deref() == Some(id.as_str()) => {}
        _ => park(extra, key, value),
    }
}

fn coerce_author(value: &JsonValue) -> Option<Author> {
    match value {
        JsonValue::String(name) if !name.is_empty() => Some(Author {
            name: name.clone(),
            ..Author::default()
        }),
        JsonValue::Object(_) => serde_json::from_value(value.clone()).ok(),
        _ => None,
    }
}

/// Keep a root value that has no typed home under `legacy{Key}`, so it
/// never shadows a typed `userData` field on the next read.
fn park(extra: &mut Map<String, JsonValue>, key: &str, value: &JsonValue) {
    if value.is_null() {
        return;
    }
    let legacy_key = legacy_key(key);
    warn!(key, legacy_key = %legacy_key, "Keeping unmapped legacy root key under a new name");
    extra
        .entry(legacy_key)
        .or_insert_with(|| value.clone());
}

fn legacy_key(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => format!("legacy{}{}", first.to_uppercase(), chars.as_str()),
        None => "legacy".to_string(),
    }
}
