//! Persisted record types.
//!
//! A [`DocumentRecord`] is the unit of persistence: one JSON file per remote
//! document. API-owned fields are rebuilt on every sync; [`UserData`] is
//! user-owned and carried forward, including keys this crate does not know.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Top-level record keys the reconciler understands. Anything else found at
/// the root of a prior record is migrated into `userData`.
pub const RECOGNIZED_TOP_LEVEL_KEYS: &[&str] = &[
    "documentId",
    "title",
    "description",
    "createdAt",
    "mainWorkspaceId",
    "versions",
    "thumbnails",
    "labels",
    "userData",
];

/// Top-level keys written by older versions of the record format. They seed
/// the matching `userData` entries instead of being passed through.
pub const LEGACY_TOP_LEVEL_KEYS: &[&str] = &["workspaceId", "elementId"];

/// `userData` keys with typed fields on [`UserData`].
pub const RECOGNIZED_USER_DATA_KEYS: &[&str] =
    &["workspaceId", "elementId", "pdfElementId", "author", "labels"];

/// The independently fetched kinds of remote data for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Metadata,
    Workspaces,
    Versions,
    Thumbnails,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Workspaces => "workspaces",
            Self::Versions => "versions",
            Self::Thumbnails => "thumbnails",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribution shown in the gallery and on the generated PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: String,
}

impl Author {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.email.is_empty() && self.website.is_empty()
    }
}

/// One named revision of a document, excluding the initial "Start" revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub microversion: Option<String>,
}

/// Pointer to a remote thumbnail rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailEntry {
    pub size: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// User-owned part of a record. Never replaced wholesale by sync.
///
/// Unknown keys land in `extra` and are written back unchanged, so callers
/// can annotate records freely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    /// Element id of the uploaded PDF. Written by the upload workflow only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_element_id: Option<String>,
    /// Labels added locally, distinct from remote labels.
    #[serde(default, deserialize_with = "deserialize_label_names")]
    pub labels: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// The locally persisted representation of one remote document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub document_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_workspace_id: Option<String>,
    #[serde(default)]
    pub versions: Vec<VersionEntry>,
    #[serde(default)]
    pub thumbnails: Vec<ThumbnailEntry>,
    #[serde(default, deserialize_with = "deserialize_label_names")]
    pub labels: Vec<String>,
    #[serde(default)]
    pub user_data: UserData,
    /// Root-level keys outside the known schema. Empty on every record the
    /// reconciler produces; populated only when reading older files.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl DocumentRecord {
    /// Empty record for a document that has never been synced.
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            title: String::new(),
            description: String::new(),
            created_at: None,
            main_workspace_id: None,
            versions: Vec::new(),
            thumbnails: Vec::new(),
            labels: Vec::new(),
            user_data: UserData::default(),
            extra: Map::new(),
        }
    }

    /// Workspace that uploads target: the user's pinned workspace, else main.
    pub fn target_workspace_id(&self) -> Option<&str> {
        self.user_data
            .workspace_id
            .as_deref()
            .or(self.main_workspace_id.as_deref())
    }

    /// Thumbnail entry for the given size, if the record lists one.
    pub fn thumbnail(&self, size: &str) -> Option<&ThumbnailEntry> {
        self.thumbnails.iter().find(|t| t.size == size)
    }

    /// Serialize in the canonical on-disk form (pretty JSON, trailing newline).
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelRepr {
    Name(String),
    Object { name: String },
}

impl LabelRepr {
    fn into_name(self) -> String {
        match self {
            Self::Name(name) | Self::Object { name } => name,
        }
    }
}

/// Accept labels stored as plain names or as `{"name": ...}` objects.
pub fn deserialize_label_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<LabelRepr>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(LabelRepr::into_name)
        .collect())
}
