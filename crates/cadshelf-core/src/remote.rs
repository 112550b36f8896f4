//! Types exchanged with the remote document gateway.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::deserialize_label_names;

/// Core document metadata. The only fetch whose failure aborts a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_label_names")]
    pub labels: Vec<String>,
}

/// A mutable editing branch of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWorkspace {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default, rename = "type")]
    pub workspace_type: Option<String>,
}

/// An immutable named snapshot of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVersion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub microversion: Option<String>,
}

/// Where a thumbnail rendering of a given size can be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailDescriptor {
    pub size: String,
    #[serde(alias = "url")]
    pub href: String,
    #[serde(default)]
    pub media_type: Option<String>,
}

impl ThumbnailDescriptor {
    /// Pixel dimensions parsed from a `WIDTHxHEIGHT` size name.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let (w, h) = self.size.split_once('x')?;
        Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
    }
}

/// One entry of a document listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_label_names")]
    pub labels: Vec<String>,
}

impl DocumentSummary {
    /// Case-insensitive label membership.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}

/// A page of listing results plus the pointer to the next page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPage {
    #[serde(default)]
    pub items: Vec<DocumentSummary>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Listing filter categories understood by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentFilter {
    OwnedByMe,
    Created,
    Shared,
    Trash,
    Public,
    Recent,
}

impl DocumentFilter {
    /// Numeric code the listing endpoint expects.
    pub fn code(&self) -> u8 {
        match self {
            Self::OwnedByMe => 0,
            Self::Created => 1,
            Self::Shared => 2,
            Self::Trash => 3,
            Self::Public => 4,
            Self::Recent => 5,
        }
    }
}

impl FromStr for DocumentFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owned" | "owned-by-me" | "mine" => Ok(Self::OwnedByMe),
            "created" => Ok(Self::Created),
            "shared" => Ok(Self::Shared),
            "trash" => Ok(Self::Trash),
            "public" => Ok(Self::Public),
            "recent" => Ok(Self::Recent),
            _ => Err(Error::InvalidInput(format!("Unknown document filter: {}", s))),
        }
    }
}

impl fmt::Display for DocumentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OwnedByMe => "owned-by-me",
            Self::Created => "created",
            Self::Shared => "shared",
            Self::Trash => "trash",
            Self::Public => "public",
            Self::Recent => "recent",
        };
        f.write_str(name)
    }
}

/// Sort direction for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(Error::InvalidInput(format!("Unknown sort order: {}", s))),
        }
    }
}

/// Parameters for one listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: Option<DocumentFilter>,
    /// Free-text search.
    pub query: Option<String>,
    /// Column to sort by: "name", "modifiedAt", "createdAt"
    pub sort_column: Option<String>,
    pub sort_order: Option<SortOrder>,
    /// Page size; the gateway default applies when `None`.
    pub limit: Option<u32>,
}

impl ListQuery {
    /// The same query with filter and search text removed.
    pub fn unfiltered(&self) -> Self {
        Self {
            filter: None,
            query: None,
            ..self.clone()
        }
    }
}

/// A file to store as a blob element in a document workspace.
#[derive(Debug, Clone)]
pub struct AssetUpload {
    pub document_id: String,
    pub workspace_id: String,
    pub filename: String,
    pub display_name: Option<String>,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Element created or updated by an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    pub id: String,
    #[serde(default)]
    pub href: Option<String>,
}
