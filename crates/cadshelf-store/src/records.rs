//! JSON file record store.
//!
//! Each record lives at `records/{slug}.json`. The slug is derived from the
//! title, but the store is keyed by the `documentId` read from each file, so
//! two documents with the same title never share a file and a renamed
//! document keeps its history.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use cadshelf_core::defaults::RECORDS_DIR;
use cadshelf_core::{DocumentRecord, Error, RecordStore, Result};

use crate::fs::{remove_if_exists, write_atomic};
use crate::slug::{collision_slug, escaped_id, slugify, storage_slug};

const RECORD_EXTENSION: &str = "json";

#[derive(Default)]
struct RecordIndex {
    /// documentId -> file stem
    by_id: HashMap<String, String>,
    /// Stems of files whose owner could not be determined. Never overwritten.
    orphans: HashSet<String>,
}

impl RecordIndex {
    fn is_taken(&self, stem: &str, document_id: &str) -> bool {
        self.orphans.contains(stem)
            || self
                .by_id
                .iter()
                .any(|(id, s)| s == stem && id != document_id)
    }

    fn choose_stem(&self, record: &DocumentRecord) -> String {
        let id = record.document_id.as_str();
        let preferred = storage_slug(&record.title, id);
        if !self.is_taken(&preferred, id) {
            return preferred;
        }
        let candidates = [collision_slug(&preferred, id), slugify(id), escaped_id(id)];
        if let Some(stem) = candidates
            .into_iter()
            .find(|s| !s.trim_matches('-').is_empty() && !self.is_taken(s, id))
        {
            return stem;
        }
        let escaped = escaped_id(id);
        (2..)
            .map(|n| format!("{}-{}", escaped, n))
            .find(|s| !self.is_taken(s, id))
            .unwrap_or(escaped)
    }
}

/// Filesystem-backed [`RecordStore`].
pub struct FsRecordStore {
    dir: PathBuf,
    index: RwLock<RecordIndex>,
}

impl FsRecordStore {
    /// Open the store rooted at `data_dir`, creating `records/` if needed and
    /// indexing existing files by their `documentId`.
    #[instrument(skip_all, fields(subsystem = "store", component = "records", op = "open"))]
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref().join(RECORDS_DIR);
        fs::create_dir_all(&dir).await?;

        let index = scan(&dir).await?;
        info!(
            path = %dir.display(),
            result_count = index.by_id.len(),
            orphans = index.orphans.len(),
            "Record store opened"
        );

        Ok(Self {
            dir,
            index: RwLock::new(index),
        })
    }

    /// Directory holding the record files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", stem, RECORD_EXTENSION))
    }
}

/// Index every `*.json` file in `dir` by the `documentId` it contains.
async fn scan(dir: &Path) -> Result<RecordIndex> {
    let mut stems = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            stems.push(stem.to_string());
        }
    }
    // Deterministic winner when two files claim the same id.
    stems.sort();

    let mut index = RecordIndex::default();
    for stem in stems {
        let path = dir.join(format!("{}.{}", stem, RECORD_EXTENSION));
        match read_document_id(&path).await {
            Some(id) if !index.by_id.contains_key(&id) => {
                index.by_id.insert(id, stem);
            }
            Some(id) => {
                warn!(document_id = %id, path = %path.display(), "Duplicate record for document, ignoring file");
                index.orphans.insert(stem);
            }
            None => {
                warn!(path = %path.display(), "Record file has no readable documentId");
                index.orphans.insert(stem);
            }
        }
    }
    Ok(index)
}

/// Read just the identity key, tolerating records that fail the typed parse.
async fn read_document_id(path: &Path) -> Option<String> {
    let raw = fs::read(path).await.ok()?;
    let value: serde_json::Value = serde_json::from_slice(&raw).ok()?;
    value
        .get("documentId")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

async fn read_record(path: &Path) -> Result<DocumentRecord> {
    let raw = fs::read(path).await?;
    serde_json::from_slice(&raw).map_err(|e| Error::LocalStoreCorrupt {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn load(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        let stem = match self.index.read().await.by_id.get(document_id) {
            Some(stem) => stem.clone(),
            None => return Ok(None),
        };
        let path = self.path_for(&stem);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        read_record(&path).await.map(Some)
    }

    #[instrument(skip(self, record), fields(subsystem = "store", component = "records", op = "save"))]
    async fn save(&self, document_id: &str, record: &DocumentRecord) -> Result<()> {
        if record.document_id != document_id {
            return Err(Error::InvalidInput(format!(
                "Record id {} does not match key {}",
                record.document_id, document_id
            )));
        }

        let mut index = self.index.write().await;
        let stem = index.choose_stem(record);
        let previous = index.by_id.get(document_id).cloned();

        let json = record.to_json_pretty()?;
        write_atomic(&self.path_for(&stem), json.as_bytes()).await?;

        if let Some(old) = previous.filter(|old| *old != stem) {
            remove_if_exists(&self.path_for(&old)).await?;
            info!(from = %old, to = %stem, "Record renamed");
        }
        index.by_id.insert(document_id.to_string(), stem.clone());

        debug!(slug = %stem, size_bytes = json.len(), "Record saved");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<DocumentRecord>> {
        let mut stems: Vec<String> = self.index.read().await.by_id.values().cloned().collect();
        stems.sort();

        let mut records = Vec::with_capacity(stems.len());
        for stem in stems {
            let path = self.path_for(&stem);
            match read_record(&path).await {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }
        Ok(records)
    }

    async fn slug_of(&self, document_id: &str) -> Result<Option<String>> {
        Ok(self.index.read().await.by_id.get(document_id).cloned())
    }
}
