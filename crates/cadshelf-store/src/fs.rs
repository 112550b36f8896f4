//! Atomic file writes.

use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use cadshelf_core::Result;

/// Write `data` to `path` via a temp file and rename, creating parent
/// directories as needed. Readers never observe a half-written file.
pub async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    debug!(path = %path.display(), size_bytes = data.len(), "store: write");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            warn!(parent = %parent.display(), error = %e, "store: create_dir_all failed");
            e
        })?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).await.map_err(|e| {
        warn!(temp_path = %temp_path.display(), error = %e, "store: File::create failed");
        e
    })?;
    file.write_all(data).await.map_err(|e| {
        warn!(error = %e, "store: write_all failed");
        e
    })?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path).await.map_err(|e| {
        warn!(from = %temp_path.display(), to = %path.display(), error = %e, "store: rename failed");
        e
    })?;

    // rw-r--r--, no execute
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await?;
    }

    Ok(())
}

/// Remove a file if it exists.
pub async fn remove_if_exists(path: &Path) -> Result<()> {
    if fs::try_exists(path).await? {
        fs::remove_file(path).await?;
    }
    Ok(())
}
