//! Centralized default constants for cadshelf.
//!
//! All crates reference these constants instead of defining their own
//! magic numbers. Organized by domain area.

// =============================================================================
// REMOTE API
// =============================================================================

/// Default base URL of the remote document service REST API.
pub const API_URL: &str = "https://cad.onshape.com/api/v6";

/// HTTP request timeout (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Retries for transient upstream failures (429, 5xx, network).
pub const HTTP_MAX_RETRIES: u32 = 2;

/// Base backoff between retries (milliseconds), multiplied by attempt number.
pub const HTTP_RETRY_BACKOFF_MS: u64 = 500;

/// Page size requested from the document listing endpoint.
pub const LIST_PAGE_SIZE: u32 = 20;

// =============================================================================
// RECONCILIATION
// =============================================================================

/// Name of the initial revision every document is created with.
pub const SENTINEL_VERSION_NAME: &str = "Start";

/// Name that marks the main workspace of a document.
pub const MAIN_WORKSPACE_NAME: &str = "Main";

/// Thumbnail size materialized to local storage.
pub const PREVIEW_THUMBNAIL_SIZE: &str = "300x170";

/// Media type assumed for thumbnails when neither descriptor nor bytes say.
pub const THUMBNAIL_MEDIA_TYPE: &str = "image/png";

// =============================================================================
// STORAGE
// =============================================================================

/// Default root directory for records and assets.
pub const DATA_DIR: &str = "./data";

/// Subdirectory holding one JSON record per document.
pub const RECORDS_DIR: &str = "records";

/// Subdirectory holding materialized preview thumbnails.
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// Subdirectory holding rendered PDFs.
pub const PDFS_DIR: &str = "pdfs";

/// Gallery manifest file name, written at the data root.
pub const GALLERY_MANIFEST: &str = "gallery.json";

/// Number of document id characters appended to a colliding slug.
pub const SLUG_COLLISION_SUFFIX_LEN: usize = 8;

// =============================================================================
// BATCH / PDF
// =============================================================================

/// Delay between successive uploads in a batch (milliseconds).
pub const UPLOAD_DELAY_MS: u64 = 2000;

/// Timeout for the external PDF typesetting command (seconds).
pub const PDF_TIMEOUT_SECS: u64 = 120;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_size_is_width_by_height() {
        let (w, h) = PREVIEW_THUMBNAIL_SIZE.split_once('x').unwrap();
        assert!(w.parse::<u32>().is_ok());
        assert!(h.parse::<u32>().is_ok());
    }

    #[test]
    fn test_api_url_is_https() {
        assert!(API_URL.starts_with("https://"));
    }
}
