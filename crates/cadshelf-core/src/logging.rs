//! Structured logging schema and field name constants for cadshelf.
//!
//! Every crate logs with these field names so a JSON log stream can be
//! filtered by document or field without re-running with verbose tracing.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Document failed, batch aborted, credentials rejected |
//! | WARN  | Field downgraded to empty, corrupt record ignored, asset not written |
//! | INFO  | Document synced, batch summary, upload completed |
//! | DEBUG | HTTP calls, merge decisions, skipped unchanged assets |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "gateway", "store", "sync"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "http", "records", "snapshot", "service", "batch", "render"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "get_document", "list_documents", "sync_document", "upload_pdf"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Remote document identifier.
pub const DOCUMENT_ID: &str = "document_id";

/// Human-readable document name (title).
pub const DOCUMENT_NAME: &str = "document_name";

/// Record field affected by a partial failure ("workspaces", "versions", ...).
pub const FIELD: &str = "field";

/// Slug used for the record file name.
pub const SLUG: &str = "slug";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Number of items returned or processed.
pub const RESULT_COUNT: &str = "result_count";

/// Byte length of a downloaded or uploaded asset.
pub const SIZE_BYTES: &str = "size_bytes";

/// Retry attempt number (1-based).
pub const ATTEMPT: &str = "attempt";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[&str] = &[
        SUBSYSTEM,
        COMPONENT,
        OPERATION,
        DOCUMENT_ID,
        DOCUMENT_NAME,
        FIELD,
        SLUG,
        RESULT_COUNT,
        SIZE_BYTES,
        ATTEMPT,
        ERROR_MSG,
    ];

    #[test]
    fn test_field_names_are_snake_case() {
        for name in ALL {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{} is not snake_case",
                name
            );
        }
    }

    #[test]
    fn test_field_names_are_unique() {
        let mut names = ALL.to_vec();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ALL.len());
    }
}
