//! Filesystem-safe names derived from document titles.

use once_cell::sync::Lazy;
use regex::Regex;

use cadshelf_core::defaults::SLUG_COLLISION_SUFFIX_LEN;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9-]").unwrap());

/// Lowercase, replace whitespace runs with one hyphen, drop anything outside
/// `[a-z0-9-]`.
///
/// ```
/// use cadshelf_store::slugify;
///
/// assert_eq!(slugify("Meshtastic Case (v2)"), "meshtastic-case-v2");
/// ```
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let hyphenated = WHITESPACE_RUN.replace_all(&lower, "-");
    DISALLOWED.replace_all(&hyphenated, "").into_owned()
}

/// Slug used as a storage key. Falls back to the document id when the title
/// has no usable characters.
pub fn storage_slug(title: &str, document_id: &str) -> String {
    let slug = slugify(title);
    if !slug.trim_matches('-').is_empty() {
        return slug;
    }
    let id_slug = slugify(document_id);
    if id_slug.trim_matches('-').is_empty() {
        escaped_id(document_id)
    } else {
        id_slug
    }
}

/// Hex-escaped document id. Never empty and distinct for distinct ids.
pub fn escaped_id(document_id: &str) -> String {
    let hex: String = document_id.bytes().map(|b| format!("{:02x}", b)).collect();
    format!("doc-{}", hex)
}

/// Disambiguated slug for a document whose preferred slug is taken.
pub fn collision_slug(slug: &str, document_id: &str) -> String {
    let suffix: String = slugify(document_id)
        .chars()
        .take(SLUG_COLLISION_SUFFIX_LEN)
        .collect();
    format!("{}-{}", slug, suffix)
}
