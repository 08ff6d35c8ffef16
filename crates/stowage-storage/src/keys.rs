//! Canonical object key construction.
//!
//! Every code path that needs a key — a fresh save, an existence probe,
//! the serve handler, a URL being decoded back into a key — goes through
//! `build_key` so they all converge on one canonical form: segments
//! joined with `/`, no leading slash, the configured prefix applied at
//! most once.

use stowage_core::constants::MAX_FILENAME_BYTES;

use crate::traits::{StorageError, StorageResult};

/// Join a prefix and path segments into a canonical object key.
///
/// Segments are trimmed of surrounding slashes and empty segments are
/// dropped. If the joined suffix already starts with the prefix (as a
/// whole path component) the prefix is not applied again, which makes
/// the function idempotent: re-canonicalizing an existing key is a
/// no-op. The terminal filename component must stay within the filename
/// byte ceiling; an oversized name fails the whole join rather than
/// being truncated.
pub fn build_key<'a, I>(prefix: &str, segments: I) -> StorageResult<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let parts: Vec<&str> = segments
        .into_iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect();
    let suffix = parts.join("/");
    if suffix.is_empty() {
        return Err(StorageError::InvalidKey("no path segments".to_string()));
    }

    if let Some(filename) = suffix.rsplit('/').next() {
        if filename.len() > MAX_FILENAME_BYTES {
            let head: String = filename.chars().take(32).collect();
            return Err(StorageError::InvalidKey(format!(
                "filename exceeds {} bytes: {}…",
                MAX_FILENAME_BYTES, head
            )));
        }
    }

    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() || suffix == prefix || suffix.starts_with(&format!("{}/", prefix)) {
        Ok(suffix)
    } else {
        Ok(format!("{}/{}", prefix, suffix))
    }
}
