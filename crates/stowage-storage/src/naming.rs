//! Unique-name collaborator.
//!
//! Collision-free naming is its own concern, deliberately outside the
//! key canonicalization core: it only talks to the adapter through
//! `exists`. The probe order — bare name first, then `-1`, `-2`, … —
//! lives here and nowhere else.

use std::future::Future;
use std::path::Path;

use chrono::Utc;
use stowage_core::constants::MAX_FILENAME_BYTES;

use crate::traits::{StorageError, StorageResult};

const MAX_UNIQUE_ATTEMPTS: u32 = 99;

/// Date-based target directory used when the host passes none:
/// `{prefix}/{YYYY}/{MM}`.
pub fn target_dir(prefix: &str) -> String {
    let date_part = Utc::now().format("%Y/%m").to_string();
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        date_part
    } else {
        format!("{}/{}", prefix, date_part)
    }
}

/// Reduce an incoming filename to its base name and replace anything
/// outside word characters, `@`, `.` and `-` with a dash.
pub fn sanitized_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Find a filename not yet taken, probing `exists` (already scoped to
/// the target directory by the caller) with numbered suffixes. The
/// sanitized base name must fit the filename byte ceiling; oversized
/// names fail instead of being truncated.
pub async fn unique_object_name<F, Fut>(
    filename: &str,
    mut exists: F,
) -> StorageResult<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = StorageResult<bool>>,
{
    let sanitized = sanitized_filename(filename);
    if sanitized.is_empty() {
        return Err(StorageError::InvalidKey("empty filename".to_string()));
    }
    if sanitized.len() > MAX_FILENAME_BYTES {
        return Err(StorageError::InvalidKey(format!(
            "filename exceeds {} bytes",
            MAX_FILENAME_BYTES
        )));
    }

    let path = Path::new(&sanitized);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&sanitized)
        .to_string();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let mut candidate = sanitized.clone();
    for attempt in 1..=MAX_UNIQUE_ATTEMPTS {
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
        candidate = format!("{}-{}{}", stem, attempt, extension);
    }

    Err(StorageError::InvalidKey(format!(
        "no free name for {} after {} attempts",
        sanitized, MAX_UNIQUE_ATTEMPTS
    )))
}
