//! OCI config-file profiles.
//!
//! The classic `~/.oci/config` is an INI file of named profiles, each
//! carrying the key-pair fields plus a `key_file` path. Only the keys
//! the adapter needs are read; unknown keys are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use stowage_core::constants::DEFAULT_CONFIG_FILE;

use crate::traits::{StorageError, StorageResult};

/// One parsed profile. Field completeness is checked by the resolver,
/// not here.
#[derive(Clone, Debug, Default)]
pub struct Profile {
    pub tenancy: Option<String>,
    pub user: Option<String>,
    pub fingerprint: Option<String>,
    pub key_file: Option<PathBuf>,
    pub pass_phrase: Option<String>,
    pub region: Option<String>,
}

/// Location of the default config file, when a home directory exists.
pub fn default_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(DEFAULT_CONFIG_FILE))
}

/// Expand a leading `~/` against `$HOME`, the way the config file's
/// `key_file` entries are conventionally written.
pub fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

pub fn load_profile(path: &Path, profile: &str) -> StorageResult<Profile> {
    let text = fs::read_to_string(path).map_err(|e| {
        StorageError::AuthResolution(format!("cannot read config file {}: {}", path.display(), e))
    })?;
    parse_profile(&text, profile).ok_or_else(|| {
        StorageError::AuthResolution(format!(
            "profile [{}] not found in {}",
            profile,
            path.display()
        ))
    })
}

fn parse_profile(text: &str, profile: &str) -> Option<Profile> {
    let mut in_profile = false;
    let mut found = false;
    let mut out = Profile::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_profile = section.trim() == profile;
            found |= in_profile;
            continue;
        }
        if !in_profile {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "tenancy" => out.tenancy = Some(value),
                "user" => out.user = Some(value),
                "fingerprint" => out.fingerprint = Some(value),
                "key_file" => out.key_file = Some(PathBuf::from(value)),
                "pass_phrase" => out.pass_phrase = Some(value),
                "region" => out.region = Some(value),
                _ => {}
            }
        }
    }

    found.then_some(out)
}
