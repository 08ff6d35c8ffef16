//! Storage abstraction trait
//!
//! This module defines the provider contract the CMS host consumes and
//! the error taxonomy shared by every component of the adapter.

use async_trait::async_trait;
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// No credential strategy could be selected, or the selected one
    /// failed to produce signing material.
    #[error("credential resolution failed: {0}")]
    AuthResolution(String),

    #[error("object not found: {0}")]
    NotFound(String),

    /// Retryable backend failure: 5xx, 429 or a transport-level error
    /// (`status` is `None` for the latter).
    #[error("transient object storage failure (status {status:?}): {message}")]
    Transient { status: Option<u16>, message: String },

    /// Non-retryable backend failure, any 4xx other than 404 and 429.
    #[error("object storage rejected the request (status {status}): {message}")]
    Permanent { status: u16, message: String },

    /// A URL handed to `read` does not belong to this adapter's host.
    #[error("location not managed by this adapter: {0}")]
    ConfigMismatch(String),

    #[error("malformed asset location: {0}")]
    InvalidLocation(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Local asset source could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// An asset handed to `save`: the filename it should be stored under,
/// the local path its bytes are read from, and its declared media type.
#[derive(Clone, Debug)]
pub struct Asset {
    pub name: String,
    pub source: PathBuf,
    pub content_type: Option<String>,
}

/// Options for `read`. `path` is a public URL previously returned by
/// `save` on an adapter configured for the same host.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    pub path: String,
}

/// Provider contract consumed by the CMS host.
///
/// All operations are independent and asynchronous; the only state
/// shared between calls is the immutable resolved configuration and the
/// cached client handle.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Check whether an object exists under `target_dir`.
    ///
    /// A definitive not-found maps to `Ok(false)`; every other backend
    /// failure propagates.
    async fn exists(&self, filename: &str, target_dir: &str) -> StorageResult<bool>;

    /// Upload an asset and return its public URL.
    ///
    /// A collision-free name and the asset bytes are both resolved
    /// before the upload is attempted; either failure aborts the whole
    /// operation with no partial write. When `target_dir` is `None` a
    /// date-based directory under the configured prefix is used.
    async fn save(&self, asset: &Asset, target_dir: Option<&str>) -> StorageResult<String>;

    /// Build a request handler that streams objects keyed by request
    /// path. Backend failures map to a not-found response.
    fn serve(self: Arc<Self>) -> Router;

    /// Delete an object. Soft-failure contract: any outcome other than
    /// explicit success — including legitimate backend errors — is
    /// reported as `false`. This method never fails.
    async fn delete(&self, filename: &str, target_dir: Option<&str>) -> bool;

    /// Fetch the complete content of an asset addressed by a public URL
    /// previously returned by `save`.
    async fn read(&self, options: &ReadOptions) -> StorageResult<Vec<u8>>;
}
