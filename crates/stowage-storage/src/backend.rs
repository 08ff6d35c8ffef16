//! Object store backend seam.
//!
//! The adapter consumes four primitives — `head`, `get`, `put`,
//! `delete` — each addressed by bucket, namespace and key and failing
//! with a status-coded error where 404 means "not found". Everything
//! above this trait (canonicalization, retries, URL handling) is
//! backend-agnostic; the production implementation lives in
//! [`crate::client`].

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use http::HeaderMap;
use thiserror::Error;

use crate::traits::StorageError;

/// Status-coded backend failure.
#[derive(Clone, Debug, Error)]
pub enum BackendError {
    #[error("object store returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("object store transport failure: {0}")]
    Transport(String),

    #[error("request signing failed: {0}")]
    Auth(String),
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Retryability predicate: server errors, rate limiting and
    /// transport failures are transient; 404 and the remaining 4xx are
    /// definitive.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Status { status, .. } => *status == 429 || *status >= 500,
            BackendError::Transport(_) => true,
            BackendError::Auth(_) => false,
        }
    }
}

/// The single place backend failures turn into the adapter taxonomy.
impl From<BackendError> for StorageError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Status { status: 404, message } => StorageError::NotFound(message),
            BackendError::Status { status, message } if status == 429 || status >= 500 => {
                StorageError::Transient { status: Some(status), message }
            }
            BackendError::Status { status, message } => StorageError::Permanent { status, message },
            BackendError::Transport(message) => StorageError::Transient { status: None, message },
            BackendError::Auth(message) => StorageError::AuthResolution(message),
        }
    }
}

/// Metadata returned by `head`.
#[derive(Clone, Debug, Default)]
pub struct ObjectMeta {
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// A successfully opened object: the backend's response headers plus an
/// incremental byte stream. Consumption rate is governed by the caller;
/// nothing is buffered beyond the transport's own window.
pub struct FetchedObject {
    pub headers: HeaderMap,
    pub stream: BoxStream<'static, Result<Bytes, BackendError>>,
}

impl FetchedObject {
    /// Drain the stream into one contiguous buffer.
    pub async fn into_bytes(self) -> Result<Vec<u8>, BackendError> {
        let chunks: Vec<Bytes> = self.stream.try_collect().await?;
        let mut buffer = Vec::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer)
    }
}

/// Raw object store primitives.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    async fn head(&self, bucket: &str, namespace: &str, key: &str)
        -> Result<ObjectMeta, BackendError>;

    async fn get(&self, bucket: &str, namespace: &str, key: &str)
        -> Result<FetchedObject, BackendError>;

    async fn put(
        &self,
        bucket: &str,
        namespace: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError>;

    async fn delete(&self, bucket: &str, namespace: &str, key: &str) -> Result<(), BackendError>;
}
