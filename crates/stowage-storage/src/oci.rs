//! OCI Object Storage adapter facade.
//!
//! Composes key canonicalization, credential resolution, the retry
//! policy and the URL codec into the five provider operations. Every
//! call follows the same shape: derive the canonical key, obtain the
//! client handle, invoke the backend (through the retry policy when the
//! operation is idempotent), map the result.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use tokio::sync::RwLock;

use stowage_core::{constants, StorageConfig};

use crate::auth;
use crate::backend::{FetchedObject, ObjectBackend};
use crate::client::HttpBackend;
use crate::keys;
use crate::naming;
use crate::retry::RetryPolicy;
use crate::serve;
use crate::traits::{Asset, ReadOptions, Storage, StorageError, StorageResult};
use crate::url::UrlCodec;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// The adapter. One instance is bound to one bucket, namespace, host
/// and credential strategy; individual operations share nothing beyond
/// that immutable configuration and the cached client handle.
pub struct OciStorage {
    config: StorageConfig,
    codec: UrlCodec,
    retry: RetryPolicy,
    /// Client handle, resolved lazily on first use and reused until
    /// [`OciStorage::invalidate_credentials`] clears it.
    backend: RwLock<Option<Arc<dyn ObjectBackend>>>,
}

impl OciStorage {
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        Self::with_parts(config, RetryPolicy::default(), None)
    }

    /// Build the adapter over an externally supplied backend instead of
    /// the signed HTTP client. Credential resolution is skipped
    /// entirely in this mode.
    pub fn with_backend(config: StorageConfig, backend: Arc<dyn ObjectBackend>) -> StorageResult<Self> {
        Self::with_parts(config, RetryPolicy::default(), Some(backend))
    }

    pub(crate) fn with_parts(
        config: StorageConfig,
        retry: RetryPolicy,
        backend: Option<Arc<dyn ObjectBackend>>,
    ) -> StorageResult<Self> {
        if config.bucket.is_empty() {
            return Err(StorageError::Config("bucket is not configured".to_string()));
        }
        if config.namespace.is_empty() {
            return Err(StorageError::Config("namespace is not configured".to_string()));
        }

        let host = match (&config.host, &config.region) {
            (Some(host), _) => host.clone(),
            (None, Some(region)) => {
                constants::default_host(&config.namespace, &auth::normalize_region(region))
            }
            (None, None) => {
                return Err(StorageError::Config(
                    "either host or region must be configured".to_string(),
                ))
            }
        };

        let codec = UrlCodec::new(
            host,
            config.namespace.clone(),
            config.bucket.clone(),
            config.path_prefix.clone(),
        );

        Ok(OciStorage {
            config,
            codec,
            retry,
            backend: RwLock::new(backend),
        })
    }

    /// Host this adapter issues public URLs for.
    pub fn public_host(&self) -> &str {
        self.codec.host()
    }

    /// Drop the cached client handle so the next operation resolves
    /// credentials again. The hook for credential rotation.
    pub async fn invalidate_credentials(&self) {
        *self.backend.write().await = None;
    }

    async fn backend(&self) -> StorageResult<Arc<dyn ObjectBackend>> {
        {
            let guard = self.backend.read().await;
            if let Some(backend) = guard.as_ref() {
                return Ok(backend.clone());
            }
        }

        let mut guard = self.backend.write().await;
        if let Some(backend) = guard.as_ref() {
            return Ok(backend.clone());
        }
        let handle = auth::resolve(&self.config).await?;
        let backend: Arc<dyn ObjectBackend> =
            Arc::new(HttpBackend::new(self.codec.host().to_string(), handle.signer.clone())?);
        *guard = Some(backend.clone());
        Ok(backend)
    }

    fn key_for(&self, target_dir: &str, filename: &str) -> StorageResult<String> {
        keys::build_key(&self.config.path_prefix, [target_dir, filename])
    }

    /// Open an object addressed by a serve-request path as a header and
    /// byte stream pair. The initial request is retried; mid-stream
    /// failures are the consumer's to observe.
    pub(crate) async fn open(&self, request_path: &str) -> StorageResult<FetchedObject> {
        let key = keys::build_key(&self.config.path_prefix, [request_path])?;
        let backend = self.backend().await?;
        let fetched = self
            .retry
            .run("get", || backend.get(&self.config.bucket, &self.config.namespace, &key))
            .await?;
        Ok(fetched)
    }
}

async fn read_source(path: &Path) -> StorageResult<Vec<u8>> {
    Ok(tokio::fs::read(path).await?)
}

#[async_trait]
impl Storage for OciStorage {
    async fn exists(&self, filename: &str, target_dir: &str) -> StorageResult<bool> {
        let key = self.key_for(target_dir, filename)?;
        let backend = self.backend().await?;
        let result = self
            .retry
            .run("head", || backend.head(&self.config.bucket, &self.config.namespace, &key))
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, asset: &Asset, target_dir: Option<&str>) -> StorageResult<String> {
        let start = Instant::now();
        let dir = match target_dir {
            Some(dir) => dir.to_string(),
            None => naming::target_dir(&self.config.path_prefix),
        };

        // Both readiness requirements resolve before any network write:
        // a collision-free name and the asset bytes. Either failure
        // aborts the whole save.
        let (filename, data) = futures::try_join!(
            naming::unique_object_name(&asset.name, |candidate| {
                let dir = dir.clone();
                async move { self.exists(&candidate, &dir).await }
            }),
            read_source(&asset.source)
        )?;

        let key = self.key_for(&dir, &filename)?;
        let content_type = asset.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
        let size = data.len();
        let backend = self.backend().await?;

        // Uploads are not retried: repeating a half-applied write blind
        // risks inconsistent overwrites.
        backend
            .put(&self.config.bucket, &self.config.namespace, &key, Bytes::from(data), content_type)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.config.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "upload failed"
                );
                StorageError::from(e)
            })?;

        tracing::info!(
            bucket = %self.config.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "upload successful"
        );

        Ok(self.codec.encode(&key))
    }

    fn serve(self: Arc<Self>) -> Router {
        serve::router(self)
    }

    async fn delete(&self, filename: &str, target_dir: Option<&str>) -> bool {
        let dir = match target_dir {
            Some(dir) => dir.to_string(),
            None => naming::target_dir(&self.config.path_prefix),
        };
        let key = match self.key_for(&dir, filename) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(error = %err, filename, "delete skipped, key construction failed");
                return false;
            }
        };
        let backend = match self.backend().await {
            Ok(backend) => backend,
            Err(err) => {
                tracing::warn!(error = %err, key = %key, "delete failed, no client handle");
                return false;
            }
        };

        // Deletes are not retried, and every failure — including ones
        // the backend would call legitimate — collapses to `false`.
        match backend.delete(&self.config.bucket, &self.config.namespace, &key).await {
            Ok(()) => {
                tracing::info!(bucket = %self.config.bucket, key = %key, "delete successful");
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, bucket = %self.config.bucket, key = %key, "delete failed");
                false
            }
        }
    }

    async fn read(&self, options: &ReadOptions) -> StorageResult<Vec<u8>> {
        let start = Instant::now();
        let key = self.codec.decode(&options.path)?;
        let backend = self.backend().await?;

        let fetched = self
            .retry
            .run("get", || backend.get(&self.config.bucket, &self.config.namespace, &key))
            .await
            .map_err(StorageError::from)?;
        let data = fetched.into_bytes().await.map_err(StorageError::from)?;

        tracing::info!(
            bucket = %self.config.bucket,
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "read successful"
        );
        Ok(data)
    }
}
