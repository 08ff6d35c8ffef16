//! Storage construction from resolved configuration.

use std::sync::Arc;

use stowage_core::StorageConfig;

use crate::oci::OciStorage;
use crate::traits::{Storage, StorageResult};

/// Create the storage adapter behind the provider trait.
///
/// Construction validates the configuration and binds the public host;
/// credentials resolve lazily on first use so that a misconfigured
/// credential source surfaces on the first operation, not at boot.
pub fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    let storage = OciStorage::new(config.clone())?;
    tracing::info!(
        bucket = %config.bucket,
        namespace = %config.namespace,
        host = %storage.public_host(),
        "object storage adapter ready"
    );
    Ok(Arc::new(storage))
}
