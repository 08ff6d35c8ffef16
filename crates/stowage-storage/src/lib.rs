//! Stowage Storage Library
//!
//! This crate lets a CMS host store, retrieve and serve media assets
//! through OCI Object Storage. It implements the provider contract the
//! host expects (`exists`, `save`, `serve`, `delete`, `read`) on top of
//! four backend primitives (`head`, `get`, `put`, `delete` by key).
//!
//! # Object keys
//!
//! Keys are canonical slash-separated strings with no leading slash, and
//! the configured path prefix is applied at most once. Key construction
//! is centralized in the `keys` module so the key derived at save time
//! and the key recovered from a public URL converge on the same form.
//!
//! # Credentials
//!
//! Exactly one credential strategy is active per adapter: an explicit
//! API key pair, a profile from an OCI config file, or instance-principal
//! discovery against the local metadata service. A partially supplied
//! key pair is a hard error, never a silent fallback.

pub mod auth;
pub mod backend;
pub mod client;
pub mod factory;
pub mod keys;
pub mod naming;
pub mod oci;
pub mod retry;
pub mod serve;
pub mod traits;
pub mod url;

// Re-export commonly used types
pub use factory::create_storage;
pub use oci::OciStorage;
pub use stowage_core::{ConfigOverrides, StorageConfig};
pub use traits::{Asset, ReadOptions, Storage, StorageError, StorageResult};
