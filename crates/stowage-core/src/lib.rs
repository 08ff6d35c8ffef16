//! Stowage Core Library
//!
//! This crate provides the configuration and shared constants used by the
//! Stowage storage adapter and server. Configuration is resolved exactly
//! once, at construction, with a fixed precedence per field:
//! environment variable > explicit override > built-in default.

pub mod config;
pub mod constants;

// Re-export commonly used types
pub use config::{ConfigError, ConfigOverrides, StorageConfig};
