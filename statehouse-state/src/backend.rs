//! Storage traits and error types

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::lock::LockInfo;

/// Errors that can occur when interacting with a storage backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend type is not supported
    #[error("Unsupported backend type: {0}")]
    UnsupportedBackend(String),

    /// Configuration error
    #[error("Backend configuration error: {0}")]
    Configuration(String),

    /// The bucket/container does not exist
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// The key cannot be mapped onto this backend's namespace
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// A stored lock record could not be decoded
    #[error("Invalid lock record: {0}")]
    InvalidLock(String),

    /// Network or I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BackendError {
    /// Create an unsupported backend error
    pub fn unsupported_backend(backend_type: impl Into<String>) -> Self {
        Self::UnsupportedBackend(backend_type.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Storage for state file contents
///
/// Blobs are opaque bytes; this layer never parses Terraform state.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob. Returns `None` if nothing is stored under `key`.
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>>;

    /// Write a blob, replacing any previous contents
    async fn put(&self, key: &str, body: Bytes) -> BackendResult<()>;

    /// Delete a blob. Deleting a missing blob is not an error.
    async fn delete(&self, key: &str) -> BackendResult<()>;
}

/// Durable storage for lock records, one record per resource key
///
/// Each call must be atomic for its key: a failed `save` leaves the
/// previous record in place.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Load the lock record for `key`, if any
    async fn load(&self, key: &str) -> BackendResult<Option<LockInfo>>;

    /// Persist `lock` as the record for `key`
    async fn save(&self, key: &str, lock: &LockInfo) -> BackendResult<()>;

    /// Remove the record for `key`. Removing a missing record is not an error.
    async fn remove(&self, key: &str) -> BackendResult<()>;
}

/// Configuration for a storage backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend type (e.g., "s3", "local", "memory")
    pub backend_type: String,
    /// Backend-specific attributes
    pub attributes: HashMap<String, String>,
}

impl BackendConfig {
    pub fn new(backend_type: impl Into<String>) -> Self {
        Self {
            backend_type: backend_type.into(),
            attributes: HashMap::new(),
        }
    }

    /// Set an attribute, builder style
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Get a string attribute value
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Get a boolean attribute value
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get_string(key)? {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        }
    }

    /// Get a boolean attribute with a default value
    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }
}
