//! Backend implementations for state and lock storage

mod local;
mod memory;
mod s3;

pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use s3::S3Backend;

use std::sync::Arc;

use crate::backend::{BackendConfig, BackendError, BackendResult, BlobStore, LockStore};

/// The pair of stores a server needs
///
/// Every built-in backend implements both traits, so both handles usually
/// point at the same object.
#[derive(Clone)]
pub struct Stores {
    pub blobs: Arc<dyn BlobStore>,
    pub locks: Arc<dyn LockStore>,
}

impl Stores {
    /// Use one backend for both state blobs and lock records
    pub fn shared<B>(backend: B) -> Self
    where
        B: BlobStore + LockStore + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            blobs: backend.clone(),
            locks: backend,
        }
    }
}

/// Create stores from configuration
///
/// This function dispatches to the appropriate backend implementation
/// based on the backend_type in the configuration.
pub async fn create_stores(config: &BackendConfig) -> BackendResult<Stores> {
    match config.backend_type.as_str() {
        "memory" => Ok(Stores::shared(MemoryBackend::new())),
        "local" => {
            let backend = LocalBackend::from_config(config)?;
            backend.init().await?;
            Ok(Stores::shared(backend))
        }
        "s3" => {
            let backend = S3Backend::from_config(config).await?;
            backend.init().await?;
            Ok(Stores::shared(backend))
        }
        other => Err(BackendError::unsupported_backend(other)),
    }
}
