//! Local file backend for state storage
//!
//! State blobs live at `{root}/{key}`, lock records next to them at
//! `{root}/{key}.lock`. Writes go through a temporary file that is renamed
//! into place, so readers never observe a partially written file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::backend::{BackendConfig, BackendError, BackendResult, BlobStore, LockStore};
use crate::key::ResourceKey;
use crate::lock::LockInfo;

/// Local file backend for development and single-node deployments
pub struct LocalBackend {
    /// Directory all keys are resolved against
    root: PathBuf,
}

impl LocalBackend {
    /// Default data directory
    pub const DEFAULT_ROOT: &'static str = "statehouse-data";

    pub fn new() -> Self {
        Self::with_root(PathBuf::from(Self::DEFAULT_ROOT))
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create a LocalBackend from configuration
    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        let root = config
            .get_string("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_ROOT));

        Ok(Self::with_root(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the data directory if needed
    pub async fn init(&self) -> BackendResult<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            BackendError::Io(format!(
                "Failed to create data directory {}: {}",
                self.root.display(),
                e
            ))
        })
    }

    /// Map a key onto a path below the root
    fn resolve(&self, key: &str) -> BackendResult<PathBuf> {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if !ResourceKey::is_valid_component(segment) {
                return Err(BackendError::InvalidKey(key.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }

    fn lock_path(&self, key: &str) -> BackendResult<PathBuf> {
        self.resolve(&ResourceKey::lock_key(key))
    }

    async fn read_file(path: &Path) -> BackendResult<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackendError::Io(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Write via a sibling temporary file and rename it over the target
    async fn write_file(path: &Path, content: &[u8]) -> BackendResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                BackendError::Io(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let tmp_path = PathBuf::from(tmp_name);

        if let Err(e) = tokio::fs::write(&tmp_path, content).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(BackendError::Io(format!(
                "Failed to write {}: {}",
                tmp_path.display(),
                e
            )));
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(BackendError::Io(format!(
                "Failed to move {} into place: {}",
                path.display(),
                e
            )));
        }

        Ok(())
    }

    async fn remove_file(path: &Path) -> BackendResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::Io(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for LocalBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>> {
        let path = self.resolve(key)?;
        Ok(Self::read_file(&path).await?.map(Bytes::from))
    }

    async fn put(&self, key: &str, body: Bytes) -> BackendResult<()> {
        let path = self.resolve(key)?;
        Self::write_file(&path, &body).await
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        let path = self.resolve(key)?;
        Self::remove_file(&path).await
    }
}

#[async_trait]
impl LockStore for LocalBackend {
    async fn load(&self, key: &str) -> BackendResult<Option<LockInfo>> {
        let path = self.lock_path(key)?;
        let Some(content) = Self::read_file(&path).await? else {
            return Ok(None);
        };

        let lock = serde_json::from_slice(&content).map_err(|e| {
            BackendError::InvalidLock(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        Ok(Some(lock))
    }

    async fn save(&self, key: &str, lock: &LockInfo) -> BackendResult<()> {
        let path = self.lock_path(key)?;
        let content = serde_json::to_vec_pretty(lock)
            .map_err(|e| BackendError::Serialization(format!("Failed to serialize lock: {}", e)))?;

        Self::write_file(&path, &content).await
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        let path = self.lock_path(key)?;
        Self::remove_file(&path).await
    }
}
