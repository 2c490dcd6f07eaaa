//! In-memory backend
//!
//! Nothing survives a restart. Useful for tests and throwaway servers.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::backend::{BackendResult, BlobStore, LockStore};
use crate::lock::LockInfo;

#[derive(Default)]
pub struct MemoryBackend {
    blobs: RwLock<HashMap<String, Bytes>>,
    locks: RwLock<HashMap<String, LockInfo>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, body: Bytes) -> BackendResult<()> {
        self.blobs.write().await.insert(key.to_string(), body);
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

#[async_trait]
impl LockStore for MemoryBackend {
    async fn load(&self, key: &str) -> BackendResult<Option<LockInfo>> {
        Ok(self.locks.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, lock: &LockInfo) -> BackendResult<()> {
        self.locks
            .write()
            .await
            .insert(key.to_string(), lock.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        self.locks.write().await.remove(key);
        Ok(())
    }
}
