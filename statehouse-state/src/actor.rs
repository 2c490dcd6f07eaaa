//! Lock actors
//!
//! A `LockActor` owns the lock state of exactly one resource key. All of its
//! operations run under one async mutex for their entire duration, including
//! storage I/O, so the check-then-write of `acquire` and `release` can never
//! interleave with another request for the same key. Tokio's mutex is fair,
//! which orders operations on one key by arrival.
//!
//! The durable `LockStore` is the source of truth. The actor loads the record
//! on its first operation and afterwards writes through on every mutation
//! before updating its cached copy.

use std::sync::Arc;

use dashmap::DashMap;
use log::{info, warn};
use tokio::sync::Mutex;

use crate::backend::{BackendResult, LockStore};
use crate::key::ResourceKey;
use crate::lock::LockInfo;

/// Result of an acquire attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The candidate is now the lock
    Acquired,
    /// Another lock is held; it was left untouched
    Conflict(LockInfo),
}

/// Result of a release attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The matching lock was removed
    Released,
    /// No lock ID was supplied
    MissingId,
    /// The supplied ID does not match the current lock, or nothing is locked
    Conflict(Option<LockInfo>),
}

/// Serialized lock state machine for one resource key
pub struct LockActor {
    key: String,
    store: Arc<dyn LockStore>,
    /// `None` until the record has been loaded from the store
    cache: Mutex<Option<Option<LockInfo>>>,
}

impl LockActor {
    pub fn new(key: impl Into<String>, store: Arc<dyn LockStore>) -> Self {
        Self {
            key: key.into(),
            store,
            cache: Mutex::new(None),
        }
    }

    /// Take the lock if nothing holds it
    pub async fn acquire(&self, candidate: LockInfo) -> BackendResult<AcquireOutcome> {
        let mut cache = self.cache.lock().await;

        if let Some(existing) = self.current(&mut cache).await? {
            warn!(
                "lock conflict on {}: held by {} ({}), requested by {}",
                self.key, existing.id, existing.who, candidate.id
            );
            return Ok(AcquireOutcome::Conflict(existing));
        }

        self.store.save(&self.key, &candidate).await?;
        info!(
            "lock acquired on {}: id={} operation={} who={}",
            self.key, candidate.id, candidate.operation, candidate.who
        );
        *cache = Some(Some(candidate));

        Ok(AcquireOutcome::Acquired)
    }

    /// Drop the lock if `candidate_id` matches the holder
    pub async fn release(&self, candidate_id: &str) -> BackendResult<ReleaseOutcome> {
        if candidate_id.is_empty() {
            return Ok(ReleaseOutcome::MissingId);
        }

        let mut cache = self.cache.lock().await;

        match self.current(&mut cache).await? {
            Some(existing) if existing.id == candidate_id => {
                self.store.remove(&self.key).await?;
                info!("lock released on {}: id={}", self.key, candidate_id);
                *cache = Some(None);
                Ok(ReleaseOutcome::Released)
            }
            current => {
                warn!(
                    "unlock refused on {}: supplied id {} does not match {}",
                    self.key,
                    candidate_id,
                    current.as_ref().map_or("<unlocked>", |l| l.id.as_str())
                );
                Ok(ReleaseOutcome::Conflict(current))
            }
        }
    }

    /// Current lock record, if any
    pub async fn inspect(&self) -> BackendResult<Option<LockInfo>> {
        let mut cache = self.cache.lock().await;
        self.current(&mut cache).await
    }

    /// Remove any lock without checking its ID
    pub async fn purge(&self) -> BackendResult<()> {
        let mut cache = self.cache.lock().await;

        self.store.remove(&self.key).await?;
        info!("lock purged on {}", self.key);
        *cache = Some(None);

        Ok(())
    }

    /// Cached lock state, loading it from the store on first use
    async fn current(
        &self,
        cache: &mut Option<Option<LockInfo>>,
    ) -> BackendResult<Option<LockInfo>> {
        if let Some(lock) = cache {
            return Ok(lock.clone());
        }

        let lock = self.store.load(&self.key).await?;
        *cache = Some(lock.clone());
        Ok(lock)
    }
}

/// Arena of lock actors, one per resource key
///
/// Actors are created on first access and live as long as the registry.
pub struct LockRegistry {
    store: Arc<dyn LockStore>,
    actors: DashMap<String, Arc<LockActor>>,
}

impl LockRegistry {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self {
            store,
            actors: DashMap::new(),
        }
    }

    /// The actor responsible for `key`
    pub fn actor(&self, key: &ResourceKey) -> Arc<LockActor> {
        self.actors
            .entry(key.as_str().to_string())
            .or_insert_with(|| Arc::new(LockActor::new(key.as_str(), self.store.clone())))
            .value()
            .clone()
    }

    /// Number of actors started so far
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
