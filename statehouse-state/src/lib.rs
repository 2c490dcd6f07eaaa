//! Statehouse State Management
//!
//! This crate provides the storage and locking core of the statehouse
//! Terraform HTTP backend. State files are opaque blobs; locks are
//! `LockInfo` records owned by one `LockActor` per resource key.
//!
//! # Overview
//!
//! - **ResourceKey**: `{principal}/{project}.tfstate`, the identity of one state file
//! - **BlobStore**: storage for the state file bytes (memory, local, S3)
//! - **LockStore**: durable storage for the lock record of each key
//! - **LockActor**: serializes acquire/release/inspect/purge for one key
//! - **LockRegistry**: hands out the single actor for each key
//!
//! # Example
//!
//! ```ignore
//! use statehouse_state::{create_stores, BackendConfig, LockRegistry, ResourceKey};
//!
//! let stores = create_stores(&BackendConfig::new("memory")).await?;
//! let registry = LockRegistry::new(stores.locks.clone());
//!
//! let key = ResourceKey::new("alice", "network");
//! let actor = registry.actor(&key);
//!
//! match actor.acquire(lock).await? {
//!     AcquireOutcome::Acquired => { /* write state */ }
//!     AcquireOutcome::Conflict(existing) => { /* report 423 */ }
//! }
//! ```

pub mod actor;
pub mod backend;
pub mod backends;
pub mod key;
pub mod lock;

// Re-export main types for convenience
pub use actor::{AcquireOutcome, LockActor, LockRegistry, ReleaseOutcome};
pub use backend::{BackendConfig, BackendError, BackendResult, BlobStore, LockStore};
pub use backends::{Stores, create_stores};
pub use key::ResourceKey;
pub use lock::LockInfo;
