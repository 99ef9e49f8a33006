//! # vf-storage
//!
//! Object store backends and the key layout used when publishing a job.
//!
//! - [`ObjectStore`] is the write boundary the publisher talks to.
//! - [`S3ObjectStore`], [`FsObjectStore`] and [`MemoryObjectStore`] implement
//!   it for S3-compatible services, a local directory, and tests.
//! - [`StorageLayout`] turns a job identity into storage keys and public
//!   proxy paths.

pub mod fs;
pub mod layout;
pub mod memory;
pub mod s3;
pub mod store;

use std::sync::Arc;

use vf_core::config::{StorageBackend, StorageConfig};

pub use fs::FsObjectStore;
pub use layout::StorageLayout;
pub use memory::{MemoryObjectStore, StoredObject};
pub use s3::S3ObjectStore;
pub use store::{validate_key, ObjectStore, StoreError};

/// Construct the backend selected in `cfg`.
pub fn build_store(cfg: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    let store: Arc<dyn ObjectStore> = match cfg.backend {
        StorageBackend::Memory => Arc::new(MemoryObjectStore::new()),
        StorageBackend::Fs => Arc::new(FsObjectStore::new(cfg.fs_root.clone())),
        StorageBackend::S3 => Arc::new(S3ObjectStore::from_config(&cfg.s3)?),
    };
    tracing::debug!(backend = store.name(), "object store ready");
    Ok(store)
}
