//! The object store boundary.

use std::path::{Component, Path};

use async_trait::async_trait;
use bytes::Bytes;

/// Why a `put` failed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key cannot be stored by this backend.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The backend could not be constructed from its settings.
    #[error("store configuration error: {0}")]
    Config(String),

    /// The remote service rejected or failed the request.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write-only view of a key/value blob store.
///
/// Implementations must be safe to call concurrently; the publisher uploads
/// several segments at once.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Store `body` under `key`, replacing any previous object.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError>;
}

/// Reject keys that could escape a root directory or that no backend can
/// address: empty keys, absolute paths, `.`/`..` segments, empty segments.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    if key.starts_with('/') || key.ends_with('/') || key.contains("//") {
        return Err(invalid("leading, trailing or repeated slash"));
    }
    if key.contains('\\') {
        return Err(invalid("backslash"));
    }
    if !Path::new(key)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        || key.split('/').any(|seg| seg == "." || seg == "..")
    {
        return Err(invalid("relative path segment"));
    }
    Ok(())
}
