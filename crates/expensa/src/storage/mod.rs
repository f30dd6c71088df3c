//! Document storage: opaque keys to bytes.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StorageError;

pub mod filesystem;
pub mod keys;
pub mod memory;

pub use filesystem::FileStore;
pub use keys::{KeyLayout, SourceDocument};
pub use memory::MemoryStore;

/// Narrow read/write contract over an object store.
///
/// `put` overwrites an existing object with the same key.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    /// Returns `StorageError::NotFound` for a missing key.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Serializes `value` as pretty JSON and stores it under `key`.
pub async fn put_json<T: Serialize + ?Sized>(
    store: &dyn DocumentStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serialize {
        key: key.to_string(),
        source: e,
    })?;
    store.put(key, bytes).await
}

/// Rejects empty keys, absolute keys and `.`/`..` components.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key
        .split('/')
        .any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
