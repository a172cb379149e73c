//! Media storage port - where uploaded post images end up.

use async_trait::async_trait;

/// Stores uploaded media and hands back the URL it is served from.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Persist `data` under `key`, returning its public URL.
    async fn store(&self, key: &str, data: &[u8]) -> Result<String, StorageError>;

    /// Remove a stored object. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("I/O failure: {0}")]
    Io(String),
}
