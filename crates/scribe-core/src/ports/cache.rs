//! Key-value cache port.
//!
//! Values are opaque strings. Reads never fail: a backend error is reported by
//! the implementation and surfaces to callers as a miss.

use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    /// Store `value`; `None` keeps it until it is overwritten or deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn exists(&self, key: &str) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend unreachable: {0}")]
    Connection(String),

    #[error("Cache operation failed: {0}")]
    Operation(String),
}
