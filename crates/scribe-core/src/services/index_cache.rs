//! Cache of the rendered index pages.
//!
//! Entries live for a fixed TTL and are keyed by a generation token that every
//! post write replaces, so a write makes all cached pages unreachable at once.
//! Backend failures are logged and treated as misses.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::ports::Cache;

const GENERATION_KEY: &str = "index:generation";

/// Default lifetime of a cached index page.
pub const DEFAULT_INDEX_TTL: Duration = Duration::from_secs(20);

/// Cache key of one index page, pinned to a cache generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey(String);

#[derive(Clone)]
pub struct IndexCache {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl IndexCache {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Resolve the key for the given `page` query value under the current
    /// generation. A request resolves its key once, before rendering, so a page
    /// rendered across a write is stored under the generation it was read from.
    pub async fn key(&self, page: &str) -> IndexKey {
        let generation = self
            .cache
            .get(GENERATION_KEY)
            .await
            .unwrap_or_else(|| "0".to_string());
        IndexKey(format!("index:{generation}:page:{page}"))
    }

    /// Cached body under `key`, if still fresh.
    pub async fn get(&self, key: &IndexKey) -> Option<String> {
        let hit = self.cache.get(&key.0).await;
        tracing::debug!(key = %key.0, hit = hit.is_some(), "Index cache lookup");
        hit
    }

    pub async fn put(&self, key: &IndexKey, body: &str) {
        if let Err(e) = self.cache.set(&key.0, body, Some(self.ttl)).await {
            tracing::warn!(key = %key.0, error = %e, "Failed to store index page");
        }
    }

    /// Drop every cached index page.
    pub async fn invalidate(&self) {
        let generation = Uuid::new_v4().to_string();
        match self.cache.set(GENERATION_KEY, &generation, None).await {
            Ok(()) => tracing::debug!(%generation, "Index cache invalidated"),
            Err(e) => tracing::warn!(error = %e, "Failed to invalidate index cache"),
        }
    }
}
