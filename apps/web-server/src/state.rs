//! Application state - shared across all handlers.

use std::sync::Arc;
use std::time::Duration;

use scribe_core::ports::{
    Cache, GroupRepository, MediaStorage, PasswordService, Repositories, TokenService,
    UserRepository,
};
use scribe_core::services::{FeedService, FollowService, IndexCache, PostService};
use scribe_infra::{
    Argon2PasswordService, InMemoryCache, InMemoryDatabase, JwtTokenService, LocalMediaStorage,
};

use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub feed: FeedService,
    pub posts: PostService,
    pub follows: FollowService,
    pub users: Arc<dyn UserRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub index_cache: IndexCache,
    pub tokens: Arc<dyn TokenService>,
    pub passwords: Arc<dyn PasswordService>,
    pub media: Arc<dyn MediaStorage>,
}

/// Everything [`AppState`] is assembled from.
pub struct Backends {
    pub repos: Repositories,
    pub cache: Arc<dyn Cache>,
    pub tokens: Arc<dyn TokenService>,
    pub passwords: Arc<dyn PasswordService>,
    pub media: Arc<dyn MediaStorage>,
}

impl AppState {
    /// Build the application state, falling back to in-memory backends for
    /// anything that is not configured or not reachable.
    pub async fn new(config: &AppConfig) -> Self {
        let backends = Backends {
            repos: repositories(config).await,
            cache: cache(config).await,
            tokens: Arc::new(JwtTokenService::new(config.jwt.clone())),
            passwords: Arc::new(Argon2PasswordService::new()),
            media: Arc::new(LocalMediaStorage::new(
                config.media_root.clone(),
                config.media_url.clone(),
            )),
        };

        let state = Self::assemble(backends, config.posts_per_page, config.index_cache_ttl);
        tracing::info!("Application state initialized");
        state
    }

    pub fn assemble(backends: Backends, per_page: u64, index_ttl: Duration) -> Self {
        let Backends {
            repos,
            cache,
            tokens,
            passwords,
            media,
        } = backends;

        let index_cache = IndexCache::new(cache, index_ttl);

        Self {
            feed: FeedService::new(repos.clone(), per_page),
            posts: PostService::new(repos.clone(), index_cache.clone()),
            follows: FollowService::new(repos.clone()),
            users: repos.users,
            groups: repos.groups,
            index_cache,
            tokens,
            passwords,
            media,
        }
    }
}

fn memory_repositories() -> Repositories {
    Arc::new(InMemoryDatabase::new()).into_repositories()
}

#[cfg(feature = "postgres")]
async fn repositories(config: &AppConfig) -> Repositories {
    use migration::{Migrator, MigratorTrait};

    let Some(db_config) = config.database.as_ref() else {
        tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
        return memory_repositories();
    };

    let conn = match scribe_infra::connect(db_config).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(
                "Failed to connect to database: {}. Using in-memory fallback.",
                e
            );
            return memory_repositories();
        }
    };

    if let Err(e) = Migrator::up(&conn, None).await {
        tracing::error!("Failed to run migrations: {}. Using in-memory fallback.", e);
        return memory_repositories();
    }

    scribe_infra::postgres_repositories(conn)
}

#[cfg(not(feature = "postgres"))]
async fn repositories(_config: &AppConfig) -> Repositories {
    tracing::info!("Running without postgres feature - using in-memory repositories");
    memory_repositories()
}

#[cfg(feature = "redis")]
async fn cache(config: &AppConfig) -> Arc<dyn Cache> {
    use scribe_infra::RedisCache;

    let Some(redis_config) = config.redis.clone() else {
        tracing::info!("REDIS_URL not set. Using in-memory cache.");
        return Arc::new(InMemoryCache::new());
    };

    let fallback = redis_config.fallback_to_memory;
    match RedisCache::new(redis_config).await {
        Ok(cache) => Arc::new(cache),
        Err(e) if fallback => {
            tracing::warn!("Redis unavailable: {}. Using in-memory cache.", e);
            Arc::new(InMemoryCache::new())
        }
        Err(e) => {
            // Index pages simply go uncached until Redis comes back.
            tracing::error!("Redis unavailable: {}. Index cache disabled.", e);
            Arc::new(NoCache)
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn cache(_config: &AppConfig) -> Arc<dyn Cache> {
    Arc::new(InMemoryCache::new())
}

/// A cache that never holds anything.
#[cfg(feature = "redis")]
struct NoCache;

#[cfg(feature = "redis")]
#[async_trait::async_trait]
impl Cache for NoCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Option<Duration>,
    ) -> Result<(), scribe_core::ports::CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), scribe_core::ports::CacheError> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> bool {
        false
    }
}

#[cfg(test)]
impl AppState {
    /// State over in-memory backends, storing uploads below `media_root`.
    pub fn in_memory(media_root: std::path::PathBuf) -> Self {
        use scribe_core::pagination::DEFAULT_PER_PAGE;
        use scribe_core::services::DEFAULT_INDEX_TTL;
        use scribe_infra::JwtConfig;

        let backends = Backends {
            repos: memory_repositories(),
            cache: Arc::new(InMemoryCache::new()),
            tokens: Arc::new(JwtTokenService::new(JwtConfig::default())),
            passwords: Arc::new(Argon2PasswordService::new()),
            media: Arc::new(LocalMediaStorage::new(media_root, "/media/")),
        };

        Self::assemble(backends, DEFAULT_PER_PAGE, DEFAULT_INDEX_TTL)
    }
}
