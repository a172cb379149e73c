//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use scribe_core::pagination::DEFAULT_PER_PAGE;
use scribe_core::services::DEFAULT_INDEX_TTL;
use scribe_infra::JwtConfig;
use scribe_infra::database::DatabaseConfig;

#[cfg(feature = "redis")]
use scribe_infra::RedisConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs on in-memory repositories.
    pub database: Option<DatabaseConfig>,
    /// `None` runs on the in-memory cache.
    #[cfg(feature = "redis")]
    pub redis: Option<RedisConfig>,
    pub jwt: JwtConfig,
    pub posts_per_page: u64,
    pub index_cache_ttl: Duration,
    /// Directory uploaded images are written to.
    pub media_root: PathBuf,
    /// URL prefix the media root is served under.
    pub media_url: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed("PORT").unwrap_or(8080),
            database: DatabaseConfig::from_env(),
            #[cfg(feature = "redis")]
            redis: env::var("REDIS_URL").ok().map(|_| RedisConfig::from_env()),
            jwt: JwtConfig::from_env(),
            posts_per_page: parsed("POSTS_PER_PAGE")
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_PER_PAGE),
            index_cache_ttl: parsed("INDEX_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_INDEX_TTL),
            media_root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./media")),
            media_url: env::var("MEDIA_URL").unwrap_or_else(|_| "/media/".to_string()),
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
