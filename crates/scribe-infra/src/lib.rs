//! # Scribe Infrastructure
//!
//! Concrete implementations of the ports defined in `scribe-core`.
//! This crate contains database, cache, auth, and media storage integrations.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory adapters only
//! - `postgres` - PostgreSQL repositories via SeaORM
//! - `redis` - Redis-backed cache

pub mod auth;
pub mod cache;
pub mod database;
pub mod storage;

// Re-exports - In-Memory
pub use auth::{Argon2PasswordService, JwtConfig, JwtTokenService};
pub use cache::InMemoryCache;
pub use database::InMemoryDatabase;
pub use storage::LocalMediaStorage;

// Re-exports - External services
#[cfg(feature = "redis")]
pub use cache::{RedisCache, RedisConfig};
#[cfg(feature = "postgres")]
pub use database::{DatabaseConfig, connect, postgres_repositories};
