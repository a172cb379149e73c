//! Application services - the feed, follow, and authoring logic on top of the ports.

mod feed;
mod follows;
mod index_cache;
mod posts;

pub use feed::{FeedService, GroupFeed, PostDetail, Profile};
pub use follows::{FollowService, resolve_following};
pub use index_cache::{DEFAULT_INDEX_TTL, IndexCache, IndexKey};
pub use posts::PostService;
