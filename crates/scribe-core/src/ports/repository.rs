use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Comment, Group, Post, User};
use crate::error::RepoError;
use crate::pagination::{Page, PageRequest};

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Insert a new entity.
    async fn insert(&self, entity: T) -> Result<T, RepoError>;

    /// Overwrite an existing entity. `RepoError::NotFound` if it does not exist.
    async fn update(&self, entity: T) -> Result<T, RepoError>;

    /// Delete an entity by its ID.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// User repository with domain-specific methods.
#[async_trait]
pub trait UserRepository: BaseRepository<User, Uuid> {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, RepoError>;
}

/// Group repository.
#[async_trait]
pub trait GroupRepository: BaseRepository<Group, Uuid> {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, RepoError>;

    /// All groups, ordered by title.
    async fn list(&self) -> Result<Vec<Group>, RepoError>;

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Group>, RepoError>;
}

/// Post repository. Every listing is newest first.
#[async_trait]
pub trait PostRepository: BaseRepository<Post, Uuid> {
    async fn page_all(&self, page: PageRequest) -> Result<Page<Post>, RepoError>;

    async fn page_by_group(&self, group_id: Uuid, page: PageRequest)
    -> Result<Page<Post>, RepoError>;

    async fn page_by_author(
        &self,
        author_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError>;

    /// Posts written by any author `user_id` follows.
    async fn page_followed_by(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError>;

    async fn count_by_author(&self, author_id: Uuid) -> Result<u64, RepoError>;
}

/// Comment repository.
#[async_trait]
pub trait CommentRepository: BaseRepository<Comment, Uuid> {
    /// Comments under a post, newest first.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError>;
}

/// Follow edges. Uniqueness of (user, author) is enforced by the store.
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Create the edge unless it already exists. Returns whether an edge was created.
    async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError>;

    /// Remove the edge if present. Returns whether an edge was removed.
    async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError>;

    async fn exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError>;
}

/// Every repository the services need, bundled for wiring.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub follows: Arc<dyn FollowRepository>,
}
