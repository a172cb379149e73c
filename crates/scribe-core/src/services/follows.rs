//! Follow relationships: the follow-state resolver and follow/unfollow mutations.

use uuid::Uuid;

use crate::domain::User;
use crate::error::{DomainError, RepoError};
use crate::ports::{FollowRepository, Repositories};

/// Whether `viewer` follows `author_id`.
///
/// Anonymous viewers never follow anyone, and the store is not consulted for them.
pub async fn resolve_following(
    follows: &dyn FollowRepository,
    viewer: Option<Uuid>,
    author_id: Uuid,
) -> Result<bool, RepoError> {
    match viewer {
        None => Ok(false),
        Some(viewer) => follows.exists(viewer, author_id).await,
    }
}

#[derive(Clone)]
pub struct FollowService {
    repos: Repositories,
}

impl FollowService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Make `viewer` follow `username`.
    ///
    /// Following yourself or someone you already follow is a silent no-op.
    /// Returns whether a new edge was created.
    pub async fn follow(&self, viewer: Uuid, username: &str) -> Result<bool, DomainError> {
        let author = self.author(username).await?;

        if author.id == viewer {
            tracing::debug!(%viewer, "Ignoring self-follow");
            return Ok(false);
        }

        let created = self.repos.follows.follow(viewer, author.id).await?;
        if created {
            tracing::info!(%viewer, author = %author.id, "Follow created");
        } else {
            tracing::debug!(%viewer, author = %author.id, "Already following");
        }

        Ok(created)
    }

    /// Drop `viewer`'s follow of `username`, if any. Returns whether an edge was removed.
    pub async fn unfollow(&self, viewer: Uuid, username: &str) -> Result<bool, DomainError> {
        let author = self.author(username).await?;
        let removed = self.repos.follows.unfollow(viewer, author.id).await?;

        if removed {
            tracing::info!(%viewer, author = %author.id, "Follow removed");
        }

        Ok(removed)
    }

    async fn author(&self, username: &str) -> Result<User, DomainError> {
        self.repos
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| DomainError::not_found("user", username))
    }
}
