//! Write side of the blog: creating and editing posts, commenting.

use uuid::Uuid;

use crate::domain::{Comment, Post, PostDraft};
use crate::error::DomainError;
use crate::ports::Repositories;

use super::index_cache::IndexCache;

const REQUIRED: &str = "This field is required.";

#[derive(Clone)]
pub struct PostService {
    repos: Repositories,
    index_cache: IndexCache,
}

impl PostService {
    pub fn new(repos: Repositories, index_cache: IndexCache) -> Self {
        Self { repos, index_cache }
    }

    /// Publish a new post by `author_id`. Invalidates the cached index.
    pub async fn create(&self, author_id: Uuid, draft: PostDraft) -> Result<Post, DomainError> {
        self.check_draft(&draft).await?;

        let post = Post::new(author_id, draft.text, draft.group_id).with_image(draft.image);
        let post = self.repos.posts.insert(post).await?;

        tracing::info!(post_id = %post.id, author = %author_id, "Post created");
        self.index_cache.invalidate().await;

        Ok(post)
    }

    /// Load a post for editing. Only its author may edit it.
    pub async fn editable(&self, viewer: Uuid, post_id: Uuid) -> Result<Post, DomainError> {
        let post = self
            .repos
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| DomainError::not_found("post", post_id))?;

        if post.author_id != viewer {
            return Err(DomainError::Unauthorized);
        }

        Ok(post)
    }

    /// Replace the text and group of a post. The image is only replaced when the
    /// draft carries a new one; the publication date never changes.
    pub async fn edit(
        &self,
        viewer: Uuid,
        post_id: Uuid,
        draft: PostDraft,
    ) -> Result<Post, DomainError> {
        let mut post = self.editable(viewer, post_id).await?;
        self.check_draft(&draft).await?;

        post.text = draft.text;
        post.group_id = draft.group_id;
        if draft.image.is_some() {
            post.image = draft.image;
        }

        let post = self.repos.posts.update(post).await?;

        tracing::info!(post_id = %post.id, "Post edited");
        self.index_cache.invalidate().await;

        Ok(post)
    }

    /// Comment on an existing post. Blank text is rejected before the post is looked up.
    pub async fn add_comment(
        &self,
        author_id: Uuid,
        post_id: Uuid,
        text: &str,
    ) -> Result<Comment, DomainError> {
        if text.trim().is_empty() {
            return Err(DomainError::validation("text", REQUIRED));
        }

        let post = self
            .repos
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| DomainError::not_found("post", post_id))?;

        let comment = self
            .repos
            .comments
            .insert(Comment::new(post.id, author_id, text.trim()))
            .await?;

        tracing::info!(comment_id = %comment.id, post_id = %post.id, "Comment added");
        Ok(comment)
    }

    async fn check_draft(&self, draft: &PostDraft) -> Result<(), DomainError> {
        if draft.text.trim().is_empty() {
            return Err(DomainError::validation("text", REQUIRED));
        }

        if let Some(group_id) = draft.group_id {
            if self.repos.groups.find_by_id(group_id).await?.is_none() {
                return Err(DomainError::validation(
                    "group",
                    "Select a valid choice. That choice is not one of the available choices.",
                ));
            }
        }

        Ok(())
    }
}
