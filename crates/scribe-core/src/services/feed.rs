//! Read side of the blog: listings, profiles, and the follow feed.

use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::{CommentEntry, Group, Post, PostEntry, User};
use crate::error::DomainError;
use crate::pagination::{Page, PageRequest};
use crate::ports::Repositories;

use super::follows::resolve_following;

/// A group together with one page of its posts.
#[derive(Debug, Clone)]
pub struct GroupFeed {
    pub group: Group,
    pub page: Page<PostEntry>,
}

/// An author's profile as seen by a particular viewer.
#[derive(Debug, Clone)]
pub struct Profile {
    pub author: User,
    pub post_count: u64,
    /// Whether the viewer follows this author. Always false for anonymous viewers.
    pub following: bool,
    pub page: Page<PostEntry>,
}

/// A single post with its discussion.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub entry: PostEntry,
    pub author_post_count: u64,
    /// Newest first.
    pub comments: Vec<CommentEntry>,
}

#[derive(Clone)]
pub struct FeedService {
    repos: Repositories,
    per_page: u64,
}

impl FeedService {
    pub fn new(repos: Repositories, per_page: u64) -> Self {
        Self { repos, per_page }
    }

    /// Turn the raw `page` query parameter into a request sized for this feed.
    pub fn page_request(&self, raw: Option<&str>) -> PageRequest {
        PageRequest::parse(raw, self.per_page)
    }

    /// Every post, newest first.
    pub async fn index(&self, page: PageRequest) -> Result<Page<PostEntry>, DomainError> {
        let posts = self.repos.posts.page_all(page).await?;
        self.hydrate(posts).await
    }

    pub async fn group_feed(&self, slug: &str, page: PageRequest) -> Result<GroupFeed, DomainError> {
        let group = self
            .repos
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| DomainError::not_found("group", slug))?;

        let posts = self.repos.posts.page_by_group(group.id, page).await?;
        let page = self.hydrate(posts).await?;

        Ok(GroupFeed { group, page })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Profile, DomainError> {
        let author = self
            .repos
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| DomainError::not_found("user", username))?;

        let post_count = self.repos.posts.count_by_author(author.id).await?;
        let following = resolve_following(self.repos.follows.as_ref(), viewer, author.id).await?;
        let posts = self.repos.posts.page_by_author(author.id, page).await?;
        let page = self.hydrate(posts).await?;

        Ok(Profile {
            author,
            post_count,
            following,
            page,
        })
    }

    /// Posts by the authors `viewer` follows. Empty when they follow nobody.
    pub async fn follow_feed(
        &self,
        viewer: Uuid,
        page: PageRequest,
    ) -> Result<Page<PostEntry>, DomainError> {
        let posts = self.repos.posts.page_followed_by(viewer, page).await?;
        self.hydrate(posts).await
    }

    pub async fn post_detail(&self, post_id: Uuid) -> Result<PostDetail, DomainError> {
        let post = self
            .repos
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| DomainError::not_found("post", post_id))?;

        let author_post_count = self.repos.posts.count_by_author(post.author_id).await?;
        let comments = self.repos.comments.list_for_post(post.id).await?;

        let mut author_ids: Vec<Uuid> = comments.iter().map(|c| c.author_id).collect();
        author_ids.push(post.author_id);
        let authors = self.users_by_id(&author_ids).await?;

        let comments = comments
            .into_iter()
            .map(|comment| {
                let author = lookup(&authors, comment.author_id, "user")?;
                Ok(CommentEntry { comment, author })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        let author = lookup(&authors, post.author_id, "user")?;
        let group = match post.group_id {
            Some(group_id) => self.repos.groups.find_by_id(group_id).await?,
            None => None,
        };

        Ok(PostDetail {
            entry: PostEntry {
                post,
                author,
                group,
            },
            author_post_count,
            comments,
        })
    }

    /// Resolve authors and groups for a page of posts with one lookup each.
    async fn hydrate(&self, page: Page<Post>) -> Result<Page<PostEntry>, DomainError> {
        let author_ids: Vec<Uuid> = page.items.iter().map(|p| p.author_id).collect();
        let group_ids: Vec<Uuid> = page.items.iter().filter_map(|p| p.group_id).collect();

        let authors = self.users_by_id(&author_ids).await?;
        let groups: HashMap<Uuid, Group> = if group_ids.is_empty() {
            HashMap::new()
        } else {
            self.repos
                .groups
                .find_many(&dedup(group_ids))
                .await?
                .into_iter()
                .map(|g| (g.id, g))
                .collect()
        };

        let Page {
            items,
            number,
            num_pages,
            total,
            per_page,
        } = page;

        let items = items
            .into_iter()
            .map(|post| {
                let author = lookup(&authors, post.author_id, "user")?;
                let group = post.group_id.and_then(|id| groups.get(&id).cloned());
                Ok(PostEntry {
                    post,
                    author,
                    group,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(Page {
            items,
            number,
            num_pages,
            total,
            per_page,
        })
    }

    async fn users_by_id(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, User>, DomainError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = self.repos.users.find_many(&dedup(ids.to_vec())).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }
}

fn dedup(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn lookup<T: Clone>(
    map: &HashMap<Uuid, T>,
    id: Uuid,
    entity_type: &'static str,
) -> Result<T, DomainError> {
    map.get(&id).cloned().ok_or_else(|| {
        tracing::error!(%id, entity_type, "Dangling reference while building feed");
        DomainError::Internal(format!("{entity_type} {id} referenced but missing"))
    })
}
