//! In-memory repositories for tests and for running without PostgreSQL.
//!
//! All tables live behind one lock, so uniqueness and reference checks see a
//! consistent snapshot. The checks mirror the constraints of the SQL schema.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use scribe_core::domain::{Comment, Follow, Group, Post, User};
use scribe_core::error::RepoError;
use scribe_core::pagination::{Page, PageRequest};
use scribe_core::ports::{
    BaseRepository, CommentRepository, FollowRepository, GroupRepository, PostRepository,
    Repositories, UserRepository,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    groups: Vec<Group>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
}

/// A row type stored in [`Tables`].
trait Row: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
    fn rows(tables: &Tables) -> &Vec<Self>;
    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self>;

    /// Constraint checks run before `self` is written.
    fn check(&self, _tables: &Tables) -> Result<(), RepoError> {
        Ok(())
    }

    /// Fix up rows referencing a deleted `id`.
    fn on_delete(_tables: &mut Tables, _id: Uuid) {}
}

impl Row for User {
    fn id(&self) -> Uuid {
        self.id
    }

    fn rows(tables: &Tables) -> &Vec<Self> {
        &tables.users
    }

    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.users
    }

    fn check(&self, tables: &Tables) -> Result<(), RepoError> {
        if tables
            .users
            .iter()
            .any(|u| u.id != self.id && u.username == self.username)
        {
            return Err(RepoError::Constraint(format!(
                "username {} already exists",
                self.username
            )));
        }
        Ok(())
    }

    fn on_delete(tables: &mut Tables, id: Uuid) {
        let orphaned: Vec<Uuid> = tables
            .posts
            .iter()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        tables.posts.retain(|p| p.author_id != id);
        tables
            .comments
            .retain(|c| c.author_id != id && !orphaned.contains(&c.post_id));
        tables
            .follows
            .retain(|f| f.user_id != id && f.author_id != id);
    }
}

impl Row for Group {
    fn id(&self) -> Uuid {
        self.id
    }

    fn rows(tables: &Tables) -> &Vec<Self> {
        &tables.groups
    }

    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.groups
    }

    fn check(&self, tables: &Tables) -> Result<(), RepoError> {
        if tables
            .groups
            .iter()
            .any(|g| g.id != self.id && g.slug == self.slug)
        {
            return Err(RepoError::Constraint(format!(
                "group slug {} already exists",
                self.slug
            )));
        }
        Ok(())
    }

    fn on_delete(tables: &mut Tables, id: Uuid) {
        for post in tables.posts.iter_mut().filter(|p| p.group_id == Some(id)) {
            post.group_id = None;
        }
    }
}

impl Row for Post {
    fn id(&self) -> Uuid {
        self.id
    }

    fn rows(tables: &Tables) -> &Vec<Self> {
        &tables.posts
    }

    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.posts
    }

    fn check(&self, tables: &Tables) -> Result<(), RepoError> {
        if !tables.users.iter().any(|u| u.id == self.author_id) {
            return Err(RepoError::Constraint(format!(
                "author {} does not exist",
                self.author_id
            )));
        }
        if let Some(group_id) = self.group_id {
            if !tables.groups.iter().any(|g| g.id == group_id) {
                return Err(RepoError::Constraint(format!(
                    "group {group_id} does not exist"
                )));
            }
        }
        Ok(())
    }

    fn on_delete(tables: &mut Tables, id: Uuid) {
        tables.comments.retain(|c| c.post_id != id);
    }
}

impl Row for Comment {
    fn id(&self) -> Uuid {
        self.id
    }

    fn rows(tables: &Tables) -> &Vec<Self> {
        &tables.comments
    }

    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.comments
    }

    fn check(&self, tables: &Tables) -> Result<(), RepoError> {
        if !tables.posts.iter().any(|p| p.id == self.post_id) {
            return Err(RepoError::Constraint(format!(
                "post {} does not exist",
                self.post_id
            )));
        }
        if !tables.users.iter().any(|u| u.id == self.author_id) {
            return Err(RepoError::Constraint(format!(
                "author {} does not exist",
                self.author_id
            )));
        }
        Ok(())
    }
}

/// Repositories backed by process memory.
#[derive(Default)]
pub struct InMemoryDatabase {
    tables: RwLock<Tables>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out every repository, all sharing this store.
    pub fn into_repositories(self: Arc<Self>) -> Repositories {
        Repositories {
            users: self.clone(),
            groups: self.clone(),
            posts: self.clone(),
            comments: self.clone(),
            follows: self,
        }
    }

    async fn find_row<T: Row>(&self, id: Uuid) -> Option<T> {
        let tables = self.tables.read().await;
        T::rows(&tables).iter().find(|r| r.id() == id).cloned()
    }

    async fn insert_row<T: Row>(&self, row: T) -> Result<T, RepoError> {
        let mut tables = self.tables.write().await;

        if T::rows(&tables).iter().any(|r| r.id() == row.id()) {
            return Err(RepoError::Constraint(format!("id {} already exists", row.id())));
        }
        row.check(&tables)?;

        T::rows_mut(&mut tables).push(row.clone());
        Ok(row)
    }

    async fn update_row<T: Row>(&self, row: T) -> Result<T, RepoError> {
        let mut tables = self.tables.write().await;
        row.check(&tables)?;

        let slot = T::rows_mut(&mut tables)
            .iter_mut()
            .find(|r| r.id() == row.id())
            .ok_or(RepoError::NotFound)?;
        *slot = row.clone();

        Ok(row)
    }

    async fn delete_row<T: Row>(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;

        let rows = T::rows_mut(&mut tables);
        let before = rows.len();
        rows.retain(|r| r.id() != id);
        if rows.len() == before {
            return Err(RepoError::NotFound);
        }

        T::on_delete(&mut tables, id);
        Ok(())
    }

    /// Posts matching `keep`, newest first, cut to the requested page.
    async fn page_posts(
        &self,
        page: PageRequest,
        keep: impl Fn(&Post) -> bool,
    ) -> Page<Post> {
        let tables = self.tables.read().await;

        // Later inserts win ties on pub_date, as they would on a time-ordered id.
        let mut posts: Vec<Post> = tables
            .posts
            .iter()
            .rev()
            .filter(|p| keep(*p))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));

        page.slice(posts)
    }
}

macro_rules! memory_base_repository {
    ($($row:ty),+ $(,)?) => {
        $(
            #[async_trait]
            impl BaseRepository<$row, Uuid> for InMemoryDatabase {
                async fn find_by_id(&self, id: Uuid) -> Result<Option<$row>, RepoError> {
                    Ok(self.find_row(id).await)
                }

                async fn insert(&self, entity: $row) -> Result<$row, RepoError> {
                    self.insert_row(entity).await
                }

                async fn update(&self, entity: $row) -> Result<$row, RepoError> {
                    self.update_row(entity).await
                }

                async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
                    self.delete_row::<$row>(id).await
                }
            }
        )+
    };
}

memory_base_repository!(User, Group, Post, Comment);

#[async_trait]
impl UserRepository for InMemoryDatabase {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl GroupRepository for InMemoryDatabase {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.groups.iter().find(|g| g.slug == slug).cloned())
    }

    async fn list(&self) -> Result<Vec<Group>, RepoError> {
        let tables = self.tables.read().await;
        let mut groups = tables.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Group>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .groups
            .iter()
            .filter(|g| ids.contains(&g.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PostRepository for InMemoryDatabase {
    async fn page_all(&self, page: PageRequest) -> Result<Page<Post>, RepoError> {
        Ok(self.page_posts(page, |_| true).await)
    }

    async fn page_by_group(
        &self,
        group_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        Ok(self
            .page_posts(page, |p| p.group_id == Some(group_id))
            .await)
    }

    async fn page_by_author(
        &self,
        author_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        Ok(self.page_posts(page, |p| p.author_id == author_id).await)
    }

    async fn page_followed_by(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        let followed: Vec<Uuid> = {
            let tables = self.tables.read().await;
            tables
                .follows
                .iter()
                .filter(|f| f.user_id == user_id)
                .map(|f| f.author_id)
                .collect()
        };

        Ok(self
            .page_posts(page, |p| followed.contains(&p.author_id))
            .await)
    }

    async fn count_by_author(&self, author_id: Uuid) -> Result<u64, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .filter(|p| p.author_id == author_id)
            .count() as u64)
    }
}

#[async_trait]
impl CommentRepository for InMemoryDatabase {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let tables = self.tables.read().await;

        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .rev()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));

        Ok(comments)
    }
}

#[async_trait]
impl FollowRepository for InMemoryDatabase {
    async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.tables.write().await;

        for id in [user_id, author_id] {
            if !tables.users.iter().any(|u| u.id == id) {
                return Err(RepoError::Constraint(format!("user {id} does not exist")));
            }
        }

        if tables
            .follows
            .iter()
            .any(|f| f.user_id == user_id && f.author_id == author_id)
        {
            return Ok(false);
        }

        tables.follows.push(Follow::new(user_id, author_id));
        Ok(true)
    }

    async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.tables.write().await;

        let before = tables.follows.len();
        tables
            .follows
            .retain(|f| !(f.user_id == user_id && f.author_id == author_id));

        Ok(tables.follows.len() < before)
    }

    async fn exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .any(|f| f.user_id == user_id && f.author_id == author_id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};

    use super::*;

    async fn seeded() -> (InMemoryDatabase, User, User) {
        let db = InMemoryDatabase::new();
        let author = db.insert(User::new("author", "hash")).await.unwrap();
        let reader = db.insert(User::new("reader", "hash")).await.unwrap();
        (db, author, reader)
    }

    #[tokio::test]
    async fn test_duplicate_username_is_a_constraint_violation() {
        let (db, _, _) = seeded().await;

        let result = db.insert(User::new("author", "other")).await;

        assert!(matches!(result, Err(RepoError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_post_requires_existing_author() {
        let db = InMemoryDatabase::new();

        let result = db.insert(Post::new(Uuid::new_v4(), "orphan", None)).await;

        assert!(matches!(result, Err(RepoError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_posts_are_listed_newest_first() {
        let (db, author, _) = seeded().await;
        let now = Utc::now();

        let mut older = Post::new(author.id, "older", None);
        older.pub_date = now - TimeDelta::hours(1);
        let newer = Post::new(author.id, "newer", None);
        // Inserted out of order on purpose.
        db.insert(newer.clone()).await.unwrap();
        db.insert(older.clone()).await.unwrap();

        let page = db.page_all(PageRequest::first(10)).await.unwrap();
        let texts: Vec<&str> = page.items.iter().map(|p| p.text.as_str()).collect();

        assert_eq!(texts, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn test_follow_is_unique_per_pair() {
        let (db, author, reader) = seeded().await;

        assert!(db.follow(reader.id, author.id).await.unwrap());
        assert!(!db.follow(reader.id, author.id).await.unwrap());
        assert!(db.exists(reader.id, author.id).await.unwrap());
        assert!(!db.exists(author.id, reader.id).await.unwrap());

        assert!(db.unfollow(reader.id, author.id).await.unwrap());
        assert!(!db.unfollow(reader.id, author.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_deleting_group_keeps_its_posts() {
        let (db, author, _) = seeded().await;
        let group = db.insert(Group::new("Cats", "cats", "")).await.unwrap();
        let post = db
            .insert(Post::new(author.id, "in a group", Some(group.id)))
            .await
            .unwrap();

        BaseRepository::<Group, Uuid>::delete(&db, group.id).await.unwrap();

        let post: Post = db.find_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(post.group_id, None);
    }

    #[tokio::test]
    async fn test_deleting_post_removes_comments() {
        let (db, author, reader) = seeded().await;
        let post = db.insert(Post::new(author.id, "text", None)).await.unwrap();
        db.insert(Comment::new(post.id, reader.id, "nice"))
            .await
            .unwrap();

        BaseRepository::<Post, Uuid>::delete(&db, post.id).await.unwrap();

        assert!(db.list_for_post(post.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let (db, author, _) = seeded().await;

        let result = db.update(Post::new(author.id, "never stored", None)).await;

        assert!(matches!(result, Err(RepoError::NotFound)));
    }
}
