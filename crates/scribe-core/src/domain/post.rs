use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Group, User, preview};

/// Post entity - a blog entry, optionally filed under a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    pub text: String,
    /// Public URL of the attached image.
    pub image: Option<String>,
    pub pub_date: DateTime<Utc>,
}

impl Post {
    /// Create a new post stamped with the current time.
    pub fn new(author_id: Uuid, text: impl Into<String>, group_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            group_id,
            text: text.into(),
            image: None,
            pub_date: Utc::now(),
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(preview(&self.text))
    }
}

/// The user-editable part of a post, as submitted through the post form.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    pub group_id: Option<Uuid>,
    /// Public URL of a freshly stored image; `None` keeps the current one on edit.
    pub image: Option<String>,
}

/// A post together with the records it references, ready for display.
#[derive(Debug, Clone)]
pub struct PostEntry {
    pub post: Post,
    pub author: User,
    pub group: Option<Group>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_first_fifteen_characters() {
        let post = Post::new(Uuid::new_v4(), "Тестовый пост контент", None);
        assert_eq!(post.to_string(), "Тестовый пост к");
    }

    #[test]
    fn group_display_is_title() {
        let group = Group::new("Тестовая группа", "test", "Описание");
        assert_eq!(group.to_string(), "Тестовая группа");
    }
}
