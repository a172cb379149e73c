//! Domain entities - the core business objects.

mod comment;
mod follow;
mod group;
mod post;
mod user;

pub use comment::{Comment, CommentEntry};
pub use follow::Follow;
pub use group::Group;
pub use post::{Post, PostDraft, PostEntry};
pub use user::User;

/// Number of characters shown when a post or comment is displayed inline.
pub const PREVIEW_CHARS: usize = 15;

/// Leading slice of `text` holding at most [`PREVIEW_CHARS`] characters.
pub(crate) fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_character_based() {
        assert_eq!(preview("short"), "short");
        assert_eq!(preview("Тестовый пост контент"), "Тестовый пост к");
        assert_eq!(preview("Тестовый пост к").chars().count(), PREVIEW_CHARS);
    }
}
