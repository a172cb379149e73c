//! Domain read models to response bodies.

use scribe_core::Page;
use scribe_core::domain::{CommentEntry, Group, PostEntry, User};
use scribe_shared::dto::{
    AuthorResponse, CommentResponse, GroupResponse, PageResponse, PostResponse,
};

pub fn author(user: &User) -> AuthorResponse {
    AuthorResponse {
        username: user.username.clone(),
        full_name: user.full_name(),
    }
}

pub fn group(group: &Group) -> GroupResponse {
    GroupResponse {
        id: group.id,
        title: group.title.clone(),
        slug: group.slug.clone(),
        description: group.description.clone(),
    }
}

pub fn post(entry: PostEntry) -> PostResponse {
    PostResponse {
        id: entry.post.id,
        author: author(&entry.author),
        group: entry.group.as_ref().map(group),
        text: entry.post.text,
        image: entry.post.image,
        pub_date: entry.post.pub_date,
    }
}

pub fn comment(entry: CommentEntry) -> CommentResponse {
    CommentResponse {
        id: entry.comment.id,
        author: author(&entry.author),
        text: entry.comment.text,
        pub_date: entry.comment.pub_date,
    }
}

pub fn posts(page: Page<PostEntry>) -> PageResponse<PostResponse> {
    let has_next = page.has_next();
    let has_previous = page.has_previous();
    let page = page.map(post);

    PageResponse {
        number: page.number,
        num_pages: page.num_pages,
        count: page.total,
        has_next,
        has_previous,
        items: page.items,
    }
}
