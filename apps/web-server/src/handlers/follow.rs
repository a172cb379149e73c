//! Subscriptions: the follow feed and follow/unfollow actions.

use actix_web::{HttpResponse, web};

use scribe_shared::dto::PageQuery;

use super::posts::redirect;
use super::views;
use crate::middleware::auth::Identity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

const FOLLOW_FEED: &str = "/follow/";

/// GET /follow/ - posts by everyone the viewer follows.
pub async fn follow_index(
    state: web::Data<AppState>,
    identity: Identity,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let request = state.feed.page_request(query.page.as_deref());
    let page = state.feed.follow_feed(identity.user_id, request).await?;

    Ok(HttpResponse::Ok().json(views::posts(page)))
}

/// GET /profile/{username}/follow/
pub async fn profile_follow(
    state: web::Data<AppState>,
    identity: Identity,
    username: web::Path<String>,
) -> AppResult<HttpResponse> {
    state.follows.follow(identity.user_id, &username).await?;
    Ok(redirect(FOLLOW_FEED))
}

/// GET /profile/{username}/unfollow/
pub async fn profile_unfollow(
    state: web::Data<AppState>,
    identity: Identity,
    username: web::Path<String>,
) -> AppResult<HttpResponse> {
    state.follows.unfollow(identity.user_id, &username).await?;
    Ok(redirect(FOLLOW_FEED))
}
