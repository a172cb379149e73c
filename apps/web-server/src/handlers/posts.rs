//! Post listings, detail, authoring and comments.

use actix_web::{HttpResponse, http::StatusCode, http::header, web};
use uuid::Uuid;

use scribe_core::DomainError;
use scribe_shared::FormErrors;
use scribe_shared::dto::{
    CommentForm, GroupPage, PageQuery, PostDetailPage, PostForm, PostFormPage, ProfilePage,
};

use super::forms::{PostSubmission, ValidDraft, discard_image, read_draft};
use super::views;
use crate::middleware::auth::{Identity, OptionalIdentity};
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

pub(crate) fn redirect(location: impl Into<String>) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.into()))
        .finish()
}

fn detail_url(post_id: Uuid) -> String {
    format!("/posts/{post_id}/")
}

/// GET / - every post, newest first. Pages are served from the index cache.
pub async fn index(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let request = state.feed.page_request(query.page.as_deref());
    let cache_key = state.index_cache.key(&request.number().to_string()).await;

    if let Some(body) = state.index_cache.get(&cache_key).await {
        return Ok(HttpResponse::Ok()
            .content_type(header::ContentType::json())
            .body(body));
    }

    let page = views::posts(state.feed.index(request).await?);
    let body = serde_json::to_string(&page).map_err(|e| AppError::Internal(e.to_string()))?;
    state.index_cache.put(&cache_key, &body).await;

    Ok(HttpResponse::Ok()
        .content_type(header::ContentType::json())
        .body(body))
}

/// GET /group/{slug}/
pub async fn group_posts(
    state: web::Data<AppState>,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let request = state.feed.page_request(query.page.as_deref());
    let feed = state.feed.group_feed(&slug, request).await?;

    Ok(HttpResponse::Ok().json(GroupPage {
        group: views::group(&feed.group),
        page: views::posts(feed.page),
    }))
}

/// GET /profile/{username}/
pub async fn profile(
    state: web::Data<AppState>,
    viewer: OptionalIdentity,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let request = state.feed.page_request(query.page.as_deref());
    let profile = state
        .feed
        .profile(&username, viewer.user_id(), request)
        .await?;

    Ok(HttpResponse::Ok().json(ProfilePage {
        author: views::author(&profile.author),
        count: profile.post_count,
        following: profile.following,
        page: views::posts(profile.page),
    }))
}

/// GET /posts/{id}/
pub async fn post_detail(
    state: web::Data<AppState>,
    post_id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let detail = state.feed.post_detail(post_id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(PostDetailPage {
        post: views::post(detail.entry),
        count: detail.author_post_count,
        comments: detail.comments.into_iter().map(views::comment).collect(),
        comment_form: CommentForm::default(),
    }))
}

/// POST /posts/{id}/comment/ - always lands back on the post.
pub async fn add_comment(
    state: web::Data<AppState>,
    identity: Identity,
    post_id: web::Path<Uuid>,
    form: web::Form<CommentForm>,
) -> AppResult<HttpResponse> {
    let post_id = post_id.into_inner();

    match state
        .posts
        .add_comment(identity.user_id, post_id, &form.text)
        .await
    {
        Ok(_) => {}
        Err(DomainError::Validation { field, message }) => {
            tracing::debug!(%post_id, field, %message, "Comment rejected");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(redirect(detail_url(post_id)))
}

async fn form_page(
    state: &AppState,
    status: StatusCode,
    post_id: Option<Uuid>,
    form: PostForm,
    errors: FormErrors,
) -> AppResult<HttpResponse> {
    let groups = state.groups.list().await?;

    Ok(HttpResponse::build(status).json(PostFormPage {
        is_edit: post_id.is_some(),
        post_id,
        form,
        errors,
        groups: groups.iter().map(views::group).collect(),
    }))
}

/// A rejected draft goes back to the author with the offending field marked.
fn rejected_field(err: DomainError) -> Result<FormErrors, AppError> {
    match err {
        DomainError::Validation { field, message } => Ok(FormErrors::single(field, message)),
        other => Err(other.into()),
    }
}

/// GET /create/
pub async fn post_create_form(
    state: web::Data<AppState>,
    _identity: Identity,
) -> AppResult<HttpResponse> {
    form_page(&state, StatusCode::OK, None, PostForm::default(), FormErrors::new()).await
}

/// POST /create/ - on success, redirect to the author's profile.
pub async fn post_create(
    state: web::Data<AppState>,
    identity: Identity,
    submission: PostSubmission,
) -> AppResult<HttpResponse> {
    let ValidDraft {
        draft,
        stored_image,
    } = match read_draft(&state, submission).await? {
        Ok(valid) => valid,
        Err((form, errors)) => {
            return form_page(&state, StatusCode::UNPROCESSABLE_ENTITY, None, form, errors).await;
        }
    };

    let form = PostForm {
        text: draft.text.clone(),
        group: draft.group_id.map(|id| id.to_string()),
    };

    match state.posts.create(identity.user_id, draft).await {
        Ok(_) => Ok(redirect(format!("/profile/{}/", identity.username))),
        Err(err) => {
            discard_image(&state, stored_image).await;
            let errors = rejected_field(err)?;
            form_page(&state, StatusCode::UNPROCESSABLE_ENTITY, None, form, errors).await
        }
    }
}

/// GET /posts/{id}/edit/ - anyone but the author is sent back to the post.
pub async fn post_edit_form(
    state: web::Data<AppState>,
    identity: Identity,
    post_id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let post_id = post_id.into_inner();

    let post = match state.posts.editable(identity.user_id, post_id).await {
        Ok(post) => post,
        Err(DomainError::Unauthorized) => return Ok(redirect(detail_url(post_id))),
        Err(e) => return Err(e.into()),
    };

    let form = PostForm {
        text: post.text,
        group: post.group_id.map(|id| id.to_string()),
    };
    form_page(&state, StatusCode::OK, Some(post_id), form, FormErrors::new()).await
}

/// POST /posts/{id}/edit/
pub async fn post_edit(
    state: web::Data<AppState>,
    identity: Identity,
    post_id: web::Path<Uuid>,
    submission: PostSubmission,
) -> AppResult<HttpResponse> {
    let post_id = post_id.into_inner();

    match state.posts.editable(identity.user_id, post_id).await {
        Ok(_) => {}
        Err(DomainError::Unauthorized) => return Ok(redirect(detail_url(post_id))),
        Err(e) => return Err(e.into()),
    }

    let ValidDraft {
        draft,
        stored_image,
    } = match read_draft(&state, submission).await? {
        Ok(valid) => valid,
        Err((form, errors)) => {
            return form_page(
                &state,
                StatusCode::UNPROCESSABLE_ENTITY,
                Some(post_id),
                form,
                errors,
            )
            .await;
        }
    };

    let form = PostForm {
        text: draft.text.clone(),
        group: draft.group_id.map(|id| id.to_string()),
    };

    match state.posts.edit(identity.user_id, post_id, draft).await {
        Ok(_) => Ok(redirect(detail_url(post_id))),
        Err(err) => {
            discard_image(&state, stored_image).await;
            let errors = rejected_field(err)?;
            form_page(
                &state,
                StatusCode::UNPROCESSABLE_ENTITY,
                Some(post_id),
                form,
                errors,
            )
            .await
        }
    }
}
