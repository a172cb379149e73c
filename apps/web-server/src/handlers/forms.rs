//! Post form submissions: urlencoded, or multipart with an optional image.

use actix_multipart::form::{MultipartForm, bytes::Bytes as FilePart, text::Text};
use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header, web};
use futures::future::LocalBoxFuture;
use uuid::Uuid;

use scribe_core::domain::PostDraft;
use scribe_shared::FormErrors;
use scribe_shared::dto::PostForm;

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Directory under the media root that post images go to.
const POST_IMAGE_DIR: &str = "posts";

#[derive(MultipartForm)]
pub struct PostMultipart {
    text: Option<Text<String>>,
    group: Option<Text<String>>,
    image: Option<FilePart>,
}

/// A submitted post form, before validation.
pub struct PostSubmission {
    pub form: PostForm,
    /// Raw bytes of the uploaded image. Empty file parts count as no upload.
    pub image: Option<Vec<u8>>,
}

impl From<PostMultipart> for PostSubmission {
    fn from(upload: PostMultipart) -> Self {
        Self {
            form: PostForm {
                text: upload.text.map(|t| t.0).unwrap_or_default(),
                group: upload.group.map(|t| t.0),
            },
            image: upload
                .image
                .map(|part| part.data.to_vec())
                .filter(|data| !data.is_empty()),
        }
    }
}

impl FromRequest for PostSubmission {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if is_multipart {
            let fut = MultipartForm::<PostMultipart>::from_request(req, payload);
            Box::pin(async move {
                let MultipartForm(upload) = fut.await?;
                Ok(upload.into())
            })
        } else {
            let fut = web::Form::<PostForm>::from_request(req, payload);
            Box::pin(async move {
                let web::Form(form) = fut.await?;
                Ok(Self { form, image: None })
            })
        }
    }
}

/// A draft ready for the post service, plus the storage key of any image it
/// stored so the upload can be dropped if the save fails.
pub struct ValidDraft {
    pub draft: PostDraft,
    pub stored_image: Option<String>,
}

/// Validate a submission and store its image.
///
/// `Ok(Err(..))` hands back the normalized form and its errors for re-rendering.
pub async fn read_draft(
    state: &AppState,
    submission: PostSubmission,
) -> AppResult<Result<ValidDraft, (PostForm, FormErrors)>> {
    let form = submission.form.normalized();
    let mut errors = FormErrors::validate(&form);

    let group_id = form.group_id().unwrap_or_else(|_| {
        errors.add("group", INVALID_CHOICE);
        None
    });

    let image = match submission.image {
        Some(data) => match image::guess_format(&data) {
            Ok(format) => Some((format, data)),
            Err(_) => {
                errors.add("image", INVALID_IMAGE);
                None
            }
        },
        None => None,
    };

    if !errors.is_empty() {
        return Ok(Err((form, errors)));
    }

    let (image_url, stored_image) = match image {
        Some((format, data)) => {
            let extension = format.extensions_str().first().copied().unwrap_or("bin");
            let key = format!("{POST_IMAGE_DIR}/{}.{extension}", Uuid::new_v4());
            let url = state
                .media
                .store(&key, &data)
                .await
                .map_err(|e| AppError::Internal(format!("storing image: {e}")))?;
            (Some(url), Some(key))
        }
        None => (None, None),
    };

    Ok(Ok(ValidDraft {
        draft: PostDraft {
            text: form.text,
            group_id,
            image: image_url,
        },
        stored_image,
    }))
}

/// Best-effort removal of an upload whose post was never saved.
pub async fn discard_image(state: &AppState, key: Option<String>) {
    if let Some(key) = key {
        if let Err(e) = state.media.delete(&key).await {
            tracing::warn!(%key, error = %e, "Failed to remove orphaned upload");
        }
    }
}
