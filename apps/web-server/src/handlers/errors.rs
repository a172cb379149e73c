//! Error pages for requests that never reach a handler.

use actix_web::{HttpRequest, HttpResponse, error, web};

use scribe_shared::ErrorResponse;

/// Fallback for unknown routes.
pub async fn not_found(req: HttpRequest) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::not_found(req.path()))
}

/// Path parameters that fail to parse (e.g. a post id that is not a UUID)
/// name no page, so they get the same 404.
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, req| {
        let response = HttpResponse::NotFound().json(ErrorResponse::not_found(req.path()));
        error::InternalError::from_response(err, response).into()
    })
}
