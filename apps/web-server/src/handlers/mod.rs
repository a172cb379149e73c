//! HTTP handlers and route configuration.

mod about;
mod auth;
mod errors;
mod follow;
mod forms;
mod health;
mod posts;
mod views;

#[cfg(test)]
mod tests;

use actix_multipart::form::MultipartFormConfig;
use actix_web::web;

pub use errors::not_found;

/// Largest accepted post submission, image included.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(errors::path_config())
        .app_data(
            MultipartFormConfig::default()
                .total_limit(MAX_UPLOAD_BYTES)
                .memory_limit(MAX_UPLOAD_BYTES),
        )
        // Feeds
        .route("/", web::get().to(posts::index))
        .route("/group/{slug}/", web::get().to(posts::group_posts))
        .route("/profile/{username}/", web::get().to(posts::profile))
        .route("/follow/", web::get().to(follow::follow_index))
        .route(
            "/profile/{username}/follow/",
            web::get().to(follow::profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            web::get().to(follow::profile_unfollow),
        )
        // Posts
        .service(
            web::resource("/create/")
                .route(web::get().to(posts::post_create_form))
                .route(web::post().to(posts::post_create)),
        )
        .route("/posts/{post_id}/", web::get().to(posts::post_detail))
        .service(
            web::resource("/posts/{post_id}/edit/")
                .route(web::get().to(posts::post_edit_form))
                .route(web::post().to(posts::post_edit)),
        )
        .route(
            "/posts/{post_id}/comment/",
            web::post().to(posts::add_comment),
        )
        // Accounts
        .service(
            web::scope("/auth")
                .service(
                    web::resource("/signup/")
                        .route(web::get().to(auth::signup_form))
                        .route(web::post().to(auth::signup)),
                )
                .service(
                    web::resource("/login/")
                        .route(web::get().to(auth::login_form))
                        .route(web::post().to(auth::login)),
                )
                .service(
                    web::resource("/logout/")
                        .route(web::get().to(auth::logout))
                        .route(web::post().to(auth::logout)),
                ),
        )
        // Static pages
        .route("/about/author/", web::get().to(about::author))
        .route("/about/tech/", web::get().to(about::tech))
        .route("/health/", web::get().to(health::health_check));
}
