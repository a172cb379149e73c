//! Static "about" pages.

use actix_web::HttpResponse;

use scribe_shared::dto::AboutPage;

/// GET /about/author/
pub async fn author() -> HttpResponse {
    HttpResponse::Ok().json(AboutPage {
        title: "About the author".to_string(),
        text: "Scribe is written and maintained by its authors as a small community blog."
            .to_string(),
    })
}

/// GET /about/tech/
pub async fn tech() -> HttpResponse {
    HttpResponse::Ok().json(AboutPage {
        title: "Technologies".to_string(),
        text: "Rust, actix-web, SeaORM on PostgreSQL, Redis for page caching.".to_string(),
    })
}
