use actix_web::{
    App,
    cookie::Cookie,
    http::{StatusCode, header},
    middleware::ErrorHandlers,
    test, web,
};
use serde_json::Value;
use uuid::Uuid;

use scribe_core::domain::{Group, PostDraft, User};

use super::{configure_routes, not_found};
use crate::middleware::auth::SESSION_COOKIE;
use crate::middleware::csrf::CsrfGuard;
use crate::middleware::error::render_internal_error;
use crate::observability::RequestIdMiddleware;
use crate::state::AppState;

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .wrap(
                    ErrorHandlers::new()
                        .handler(StatusCode::INTERNAL_SERVER_ERROR, render_internal_error),
                )
                .wrap(CsrfGuard)
                .wrap(RequestIdMiddleware)
                .app_data(web::Data::new($state.clone()))
                .configure(configure_routes)
                .default_service(web::to(not_found)),
        )
        .await
    };
}

const PASSWORD: &str = "correct-horse-battery";

fn test_state() -> AppState {
    let media_root = std::env::temp_dir().join(format!("scribe-web-{}", Uuid::new_v4()));
    AppState::in_memory(media_root)
}

async fn add_user(state: &AppState, username: &str) -> User {
    let hash = state.passwords.hash(PASSWORD).unwrap();
    state
        .users
        .insert(User::new(username, hash).with_names("Test", "User"))
        .await
        .unwrap()
}

async fn add_group(state: &AppState, slug: &str) -> Group {
    state
        .groups
        .insert(Group::new(format!("Group {slug}"), slug, "Test group"))
        .await
        .unwrap()
}

async fn add_posts(
    state: &AppState,
    author: &User,
    group: Option<&Group>,
    n: usize,
) -> Vec<Uuid> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let draft = PostDraft {
            text: format!("Post number {i}"),
            group_id: group.map(|g| g.id),
            image: None,
        };
        ids.push(state.posts.create(author.id, draft).await.unwrap().id);
    }
    ids
}

fn bearer(state: &AppState, user: &User) -> (header::HeaderName, String) {
    let token = state.tokens.generate_token(user.id, &user.username).unwrap();
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

fn location<B>(resp: &actix_web::dev::ServiceResponse<B>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[actix_rt::test]
async fn index_paginates_by_ten() {
    let state = test_state();
    let author = add_user(&state, "leo").await;
    add_posts(&state, &author, None, 13).await;
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/").to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(first["items"].as_array().unwrap().len(), 10);
    assert_eq!(first["count"], 13);
    assert_eq!(first["num_pages"], 2);
    assert_eq!(first["has_next"], true);

    let req = test::TestRequest::get().uri("/?page=2").to_request();
    let second: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(second["items"].as_array().unwrap().len(), 3);
    assert_eq!(second["has_previous"], true);

    let req = test::TestRequest::get().uri("/?page=99").to_request();
    let clamped: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(clamped["number"], 2);
}

#[actix_rt::test]
async fn group_and_profile_pages_paginate_their_own_posts() {
    let state = test_state();
    let author = add_user(&state, "leo").await;
    let group = add_group(&state, "cats").await;
    let other = add_group(&state, "dogs").await;
    add_posts(&state, &author, Some(&group), 13).await;
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/group/cats/").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["group"]["slug"], "cats");
    assert_eq!(page["page"]["items"].as_array().unwrap().len(), 10);

    let req = test::TestRequest::get().uri("/group/cats/?page=2").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["page"]["items"].as_array().unwrap().len(), 3);

    let req = test::TestRequest::get()
        .uri(&format!("/group/{}/", other.slug))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["page"]["count"], 0);

    let req = test::TestRequest::get().uri("/profile/leo/?page=2").to_request();
    let profile: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(profile["author"]["username"], "leo");
    assert_eq!(profile["count"], 13);
    assert_eq!(profile["following"], false);
    assert_eq!(profile["page"]["items"].as_array().unwrap().len(), 3);
}

#[actix_rt::test]
async fn unknown_pages_are_not_found() {
    let state = test_state();
    let app = test_app!(state);

    for uri in [
        "/unexisting_page/",
        "/group/nope/",
        "/profile/nobody/",
        "/posts/not-a-uuid/",
    ] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }

    let req = test::TestRequest::get()
        .uri(&format!("/posts/{}/", Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/unexisting_page/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], 404);
    assert_eq!(body["instance"], "/unexisting_page/");
}

#[actix_rt::test]
async fn static_pages_respond() {
    let state = test_state();
    let app = test_app!(state);

    for uri in ["/about/author/", "/about/tech/", "/health/"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        assert!(resp.headers().contains_key("x-request-id"));
    }
}

#[actix_rt::test]
async fn guests_are_sent_to_login() {
    let state = test_state();
    let author = add_user(&state, "leo").await;
    let post_id = add_posts(&state, &author, None, 1).await[0];
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/create/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/auth/login/?next=%2Fcreate%2F");

    let req = test::TestRequest::get()
        .uri(&format!("/posts/{post_id}/edit/"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(
        location(&resp),
        format!("/auth/login/?next=%2Fposts%2F{post_id}%2Fedit%2F")
    );

    let req = test::TestRequest::get().uri("/follow/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/auth/login/?next=%2Ffollow%2F");
}

#[actix_rt::test]
async fn guest_comment_is_not_saved() {
    let state = test_state();
    let author = add_user(&state, "leo").await;
    let post_id = add_posts(&state, &author, None, 1).await[0];
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri(&format!("/posts/{post_id}/comment/"))
        .set_form(&[("text", "Nice post")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        location(&resp),
        format!("/auth/login/?next=%2Fposts%2F{post_id}%2Fcomment%2F")
    );

    let req = test::TestRequest::get()
        .uri(&format!("/posts/{post_id}/"))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert!(detail["comments"].as_array().unwrap().is_empty());
}

#[actix_rt::test]
async fn comments_appear_on_the_post() {
    let state = test_state();
    let author = add_user(&state, "leo").await;
    let reader = add_user(&state, "reader").await;
    let ids = add_posts(&state, &author, None, 2).await;
    let (post_id, other_id) = (ids[0], ids[1]);
    let app = test_app!(state);

    for text in ["First", "   ", "Second"] {
        let req = test::TestRequest::post()
            .uri(&format!("/posts/{post_id}/comment/"))
            .insert_header(bearer(&state, &reader))
            .set_form(&[("text", text)])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), format!("/posts/{post_id}/"));
    }

    let req = test::TestRequest::get()
        .uri(&format!("/posts/{post_id}/"))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    let comments = detail["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["text"], "Second");
    assert_eq!(comments[0]["author"]["username"], "reader");
    assert_eq!(detail["count"], 2);

    let req = test::TestRequest::get()
        .uri(&format!("/posts/{other_id}/"))
        .to_request();
    let other: Value = test::call_and_read_body_json(&app, req).await;
    assert!(other["comments"].as_array().unwrap().is_empty());

    let missing = Uuid::new_v4();
    let req = test::TestRequest::post()
        .uri(&format!("/posts/{missing}/comment/"))
        .insert_header(bearer(&state, &reader))
        .set_form(&[("text", "Lost")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // A blank comment is dropped before the post is looked up.
    let req = test::TestRequest::post()
        .uri(&format!("/posts/{missing}/comment/"))
        .insert_header(bearer(&state, &reader))
        .set_form(&[("text", " ")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{missing}/"));
}

#[actix_rt::test]
async fn create_post_redirects_to_profile_and_refreshes_index() {
    let state = test_state();
    let author = add_user(&state, "leo").await;
    let group = add_group(&state, "cats").await;
    add_posts(&state, &author, None, 2).await;
    let app = test_app!(state);

    // Warm the cache.
    let req = test::TestRequest::get().uri("/").to_request();
    let before: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(before["count"], 2);

    let group_id = group.id.to_string();
    let req = test::TestRequest::post()
        .uri("/create/")
        .insert_header(bearer(&state, &author))
        .set_form(&[("text", "Fresh post"), ("group", group_id.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/profile/leo/");

    let req = test::TestRequest::get().uri("/").to_request();
    let after: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(after["count"], 3);
    assert_eq!(after["items"][0]["text"], "Fresh post");
    assert_eq!(after["items"][0]["group"]["slug"], "cats");

    let req = test::TestRequest::get().uri("/group/cats/").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["page"]["count"], 1);
}

#[actix_rt::test]
async fn invalid_post_form_is_redisplayed() {
    let state = test_state();
    let author = add_user(&state, "leo").await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/create/")
        .insert_header(bearer(&state, &author))
        .set_form(&[("text", "  ")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["text"].is_array());
    assert_eq!(body["is_edit"], false);

    let unknown_group = Uuid::new_v4().to_string();
    let req = test::TestRequest::post()
        .uri("/create/")
        .insert_header(bearer(&state, &author))
        .set_form(&[("text", "Hello"), ("group", unknown_group.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["group"].is_array());
    assert_eq!(body["form"]["text"], "Hello");

    let req = test::TestRequest::get().uri("/").to_request();
    let index: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(index["count"], 0);
}

#[actix_rt::test]
async fn only_the_author_can_edit() {
    let state = test_state();
    let author = add_user(&state, "leo").await;
    let stranger = add_user(&state, "stranger").await;
    let post_id = add_posts(&state, &author, None, 1).await[0];
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri(&format!("/posts/{post_id}/edit/"))
        .insert_header(bearer(&state, &stranger))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{post_id}/"));

    let req = test::TestRequest::post()
        .uri(&format!("/posts/{post_id}/edit/"))
        .insert_header(bearer(&state, &stranger))
        .set_form(&[("text", "Hijacked")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), format!("/posts/{post_id}/"));

    let req = test::TestRequest::get()
        .uri(&format!("/posts/{post_id}/edit/"))
        .insert_header(bearer(&state, &author))
        .to_request();
    let form: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(form["is_edit"], true);
    assert_eq!(form["form"]["text"], "Post number 0");

    let req = test::TestRequest::post()
        .uri(&format!("/posts/{post_id}/edit/"))
        .insert_header(bearer(&state, &author))
        .set_form(&[("text", "Edited")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), format!("/posts/{post_id}/"));

    let req = test::TestRequest::get()
        .uri(&format!("/posts/{post_id}/"))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["post"]["text"], "Edited");
}

#[actix_rt::test]
async fn follow_feed_tracks_subscriptions() {
    let state = test_state();
    let author = add_user(&state, "leo").await;
    let follower = add_user(&state, "fan").await;
    let bystander = add_user(&state, "bystander").await;
    add_posts(&state, &author, None, 3).await;
    let app = test_app!(state);

    // Following twice leaves a single subscription.
    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/profile/leo/follow/")
            .insert_header(bearer(&state, &follower))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/follow/");
    }

    let req = test::TestRequest::get()
        .uri("/follow/")
        .insert_header(bearer(&state, &follower))
        .to_request();
    let feed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(feed["count"], 3);

    let req = test::TestRequest::get()
        .uri("/profile/leo/")
        .insert_header(bearer(&state, &follower))
        .to_request();
    let profile: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(profile["following"], true);

    let req = test::TestRequest::get()
        .uri("/follow/")
        .insert_header(bearer(&state, &bystander))
        .to_request();
    let feed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(feed["count"], 0);

    let req = test::TestRequest::get()
        .uri("/profile/leo/unfollow/")
        .insert_header(bearer(&state, &follower))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/follow/");

    let req = test::TestRequest::get()
        .uri("/follow/")
        .insert_header(bearer(&state, &follower))
        .to_request();
    let feed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(feed["count"], 0);
}

#[actix_rt::test]
async fn following_yourself_does_nothing() {
    let state = test_state();
    let author = add_user(&state, "leo").await;
    add_posts(&state, &author, None, 2).await;
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/profile/leo/follow/")
        .insert_header(bearer(&state, &author))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let req = test::TestRequest::get()
        .uri("/follow/")
        .insert_header(bearer(&state, &author))
        .to_request();
    let feed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(feed["count"], 0);
}

#[actix_rt::test]
async fn cross_site_cookie_posts_are_rejected() {
    let state = test_state();
    let author = add_user(&state, "leo").await;
    let token = state.tokens.generate_token(author.id, "leo").unwrap();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/create/")
        .cookie(Cookie::new(SESSION_COOKIE, token))
        .insert_header((header::ORIGIN, "http://evil.example"))
        .set_form(&[("text", "Forged")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Bearer tokens are not ambient, so the origin does not matter.
    let req = test::TestRequest::post()
        .uri("/create/")
        .insert_header(bearer(&state, &author))
        .insert_header((header::ORIGIN, "http://evil.example"))
        .set_form(&[("text", "Legit")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let req = test::TestRequest::get().uri("/").to_request();
    let index: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(index["count"], 1);
    assert_eq!(index["items"][0]["text"], "Legit");
}

#[actix_rt::test]
async fn signup_then_login_sets_session_cookie() {
    let state = test_state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/signup/")
        .set_form(&[
            ("username", "newbie"),
            ("first_name", "New"),
            ("last_name", "Bie"),
            ("email", "newbie@example.com"),
            ("password1", PASSWORD),
            ("password2", PASSWORD),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/");

    let req = test::TestRequest::post()
        .uri("/auth/signup/")
        .set_form(&[
            ("username", "newbie"),
            ("password1", PASSWORD),
            ("password2", PASSWORD),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/auth/login/")
        .set_form(&[("username", "newbie"), ("password", "wrong-password")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/auth/login/")
        .set_form(&[
            ("username", "newbie"),
            ("password", PASSWORD),
            ("next", "/create/"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/create/");
    let session = resp
        .response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .expect("session cookie");

    let req = test::TestRequest::get()
        .uri("/create/")
        .cookie(Cookie::new(SESSION_COOKIE, session))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/auth/logout/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/");
    let cleared = resp
        .response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .expect("removal cookie");
    assert_eq!(cleared.value(), "");
}

#[actix_rt::test]
async fn signup_rejects_bad_usernames_and_mismatched_passwords() {
    let state = test_state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/signup/")
        .set_form(&[
            ("username", "bad name!"),
            ("password1", PASSWORD),
            ("password2", "something-else"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["username"].is_array());
    assert!(body["errors"]["password2"].is_array());

    assert!(state.users.find_by_username("bad name!").await.unwrap().is_none());
}

fn multipart_body(boundary: &str, text: &str, image: &[u8], content_type: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\n{text}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"small.gif\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

#[actix_rt::test]
async fn image_upload_is_stored_and_linked() {
    let state = test_state();
    let author = add_user(&state, "leo").await;
    let app = test_app!(state);

    let boundary = "scribe-boundary";
    let req = test::TestRequest::post()
        .uri("/create/")
        .insert_header(bearer(&state, &author))
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(multipart_body(boundary, "With a picture", SMALL_GIF, "image/gif"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let req = test::TestRequest::get().uri("/").to_request();
    let index: Value = test::call_and_read_body_json(&app, req).await;
    let image = index["items"][0]["image"].as_str().unwrap();
    assert!(image.starts_with("/media/posts/"), "{image}");
    assert!(image.ends_with(".gif"), "{image}");

    let req = test::TestRequest::post()
        .uri("/create/")
        .insert_header(bearer(&state, &author))
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(multipart_body(
            boundary,
            "Not a picture",
            b"plain text pretending",
            "image/gif",
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["image"].is_array());
}
