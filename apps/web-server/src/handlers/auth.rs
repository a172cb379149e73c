//! Signup, login and logout.

use actix_web::{
    HttpResponse,
    cookie::{Cookie, SameSite, time::Duration},
    http::{StatusCode, header},
    web,
};

use scribe_core::RepoError;
use scribe_core::domain::User;
use scribe_shared::FormErrors;
use scribe_shared::dto::{AuthFormPage, LoginForm, NextQuery, SignupForm};

use crate::middleware::auth::SESSION_COOKIE;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const USERNAME_CHARS: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
const BAD_CREDENTIALS: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";

fn auth_page(
    status: StatusCode,
    username: String,
    next: Option<String>,
    errors: FormErrors,
) -> HttpResponse {
    HttpResponse::build(status).json(AuthFormPage {
        username,
        next,
        errors,
    })
}

fn redirect_with_cookie(location: &str, cookie: Cookie<'static>) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.to_string()))
        .cookie(cookie)
        .finish()
}

/// Only same-site absolute paths are followed after login.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') => {
            next
        }
        _ => "/",
    }
}

/// GET /auth/signup/
pub async fn signup_form() -> HttpResponse {
    auth_page(StatusCode::OK, String::new(), None, FormErrors::new())
}

/// POST /auth/signup/ - create the account, then back to the index.
pub async fn signup(
    state: web::Data<AppState>,
    form: web::Form<SignupForm>,
) -> AppResult<HttpResponse> {
    let form = form.into_inner().normalized();
    let mut errors = FormErrors::validate(&form);

    if !form.username.is_empty() && !form.username_is_valid() {
        errors.add("username", USERNAME_CHARS);
    }
    if errors.is_empty() && state.users.find_by_username(&form.username).await?.is_some() {
        errors.add("username", USERNAME_TAKEN);
    }
    if !errors.is_empty() {
        return Ok(auth_page(
            StatusCode::UNPROCESSABLE_ENTITY,
            form.username,
            None,
            errors,
        ));
    }

    let password_hash = state
        .passwords
        .hash(&form.password1)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let user = User::new(form.username.clone(), password_hash)
        .with_names(form.first_name, form.last_name)
        .with_email(form.email);

    match state.users.insert(user).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, username = %user.username, "User signed up");
            Ok(super::posts::redirect("/"))
        }
        // Lost a race with a concurrent signup for the same name.
        Err(RepoError::Constraint(_)) => Ok(auth_page(
            StatusCode::UNPROCESSABLE_ENTITY,
            form.username,
            None,
            FormErrors::single("username", USERNAME_TAKEN),
        )),
        Err(e) => Err(e.into()),
    }
}

/// GET /auth/login/
pub async fn login_form(query: web::Query<NextQuery>) -> HttpResponse {
    auth_page(
        StatusCode::OK,
        String::new(),
        query.into_inner().next,
        FormErrors::new(),
    )
}

/// POST /auth/login/ - set the session cookie and go to `next`.
pub async fn login(
    state: web::Data<AppState>,
    query: web::Query<NextQuery>,
    form: web::Form<LoginForm>,
) -> AppResult<HttpResponse> {
    let form = form.into_inner();
    let next = form.next.clone().or_else(|| query.into_inner().next);

    let mut errors = FormErrors::validate(&form);
    if !errors.is_empty() {
        return Ok(auth_page(
            StatusCode::UNPROCESSABLE_ENTITY,
            form.username,
            next,
            errors,
        ));
    }

    let user = state.users.find_by_username(form.username.trim()).await?;
    let verified = match &user {
        Some(user) => state
            .passwords
            .verify(&form.password, &user.password_hash)
            .map_err(|e| AppError::Internal(e.to_string()))?,
        None => false,
    };

    let Some(user) = user.filter(|_| verified) else {
        tracing::info!(username = %form.username, "Failed login");
        errors.add(FormErrors::NON_FIELD, BAD_CREDENTIALS);
        return Ok(auth_page(
            StatusCode::UNPROCESSABLE_ENTITY,
            form.username,
            next,
            errors,
        ));
    };

    let token = state
        .tokens
        .generate_token(user.id, &user.username)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let cookie = Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(state.tokens.expiration_seconds()))
        .finish();

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(redirect_with_cookie(safe_next(next.as_deref()), cookie))
}

/// GET|POST /auth/logout/
pub async fn logout() -> HttpResponse {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();

    redirect_with_cookie("/", cookie)
}

#[cfg(test)]
mod tests {
    use super::safe_next;

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/create/")), "/create/");
        assert_eq!(safe_next(Some("//evil.example/")), "/");
        assert_eq!(safe_next(Some("https://evil.example/")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }
}
