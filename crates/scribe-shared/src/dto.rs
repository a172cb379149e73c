//! Data Transfer Objects - submitted forms and rendered page bodies.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

/// Validation messages keyed by field name. Non-field errors use `__all__`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub const NON_FIELD: &'static str = "__all__";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Run the form's declared rules, collecting every failure.
    pub fn validate(form: &impl Validate) -> Self {
        match form.validate() {
            Ok(()) => Self::new(),
            Err(errors) => errors.into(),
        }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut form_errors = Self::new();
        for (field, failures) in errors.field_errors() {
            for failure in failures {
                let message = failure
                    .message
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| failure.code.to_string());
                form_errors.add(field.to_string(), message);
            }
        }
        form_errors
    }
}

// ---------------------------------------------------------------------------
// Forms
// ---------------------------------------------------------------------------

/// Text and group of a post. The image arrives as a separate multipart part.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PostForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
    /// Group id; empty means no group.
    #[serde(default)]
    pub group: Option<String>,
}

impl PostForm {
    /// Trim the text and drop an empty group choice.
    pub fn normalized(mut self) -> Self {
        self.text = self.text.trim().to_string();
        self.group = self
            .group
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());
        self
    }

    /// The chosen group, if the choice parses.
    pub fn group_id(&self) -> Result<Option<Uuid>, uuid::Error> {
        self.group.as_deref().map(Uuid::parse_str).transpose()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn normalized(mut self) -> Self {
        self.text = self.text.trim().to_string();
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SignupForm {
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 150,
        message = "Required. 150 characters or fewer."
    ))]
    pub username: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[serde(default, skip_serializing)]
    #[validate(length(
        min = 8,
        message = "This password is too short. It must contain at least 8 characters."
    ))]
    pub password1: String,
    #[serde(default, skip_serializing)]
    #[validate(must_match(other = "password1", message = "The two password fields didn't match."))]
    pub password2: String,
}

impl SignupForm {
    pub fn normalized(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.email = self
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        self
    }

    /// Letters, digits and `@ . + - _` only.
    pub fn username_is_valid(&self) -> bool {
        self.username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct LoginForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub username: String,
    #[serde(default, skip_serializing)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
    /// Where to go after logging in.
    #[serde(default)]
    pub next: Option<String>,
}

/// Query string of pages that accept `?page=`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Query string of the login page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// ---------------------------------------------------------------------------
// Page bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorResponse {
    pub username: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupResponse {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub text: String,
    pub image: Option<String>,
    pub pub_date: DateTime<Utc>,
    pub author: AuthorResponse,
    pub group: Option<GroupResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author: AuthorResponse,
}

/// One page of a listing with its navigation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPage {
    pub group: GroupResponse,
    pub page: PageResponse<PostResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilePage {
    pub author: AuthorResponse,
    /// Total number of posts by the author.
    pub count: u64,
    pub following: bool,
    pub page: PageResponse<PostResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetailPage {
    pub post: PostResponse,
    /// Total number of posts by the post's author.
    pub count: u64,
    pub comments: Vec<CommentResponse>,
    pub comment_form: CommentForm,
}

/// The create/edit post page, blank or re-rendered with errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostFormPage {
    pub is_edit: bool,
    pub post_id: Option<Uuid>,
    pub form: PostForm,
    pub errors: FormErrors,
    pub groups: Vec<GroupResponse>,
}

/// Signup or login page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthFormPage {
    pub username: String,
    pub next: Option<String>,
    pub errors: FormErrors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AboutPage {
    pub title: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: &str = "This field is required.";

    #[test]
    fn blank_text_is_required() {
        let form = PostForm {
            text: "   ".to_string(),
            group: Some(String::new()),
        }
        .normalized();

        let errors = FormErrors::validate(&form);

        assert_eq!(errors.get("text"), Some(&[REQUIRED.to_string()][..]));
        assert_eq!(form.group, None);
        assert_eq!(form.group_id().unwrap(), None);
    }

    #[test]
    fn group_choice_must_be_an_id() {
        let form = PostForm {
            text: "text".to_string(),
            group: Some("not-an-id".to_string()),
        }
        .normalized();

        assert!(form.group_id().is_err());
    }

    #[test]
    fn signup_passwords_must_match() {
        let form = SignupForm {
            username: "leo".to_string(),
            password1: "long-enough-1".to_string(),
            password2: "long-enough-2".to_string(),
            email: Some("  ".to_string()),
            ..Default::default()
        }
        .normalized();

        let errors = FormErrors::validate(&form);

        assert!(errors.get("password2").is_some());
        assert!(errors.get("password1").is_none());
        assert!(errors.get("email").is_none());
    }

    #[test]
    fn username_characters() {
        let mut form = SignupForm {
            username: "leo.tolstoy+1".to_string(),
            ..Default::default()
        };
        assert!(form.username_is_valid());

        form.username = "leo tolstoy".to_string();
        assert!(!form.username_is_valid());
    }

    #[test]
    fn errors_serialize_as_a_plain_map() {
        let errors = FormErrors::single("text", REQUIRED);
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({ "text": [REQUIRED] }));
    }
}
