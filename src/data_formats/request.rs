use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::models::Article;
use crate::Tags;

/// Collects per-field failures so a response carries all of them at once.
#[derive(Default)]
struct FieldErrors(Vec<(&'static str, String)>);

impl FieldErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push((field, message.into()));
    }

    fn finish(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.0))
        }
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

// ----------------- User Requests -----------------

#[derive(Deserialize, Serialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::default();
        if self.username.trim().is_empty() {
            errors.push("username", "can't be blank");
        }
        if !looks_like_email(&self.email) {
            errors.push("email", "is not a valid email address");
        }
        if self.password.chars().count() < 8 {
            errors.push("password", "must be at least 8 characters");
        }
        errors.finish()
    }
}

#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::default();
        if let Some(email) = &self.email {
            if !looks_like_email(email) {
                errors.push("email", "is not a valid email address");
            }
        }
        if let Some(username) = &self.username {
            if username.trim().is_empty() {
                errors.push("username", "can't be blank");
            }
        }
        if let Some(password) = &self.password {
            if password.chars().count() < 8 {
                errors.push("password", "must be at least 8 characters");
            }
        }
        errors.finish()
    }
}

// ----------------- Article Requests -----------------

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct CreateArticleRequest {
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(flatten)]
    pub tag_list: Option<Tags>,
}

impl CreateArticleRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::default();
        if self.title.trim().is_empty() {
            errors.push("title", "can't be blank");
        } else if self.title.chars().count() < 4 {
            errors.push("title", "must be at least 4 characters");
        }
        if self.description.chars().count() > 2048 {
            errors.push("description", "must be at most 2048 characters");
        }
        if self.body.chars().count() > 20480 {
            errors.push("body", "must be at most 20480 characters");
        }
        errors.finish()
    }
}

#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(default)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    #[serde(flatten)]
    pub tag_list: Option<Tags>,
}

impl UpdateArticleRequest {
    /// The fill-with half of partial updates: start from the stored article,
    /// then overlay only the fields this request actually supplied. A `None`
    /// tag list means the association is left untouched.
    pub fn fill_with(self, article: &Article) -> CreateArticleRequest {
        CreateArticleRequest {
            title: self.title.unwrap_or_else(|| article.title.clone()),
            description: self
                .description
                .unwrap_or_else(|| article.description.clone()),
            body: self.body.unwrap_or_else(|| article.body.clone()),
            tag_list: self.tag_list,
        }
    }
}

// ----------------- Comment Requests -----------------

#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(default)]
pub struct CommentRequest {
    pub body: String,
}

impl CommentRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::default();
        if self.body.trim().is_empty() {
            errors.push("body", "can't be blank");
        } else if self.body.chars().count() > 2048 {
            errors.push("body", "must be at most 2048 characters");
        }
        errors.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn existing_article() -> Article {
        Article {
            id: 1,
            slug: "existing-article".to_owned(),
            title: "Existing Article".to_owned(),
            description: "Description".to_owned(),
            body: "Body".to_owned(),
            author_id: 1,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
            tag_list: Some("tag1,tag2,tag3".to_owned()),
            author_username: "author".to_owned(),
            author_bio: None,
            author_image: None,
            favorites_count: 0,
            favorited: false,
            following: false,
        }
    }

    #[test]
    fn fill_with_preserves_untouched_fields() {
        let request = UpdateArticleRequest {
            title: Some("New".to_owned()),
            ..Default::default()
        };
        let merged = request.fill_with(&existing_article());
        assert_eq!(merged.title, "New");
        assert_eq!(merged.description, "Description");
        assert_eq!(merged.body, "Body");
        // no tag list supplied, so the association stays as-is
        assert!(merged.tag_list.is_none());
    }

    #[test]
    fn fill_with_overlays_every_supplied_field() {
        let request = UpdateArticleRequest {
            title: Some("Changed Title".to_owned()),
            description: Some("changed".to_owned()),
            body: Some("changed body".to_owned()),
            tag_list: Some(Tags {
                tags: vec!["z".to_owned()],
            }),
        };
        let merged = request.fill_with(&existing_article());
        assert_eq!(merged.title, "Changed Title");
        assert_eq!(merged.description, "changed");
        assert_eq!(merged.body, "changed body");
        assert_eq!(merged.tag_list.unwrap().tags, vec!["z"]);
    }

    #[test]
    fn article_validation_rejects_short_titles() {
        let request = CreateArticleRequest {
            title: "abc".to_owned(),
            ..Default::default()
        };
        match request.validate() {
            Err(ApiError::Validation(fields)) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].0, "title");
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn registration_validation_accumulates_fields() {
        let request = RegisterRequest {
            username: "".to_owned(),
            email: "not-an-email".to_owned(),
            password: "short".to_owned(),
        };
        match request.validate() {
            Err(ApiError::Validation(fields)) => {
                let names: Vec<_> = fields.iter().map(|(field, _)| *field).collect();
                assert_eq!(names, vec!["username", "email", "password"]);
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn comment_body_is_required() {
        assert!(CommentRequest::default().validate().is_err());
        assert!(CommentRequest {
            body: "  ".to_owned()
        }
        .validate()
        .is_err());
        assert!(CommentRequest {
            body: "looks fine".to_owned()
        }
        .validate()
        .is_ok());
    }
}
