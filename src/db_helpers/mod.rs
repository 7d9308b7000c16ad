use sqlx::{Sqlite, SqlitePool};

use crate::errors::ApiError;
use crate::models::User;

mod article_helpers;
mod comment_helpers;
mod profile_helpers;
mod tag_helpers;
mod user_helpers;

pub use article_helpers::*;
pub use comment_helpers::*;
pub use profile_helpers::*;
pub use tag_helpers::*;
pub use user_helpers::*;

const USER_COLUMNS: &str = "id, username, email, password, image, bio, created_at";

// ----------------- Shared lookups -----------------

pub async fn get_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, ApiError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
    let result = sqlx::query_as::<Sqlite, User>(&query)
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(result)
}

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, ApiError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let result = sqlx::query_as::<Sqlite, User>(&query)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(result)
}

pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, ApiError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let result = sqlx::query_as::<Sqlite, User>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(result)
}

/// Resolves a slug to the article id, honoring the tombstone filter.
pub async fn get_article_id_by_slug_in_db(
    pool: &SqlitePool,
    slug: &str,
) -> Result<i64, ApiError> {
    let article: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM articles WHERE slug = $1 AND deleted_at IS NULL")
            .bind(slug)
            .fetch_optional(pool)
            .await?;
    match article {
        Some((id,)) => Ok(id),
        None => Err(ApiError::NotFound("article", "article not found")),
    }
}

// ----------------- Test support -----------------
