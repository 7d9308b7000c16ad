use sqlx::{Sqlite, SqlitePool};

use crate::errors::ApiError;
use crate::models::User;

use super::get_user_by_username;

/// Loads a profile plus the viewer-dependent `following` flag. Anonymous
/// viewers are never following anyone.
pub async fn get_profile_by_username_in_db(
    pool: &SqlitePool,
    viewer: Option<i64>,
    username: &str,
) -> Result<(User, bool), ApiError> {
    let profile = match get_user_by_username(pool, username).await? {
        Some(user) => user,
        None => return Err(ApiError::NotFound("profile", "user not found")),
    };
    let following = match viewer {
        Some(viewer) => is_following_in_db(pool, viewer, profile.id).await?,
        None => false,
    };
    Ok((profile, following))
}

/// Membership insert: following twice leaves a single record behind.
pub async fn follow_user_in_db(
    pool: &SqlitePool,
    follower_id: i64,
    username: &str,
) -> Result<User, ApiError> {
    let followed = match get_user_by_username(pool, username).await? {
        Some(user) => user,
        None => return Err(ApiError::NotFound("profile", "user not found")),
    };
    sqlx::query(
        "INSERT INTO follows (follower_id, followed_id)
         VALUES ($1, $2)
         ON CONFLICT (follower_id, followed_id) DO NOTHING",
    )
    .bind(follower_id)
    .bind(followed.id)
    .execute(pool)
    .await?;
    Ok(followed)
}

/// Membership delete: unfollowing someone never followed is a no-op.
pub async fn unfollow_user_in_db(
    pool: &SqlitePool,
    follower_id: i64,
    username: &str,
) -> Result<User, ApiError> {
    let followed = match get_user_by_username(pool, username).await? {
        Some(user) => user,
        None => return Err(ApiError::NotFound("profile", "user not found")),
    };
    sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2")
        .bind(follower_id)
        .bind(followed.id)
        .execute(pool)
        .await?;
    Ok(followed)
}

pub async fn is_following_in_db(
    pool: &SqlitePool,
    follower_id: i64,
    followed_id: i64,
) -> Result<bool, ApiError> {
    let following = sqlx::query_scalar::<Sqlite, bool>(
        "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)",
    )
    .bind(follower_id)
    .bind(followed_id)
    .fetch_one(pool)
    .await?;
    Ok(following)
}
