use sqlx::{Sqlite, SqlitePool};

use crate::data_formats::{RegisterRequest, UpdateUserRequest};
use crate::errors::ApiError;
use crate::models::User;

use super::get_user_by_id;

/// Inserts a freshly registered user. The password must already be hashed by
/// the caller. Unique violations on username/email bubble up for the handler
/// to map to field errors.
pub async fn insert_user(pool: &SqlitePool, user: &RegisterRequest) -> Result<User, ApiError> {
    let user = sqlx::query_as::<Sqlite, User>(
        "INSERT INTO users (email, username, password)
         VALUES ($1, $2, $3)
         RETURNING id, username, email, password, image, bio, created_at",
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.password)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

/// Profile edit with fill-with semantics: the stored row supplies every field
/// the request leaves out. `password`, when present, must already be hashed.
pub async fn update_user_in_db(
    pool: &SqlitePool,
    id: i64,
    UpdateUserRequest {
        email,
        bio,
        image,
        username,
        password,
    }: UpdateUserRequest,
) -> Result<User, ApiError> {
    let current = match get_user_by_id(pool, id).await? {
        Some(user) => user,
        None => return Err(ApiError::NotFound("user", "user not found")),
    };

    sqlx::query(
        "UPDATE users SET email = $1, username = $2, password = $3, bio = $4, image = $5
         WHERE id = $6",
    )
    .bind(email.unwrap_or(current.email))
    .bind(username.unwrap_or(current.username))
    .bind(password.unwrap_or(current.password))
    .bind(bio.or(current.bio))
    .bind(image.or(current.image))
    .bind(id)
    .execute(pool)
    .await?;

    match get_user_by_id(pool, id).await? {
        Some(user) => Ok(user),
        None => Err(ApiError::NotFound("user", "user not found")),
    }
}
