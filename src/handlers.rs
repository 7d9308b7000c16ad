use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::{StatusCode, Uri},
    Extension, Json,
};

use crate::authentication::{hash_password_argon2, verify_password_argon2, AuthUser, MaybeUser};
use crate::db_helpers::{
    add_comment_in_db, create_article_in_db, delete_comment_in_db, favourite_article_in_db,
    feed_articles_in_db, get_article_by_slug_in_db, get_article_id_by_slug_in_db,
    get_comments_for_article_in_db, get_profile_by_username_in_db, get_tags_in_db,
    get_user_by_email, insert_user, list_articles_in_db, soft_delete_article_in_db,
    unfavourite_article_in_db, unfollow_user_in_db, update_article_in_db, update_user_in_db,
};
use crate::db_helpers::follow_user_in_db;
use crate::errors::ApiError;
use crate::slugify;
use crate::{
    ArticleQueryParams, ArticleResponse, ArticleWrapper, CommentRequest, CommentResponse,
    CommentWrapper, CreateArticleRequest, FeedQueryParams, LoginRequest, MultipleArticlesWrapper,
    MultipleCommentsWrapper, ProfileResponse, ProfileWrapper, RegisterRequest, TagsWrapper,
    UpdateArticleRequest, UpdateUserRequest, UserResponse, UserWrapper,
};
use crate::{AppState, JsonResponse};

type UserJson = UserWrapper<UserResponse>;
type JsonResult<T> = Result<JsonResponse<T>, ApiError>;

// ----------------- Helper Handlers -----------------

pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> Result<(), (StatusCode, String)> {
    Err((
        StatusCode::NOT_FOUND,
        format!("URL {} provided was not found", uri),
    ))
}

/// Duplicate username/email surfaces as a per-field validation error rather
/// than a bare constraint message.
fn map_user_conflict(error: ApiError) -> ApiError {
    if let ApiError::Database(sqlx::Error::Database(e)) = &error {
        let message = e.message();
        if message.contains("UNIQUE constraint failed") {
            if message.contains("users.email") {
                return ApiError::Validation(vec![("email", "is already taken".to_owned())]);
            }
            if message.contains("users.username") {
                return ApiError::Validation(vec![("username", "is already taken".to_owned())]);
            }
        }
    }
    error
}

// ----------------- User Handlers -----------------

pub async fn register_user(
    Extension(state): Extension<Arc<AppState>>,
    Json(UserWrapper { mut user }): Json<UserWrapper<RegisterRequest>>,
) -> JsonResult<UserJson> {
    user.validate()?;
    user.password = hash_password_argon2(user.password)
        .await
        .map_err(|_| ApiError::Internal)?;

    let user = insert_user(&state.pool, &user).await.map_err(map_user_conflict)?;

    let token = state.tokens.issue(user.id).map_err(|_| ApiError::Internal)?;
    let result = UserResponse::new(user, token);
    Ok((
        StatusCode::CREATED,
        Json(UserWrapper::wrap_with_user_data(result)),
    ))
}

pub async fn login_user(
    Extension(state): Extension<Arc<AppState>>,
    Json(UserWrapper { user: request }): Json<UserWrapper<LoginRequest>>,
) -> JsonResult<UserJson> {
    let user = match get_user_by_email(&state.pool, &request.email).await? {
        Some(user) => user,
        None => return Err(ApiError::Forbidden("user", "wrong email or password")),
    };

    let is_password_correct = verify_password_argon2(request.password, &user.password)
        .await
        .map_err(|_| ApiError::Internal)?;
    if !is_password_correct {
        return Err(ApiError::Forbidden("user", "wrong email or password"));
    }

    let token = state.tokens.issue(user.id).map_err(|_| ApiError::Internal)?;
    let result = UserResponse::new(user, token);
    Ok((
        StatusCode::OK,
        Json(UserWrapper::wrap_with_user_data(result)),
    ))
}

pub async fn get_current_user(user: AuthUser) -> JsonResult<UserJson> {
    // the resolver already loaded the record; no second round-trip
    let result = UserResponse::new(user.user, user.token);
    Ok((
        StatusCode::OK,
        Json(UserWrapper::wrap_with_user_data(result)),
    ))
}

pub async fn update_user(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthUser,
    Json(UserWrapper { user: mut request }): Json<UserWrapper<UpdateUserRequest>>,
) -> JsonResult<UserJson> {
    request.validate()?;
    if let Some(password) = request.password.take() {
        let hashed = hash_password_argon2(password)
            .await
            .map_err(|_| ApiError::Internal)?;
        request.password = Some(hashed);
    }

    let updated = update_user_in_db(&state.pool, user.id, request)
        .await
        .map_err(map_user_conflict)?;
    let result = UserResponse::new(updated, user.token);
    Ok((
        StatusCode::OK,
        Json(UserWrapper::wrap_with_user_data(result)),
    ))
}

// ----------------- Profile Handlers -----------------

pub async fn get_profile(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Path(username): Path<String>,
) -> JsonResult<ProfileWrapper> {
    let (profile, following) =
        get_profile_by_username_in_db(&state.pool, maybe_user.get_id(), &username).await?;
    Ok((
        StatusCode::OK,
        Json(ProfileWrapper {
            profile: ProfileResponse::new(profile, following),
        }),
    ))
}

pub async fn follow_profile(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthUser,
    Path(username): Path<String>,
) -> JsonResult<ProfileWrapper> {
    let followed = follow_user_in_db(&state.pool, user.id, &username).await?;
    Ok((
        StatusCode::OK,
        Json(ProfileWrapper {
            profile: ProfileResponse::new(followed, true),
        }),
    ))
}

pub async fn unfollow_profile(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthUser,
    Path(username): Path<String>,
) -> JsonResult<ProfileWrapper> {
    let unfollowed = unfollow_user_in_db(&state.pool, user.id, &username).await?;
    Ok((
        StatusCode::OK,
        Json(ProfileWrapper {
            profile: ProfileResponse::new(unfollowed, false),
        }),
    ))
}

// ----------------- Article Handlers -----------------

pub async fn list_articles(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Query(params): Query<ArticleQueryParams>,
) -> JsonResult<MultipleArticlesWrapper> {
    let articles = list_articles_in_db(&state.pool, maybe_user.get_id(), params).await?;
    let articles: Vec<_> = articles.into_iter().map(ArticleResponse::new).collect();
    let articles_count = articles.len();
    Ok((
        StatusCode::OK,
        Json(MultipleArticlesWrapper {
            articles,
            articles_count,
        }),
    ))
}

pub async fn feed_articles(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<FeedQueryParams>,
) -> JsonResult<MultipleArticlesWrapper> {
    let articles = feed_articles_in_db(&state.pool, user.id, params).await?;
    let articles: Vec<_> = articles.into_iter().map(ArticleResponse::new).collect();
    let articles_count = articles.len();
    Ok((
        StatusCode::OK,
        Json(MultipleArticlesWrapper {
            articles,
            articles_count,
        }),
    ))
}

pub async fn get_article(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Path(slug): Path<String>,
) -> JsonResult<ArticleWrapper<ArticleResponse>> {
    let article = get_article_by_slug_in_db(&state.pool, &slug, maybe_user.get_id()).await?;
    match article {
        Some(article) => Ok((
            StatusCode::OK,
            Json(ArticleWrapper {
                article: ArticleResponse::new(article),
            }),
        )),
        None => Err(ApiError::NotFound("article", "article not found")),
    }
}

pub async fn create_article(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthUser,
    Json(ArticleWrapper { article: request }): Json<ArticleWrapper<CreateArticleRequest>>,
) -> JsonResult<ArticleWrapper<ArticleResponse>> {
    request.validate()?;
    let article = create_article_in_db(&state.pool, user.id, &request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ArticleWrapper {
            article: ArticleResponse::new(article),
        }),
    ))
}

pub async fn update_article(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthUser,
    Path(slug): Path<String>,
    Json(ArticleWrapper { article: request }): Json<ArticleWrapper<UpdateArticleRequest>>,
) -> JsonResult<ArticleWrapper<ArticleResponse>> {
    let existing = match get_article_by_slug_in_db(&state.pool, &slug, Some(user.id)).await? {
        Some(article) => article,
        None => return Err(ApiError::NotFound("article", "article not found")),
    };
    if existing.author_id != user.id {
        return Err(ApiError::Forbidden(
            "article",
            "only the author can update an article",
        ));
    }

    let merged = request.fill_with(&existing);
    merged.validate()?;

    // the slug only moves when the title does
    let new_slug = if merged.title != existing.title {
        slugify(&merged.title)
    } else {
        existing.slug.clone()
    };
    update_article_in_db(&state.pool, existing.id, &new_slug, &merged).await?;

    match get_article_by_slug_in_db(&state.pool, &new_slug, Some(user.id)).await? {
        Some(article) => Ok((
            StatusCode::OK,
            Json(ArticleWrapper {
                article: ArticleResponse::new(article),
            }),
        )),
        None => Err(ApiError::Internal),
    }
}

pub async fn delete_article(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    let existing = match get_article_by_slug_in_db(&state.pool, &slug, Some(user.id)).await? {
        Some(article) => article,
        None => return Err(ApiError::NotFound("article", "article not found")),
    };
    if existing.author_id != user.id {
        return Err(ApiError::Forbidden(
            "article",
            "only the author can delete an article",
        ));
    }
    soft_delete_article_in_db(&state.pool, existing.id).await?;
    Ok(StatusCode::OK)
}

pub async fn favourite_article(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> JsonResult<ArticleWrapper<ArticleResponse>> {
    let article_id = get_article_id_by_slug_in_db(&state.pool, &slug).await?;
    favourite_article_in_db(&state.pool, article_id, user.id).await?;

    // re-read so the envelope carries the fresh membership and count
    match get_article_by_slug_in_db(&state.pool, &slug, Some(user.id)).await? {
        Some(article) => Ok((
            StatusCode::OK,
            Json(ArticleWrapper {
                article: ArticleResponse::new(article),
            }),
        )),
        None => Err(ApiError::NotFound("article", "article not found")),
    }
}

pub async fn unfavourite_article(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> JsonResult<ArticleWrapper<ArticleResponse>> {
    let article_id = get_article_id_by_slug_in_db(&state.pool, &slug).await?;
    unfavourite_article_in_db(&state.pool, article_id, user.id).await?;

    match get_article_by_slug_in_db(&state.pool, &slug, Some(user.id)).await? {
        Some(article) => Ok((
            StatusCode::OK,
            Json(ArticleWrapper {
                article: ArticleResponse::new(article),
            }),
        )),
        None => Err(ApiError::NotFound("article", "article not found")),
    }
}

// ----------------- Comment Handlers -----------------

pub async fn add_comment(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthUser,
    Path(slug): Path<String>,
    Json(CommentWrapper { comment: request }): Json<CommentWrapper<CommentRequest>>,
) -> JsonResult<CommentWrapper<CommentResponse>> {
    request.validate()?;
    let article_id = get_article_id_by_slug_in_db(&state.pool, &slug).await?;
    let comment = add_comment_in_db(&state.pool, article_id, user.id, &request.body).await?;
    Ok((
        StatusCode::CREATED,
        Json(CommentWrapper {
            comment: CommentResponse::new(comment),
        }),
    ))
}

pub async fn list_comments(
    Extension(state): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    Path(slug): Path<String>,
) -> JsonResult<MultipleCommentsWrapper> {
    let article_id = get_article_id_by_slug_in_db(&state.pool, &slug).await?;
    let comments =
        get_comments_for_article_in_db(&state.pool, article_id, maybe_user.get_id()).await?;
    Ok((
        StatusCode::OK,
        Json(MultipleCommentsWrapper {
            comments: comments.into_iter().map(CommentResponse::new).collect(),
        }),
    ))
}

pub async fn delete_comment(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthUser,
    Path((slug, comment_id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    let article_id = get_article_id_by_slug_in_db(&state.pool, &slug).await?;
    delete_comment_in_db(&state.pool, user.id, article_id, comment_id).await?;
    Ok(StatusCode::OK)
}

// ----------------- Tag Handlers -----------------

pub async fn list_tags(
    Extension(state): Extension<Arc<AppState>>,
) -> JsonResult<TagsWrapper> {
    let tags = get_tags_in_db(&state.pool).await?;
    Ok((StatusCode::OK, Json(TagsWrapper { tags })))
}
