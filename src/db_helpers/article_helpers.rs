use sqlx::{Sqlite, SqlitePool};

use crate::data_formats::{ArticleQueryParams, FeedQueryParams};
use crate::errors::ApiError;
use crate::models::Article;
use crate::slugify;
use crate::CreateArticleRequest;

use super::{get_user_by_username, set_tags_in_tx};

// Every article read goes through one of these projections: the article row,
// its author's profile columns, the comma-joined tag list, and the
// viewer-dependent favorited/following flags ($1 is the viewer id, NULL for
// anonymous). The tombstone filter is spelled out in each of them.

const LIST_ARTICLES_QUERY: &str = r#"
    SELECT DISTINCT articles.id                                  AS "id",
                    articles.slug                                AS "slug",
                    articles.title                               AS "title",
                    articles.description                         AS "description",
                    articles.body                                AS "body",
                    articles.author_id                           AS "author_id",
                    articles.created_at                          AS "created_at",
                    articles.updated_at                          AS "updated_at",
                    (SELECT group_concat(tags.name, ',')
                     FROM   tags
                            JOIN articletags
                              ON articletags.tag_id = tags.id
                     WHERE  articletags.article_id = articles.id) AS "tag_list",
                    users.username                               AS "author_username",
                    users.bio                                    AS "author_bio",
                    users.image                                  AS "author_image",
                    (SELECT count(*)
                     FROM   favourite
                     WHERE  favourite.article_id = articles.id)  AS "favorites_count",
                    EXISTS (SELECT 1
                            FROM   favourite
                            WHERE  favourite.article_id = articles.id
                              AND  favourite.user_id = $1)       AS "favorited",
                    EXISTS (SELECT 1
                            FROM   follows
                            WHERE  followed_id = articles.author_id
                              AND  follower_id = $1)             AS "following"
    FROM   articles
           JOIN users
             ON articles.author_id = users.id
           LEFT JOIN articletags
                  ON articletags.article_id = articles.id
           LEFT JOIN tags
                  ON tags.id = articletags.tag_id
           LEFT JOIN favourite
                  ON favourite.article_id = articles.id
    WHERE  articles.deleted_at IS NULL
      AND  ( users.username = $2 OR $2 IS NULL )
      AND  ( tags.name = $3 OR $3 IS NULL )
      AND  ( favourite.user_id = $4 OR $4 IS NULL )
    ORDER  BY articles.created_at DESC, articles.id DESC
    LIMIT  $5 OFFSET $6
"#;

const FEED_ARTICLES_QUERY: &str = r#"
    SELECT articles.id                                  AS "id",
           articles.slug                                AS "slug",
           articles.title                               AS "title",
           articles.description                         AS "description",
           articles.body                                AS "body",
           articles.author_id                           AS "author_id",
           articles.created_at                          AS "created_at",
           articles.updated_at                          AS "updated_at",
           (SELECT group_concat(tags.name, ',')
            FROM   tags
                   JOIN articletags
                     ON articletags.tag_id = tags.id
            WHERE  articletags.article_id = articles.id) AS "tag_list",
           users.username                               AS "author_username",
           users.bio                                    AS "author_bio",
           users.image                                  AS "author_image",
           (SELECT count(*)
            FROM   favourite
            WHERE  favourite.article_id = articles.id)  AS "favorites_count",
           EXISTS (SELECT 1
                   FROM   favourite
                   WHERE  favourite.article_id = articles.id
                     AND  favourite.user_id = $1)       AS "favorited",
           EXISTS (SELECT 1
                   FROM   follows
                   WHERE  followed_id = articles.author_id
                     AND  follower_id = $1)             AS "following"
    FROM   articles
           JOIN users
             ON articles.author_id = users.id
           JOIN follows
             ON follows.followed_id = articles.author_id
            AND follows.follower_id = $1
    WHERE  articles.deleted_at IS NULL
    ORDER  BY articles.created_at DESC, articles.id DESC
    LIMIT  $2 OFFSET $3
"#;

const SINGLE_ARTICLE_QUERY: &str = r#"
    SELECT articles.id                                  AS "id",
           articles.slug                                AS "slug",
           articles.title                               AS "title",
           articles.description                         AS "description",
           articles.body                                AS "body",
           articles.author_id                           AS "author_id",
           articles.created_at                          AS "created_at",
           articles.updated_at                          AS "updated_at",
           (SELECT group_concat(tags.name, ',')
            FROM   tags
                   JOIN articletags
                     ON articletags.tag_id = tags.id
            WHERE  articletags.article_id = articles.id) AS "tag_list",
           users.username                               AS "author_username",
           users.bio                                    AS "author_bio",
           users.image                                  AS "author_image",
           (SELECT count(*)
            FROM   favourite
            WHERE  favourite.article_id = articles.id)  AS "favorites_count",
           EXISTS (SELECT 1
                   FROM   favourite
                   WHERE  favourite.article_id = articles.id
                     AND  favourite.user_id = $1)       AS "favorited",
           EXISTS (SELECT 1
                   FROM   follows
                   WHERE  followed_id = articles.author_id
                     AND  follower_id = $1)             AS "following"
    FROM   articles
           JOIN users
             ON articles.author_id = users.id
    WHERE  articles.deleted_at IS NULL
      AND  articles.slug = $2
"#;

pub async fn list_articles_in_db(
    pool: &SqlitePool,
    viewer: Option<i64>,
    ArticleQueryParams {
        tag,
        author,
        favorited,
        limit,
        offset,
    }: ArticleQueryParams,
) -> Result<Vec<Article>, ApiError> {
    let favorited_by = match &favorited {
        Some(username) => match get_user_by_username(pool, username).await? {
            Some(user) => Some(user.id),
            // filtering by an unknown favoriter matches nothing
            None => return Ok(Vec::new()),
        },
        None => None,
    };
    let articles = sqlx::query_as::<Sqlite, Article>(LIST_ARTICLES_QUERY)
        .bind(viewer)
        .bind(author)
        .bind(tag.map(|t| super::normalize_tag(&t)))
        .bind(favorited_by)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(pool)
        .await?;
    Ok(articles)
}

pub async fn feed_articles_in_db(
    pool: &SqlitePool,
    viewer: i64,
    FeedQueryParams { limit, offset }: FeedQueryParams,
) -> Result<Vec<Article>, ApiError> {
    let articles = sqlx::query_as::<Sqlite, Article>(FEED_ARTICLES_QUERY)
        .bind(viewer)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(pool)
        .await?;
    Ok(articles)
}

pub async fn get_article_by_slug_in_db(
    pool: &SqlitePool,
    slug: &str,
    viewer: Option<i64>,
) -> Result<Option<Article>, ApiError> {
    let article = sqlx::query_as::<Sqlite, Article>(SINGLE_ARTICLE_QUERY)
        .bind(viewer)
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(article)
}

/// Persists a new aggregate: the article row and its tag association in one
/// transaction. A slug collision with another active article is a `Conflict`.
pub async fn create_article_in_db(
    pool: &SqlitePool,
    author_id: i64,
    request: &CreateArticleRequest,
) -> Result<Article, ApiError> {
    let slug = slugify(&request.title);
    let mut tx = pool.begin().await?;

    let (article_id,): (i64,) = sqlx::query_as(
        "INSERT INTO articles (slug, title, description, body, author_id)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(&slug)
    .bind(&request.title)
    .bind(&request.description)
    .bind(&request.body)
    .bind(author_id)
    .fetch_one(&mut tx)
    .await
    .map_err(|e| ApiError::from(e).or_conflict("database"))?;

    if let Some(tags) = &request.tag_list {
        set_tags_in_tx(&mut tx, article_id, &tags.tags).await?;
    }
    tx.commit().await?;

    match get_article_by_slug_in_db(pool, &slug, Some(author_id)).await? {
        Some(article) => Ok(article),
        None => Err(ApiError::Internal),
    }
}

/// Writes the already-merged (fill-with) field set back. The tag association
/// is only rewritten when the update supplied a tag list.
pub async fn update_article_in_db(
    pool: &SqlitePool,
    article_id: i64,
    slug: &str,
    request: &CreateArticleRequest,
) -> Result<(), ApiError> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        "UPDATE articles
         SET    slug = $1, title = $2, description = $3, body = $4,
                updated_at = CURRENT_TIMESTAMP
         WHERE  id = $5 AND deleted_at IS NULL",
    )
    .bind(slug)
    .bind(&request.title)
    .bind(&request.description)
    .bind(&request.body)
    .bind(article_id)
    .execute(&mut tx)
    .await
    .map_err(|e| ApiError::from(e).or_conflict("database"))?;

    if let Some(tags) = &request.tag_list {
        set_tags_in_tx(&mut tx, article_id, &tags.tags).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Tombstones the aggregate. The row stays for auditing; every read path
/// filters it out from now on.
pub async fn soft_delete_article_in_db(pool: &SqlitePool, article_id: i64) -> Result<(), ApiError> {
    let result = sqlx::query(
        "UPDATE articles SET deleted_at = CURRENT_TIMESTAMP
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(article_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("article", "article not found"));
    }
    Ok(())
}

// ----------------- Favorite ledger -----------------

/// Membership insert: favoriting twice (or racing yourself) leaves exactly
/// one record behind.
pub async fn favourite_article_in_db(
    pool: &SqlitePool,
    article_id: i64,
    user_id: i64,
) -> Result<(), ApiError> {
    sqlx::query(
        "INSERT INTO favourite (article_id, user_id)
         VALUES ($1, $2)
         ON CONFLICT (article_id, user_id) DO NOTHING",
    )
    .bind(article_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Membership delete: unfavoriting something never favorited is a no-op.
pub async fn unfavourite_article_in_db(
    pool: &SqlitePool,
    article_id: i64,
    user_id: i64,
) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM favourite WHERE article_id = $1 AND user_id = $2")
        .bind(article_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn is_favourited_in_db(
    pool: &SqlitePool,
    article_id: i64,
    user_id: i64,
) -> Result<bool, ApiError> {
    let favorited = sqlx::query_scalar::<Sqlite, bool>(
        "SELECT EXISTS (SELECT 1 FROM favourite WHERE article_id = $1 AND user_id = $2)",
    )
    .bind(article_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(favorited)
}

/// Always recomputed from the membership rows; there is no stored counter to
/// drift.
pub async fn favourites_count_in_db(pool: &SqlitePool, article_id: i64) -> Result<i64, ApiError> {
    let count = sqlx::query_scalar::<Sqlite, i64>(
        "SELECT count(*) FROM favourite WHERE article_id = $1",
    )
    .bind(article_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
