use sqlx::{Sqlite, SqlitePool};

use crate::errors::ApiError;
use crate::models::Comment;

// $1 is the viewer id (NULL for anonymous), $2 the article id.
const COMMENTS_QUERY: &str = r#"
    SELECT comments.id         AS "id",
           comments.body       AS "body",
           comments.article_id AS "article_id",
           comments.author_id  AS "author_id",
           comments.created_at AS "created_at",
           comments.updated_at AS "updated_at",
           users.username      AS "author_username",
           users.bio           AS "author_bio",
           users.image         AS "author_image",
           EXISTS (SELECT 1
                   FROM   follows
                   WHERE  followed_id = comments.author_id
                     AND  follower_id = $1)  AS "following"
    FROM   comments
           JOIN users
             ON comments.author_id = users.id
    WHERE  comments.article_id = $2
    ORDER  BY comments.created_at ASC, comments.id ASC
"#;

const SINGLE_COMMENT_QUERY: &str = r#"
    SELECT comments.id         AS "id",
           comments.body       AS "body",
           comments.article_id AS "article_id",
           comments.author_id  AS "author_id",
           comments.created_at AS "created_at",
           comments.updated_at AS "updated_at",
           users.username      AS "author_username",
           users.bio           AS "author_bio",
           users.image         AS "author_image",
           EXISTS (SELECT 1
                   FROM   follows
                   WHERE  followed_id = comments.author_id
                     AND  follower_id = $1)  AS "following"
    FROM   comments
           JOIN users
             ON comments.author_id = users.id
    WHERE  comments.id = $2
"#;

/// Appends a comment and returns it with the author profile loaded.
pub async fn add_comment_in_db(
    pool: &SqlitePool,
    article_id: i64,
    author_id: i64,
    body: &str,
) -> Result<Comment, ApiError> {
    let (comment_id,): (i64,) = sqlx::query_as(
        "INSERT INTO comments (body, author_id, article_id)
         VALUES ($1, $2, $3)
         RETURNING id",
    )
    .bind(body)
    .bind(author_id)
    .bind(article_id)
    .fetch_one(pool)
    .await?;

    let comment = sqlx::query_as::<Sqlite, Comment>(SINGLE_COMMENT_QUERY)
        .bind(author_id)
        .bind(comment_id)
        .fetch_one(pool)
        .await?;
    Ok(comment)
}

/// Comments in creation order; reading is public.
pub async fn get_comments_for_article_in_db(
    pool: &SqlitePool,
    article_id: i64,
    viewer: Option<i64>,
) -> Result<Vec<Comment>, ApiError> {
    let comments = sqlx::query_as::<Sqlite, Comment>(COMMENTS_QUERY)
        .bind(viewer)
        .bind(article_id)
        .fetch_all(pool)
        .await?;
    Ok(comments)
}

/// Removes a comment. Only the comment's author may delete it; anyone else
/// gets `Forbidden`.
pub async fn delete_comment_in_db(
    pool: &SqlitePool,
    requester_id: i64,
    article_id: i64,
    comment_id: i64,
) -> Result<(), ApiError> {
    let comment: Option<(i64,)> = sqlx::query_as(
        "SELECT author_id FROM comments WHERE id = $1 AND article_id = $2",
    )
    .bind(comment_id)
    .bind(article_id)
    .fetch_optional(pool)
    .await?;

    let (author_id,) = match comment {
        Some(comment) => comment,
        None => return Err(ApiError::NotFound("comment", "comment not found")),
    };
    if author_id != requester_id {
        return Err(ApiError::Forbidden(
            "comment",
            "only the author can delete a comment",
        ));
    }

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::testing;

    #[tokio::test]
    async fn comments_come_back_in_creation_order() {
        let pool = testing::pool().await;
        let author = testing::seed_user(&pool, "author", "author@test.com").await;
        let commenter1 = testing::seed_user(&pool, "commenter1", "commenter1@test.com").await;
        let commenter2 = testing::seed_user(&pool, "commenter2", "commenter2@test.com").await;
        let article = testing::seed_article(&pool, author, "Article with Comments", None).await;

        add_comment_in_db(&pool, article.id, commenter1, "First comment")
            .await
            .unwrap();
        add_comment_in_db(&pool, article.id, commenter2, "Second comment")
            .await
            .unwrap();
        add_comment_in_db(&pool, article.id, commenter1, "Third comment")
            .await
            .unwrap();

        let comments = get_comments_for_article_in_db(&pool, article.id, None)
            .await
            .unwrap();
        let bodies: Vec<&str> = comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["First comment", "Second comment", "Third comment"]);
        assert_eq!(comments[0].author_username, "commenter1");
        assert_eq!(comments[1].author_username, "commenter2");
    }

    #[tokio::test]
    async fn only_the_author_can_delete_a_comment() {
        let pool = testing::pool().await;
        let author = testing::seed_user(&pool, "author", "author@test.com").await;
        let commenter = testing::seed_user(&pool, "commenter", "commenter@test.com").await;
        let article = testing::seed_article(&pool, author, "Commented Article", None).await;
        let comment = add_comment_in_db(&pool, article.id, commenter, "mine")
            .await
            .unwrap();

        let by_other = delete_comment_in_db(&pool, author, article.id, comment.id).await;
        assert!(matches!(by_other, Err(ApiError::Forbidden(..))));

        delete_comment_in_db(&pool, commenter, article.id, comment.id)
            .await
            .unwrap();
        let remaining = get_comments_for_article_in_db(&pool, article.id, None)
            .await
            .unwrap();
        assert!(remaining.is_empty());

        let gone = delete_comment_in_db(&pool, commenter, article.id, comment.id).await;
        assert!(matches!(gone, Err(ApiError::NotFound(..))));
    }
}
