use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::errors::ApiError;
use crate::models::Tag;

/// Tag values are stored case-normalized and trimmed; the catalog is keyed by
/// the normalized value.
pub fn normalize_tag(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Plain catalog insert. A duplicate value trips the unique constraint and
/// surfaces as `Conflict`; callers that want find-or-create semantics go
/// through `set_tags` instead.
pub async fn create_tag_in_db(pool: &SqlitePool, name: &str) -> Result<Tag, ApiError> {
    let name = normalize_tag(name);
    sqlx::query_as::<Sqlite, Tag>("INSERT INTO tags (name) VALUES ($1) RETURNING id, name")
        .bind(&name)
        .fetch_one(pool)
        .await
        .map_err(|e| ApiError::from(e).or_conflict("database"))
}

async fn find_or_create_tag(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
) -> Result<i64, ApiError> {
    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM tags WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }
    // A concurrent creator may win the insert; the loser falls through to the
    // lookup below instead of failing on the unique constraint.
    sqlx::query("INSERT INTO tags (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
        .bind(name)
        .execute(&mut *tx)
        .await?;
    let (id,): (i64,) = sqlx::query_as("SELECT id FROM tags WHERE name = $1")
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
    Ok(id)
}

/// Replaces the article's entire tag association with the given names.
/// Duplicate names in one call associate once; unknown names are created in
/// the catalog on the fly.
pub async fn set_tags_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    article_id: i64,
    names: &[String],
) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM articletags WHERE article_id = $1")
        .bind(article_id)
        .execute(&mut *tx)
        .await?;
    for name in names {
        let name = normalize_tag(name);
        if name.is_empty() {
            continue;
        }
        let tag_id = find_or_create_tag(tx, &name).await?;
        sqlx::query(
            "INSERT INTO articletags (article_id, tag_id)
             VALUES ($1, $2)
             ON CONFLICT (article_id, tag_id) DO NOTHING",
        )
        .bind(article_id)
        .bind(tag_id)
        .execute(&mut *tx)
        .await?;
    }
    Ok(())
}

pub async fn set_tags_in_db(
    pool: &SqlitePool,
    article_id: i64,
    names: &[String],
) -> Result<(), ApiError> {
    let mut tx = pool.begin().await?;
    set_tags_in_tx(&mut tx, article_id, names).await?;
    tx.commit().await?;
    Ok(())
}

pub async fn get_tags_in_db(pool: &SqlitePool) -> Result<Vec<String>, ApiError> {
    let tags = sqlx::query_scalar::<Sqlite, String>("SELECT name FROM tags ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(tags)
}

/// The current association for one article, normalized order.
pub async fn get_tags_for_article_in_db(
    pool: &SqlitePool,
    article_id: i64,
) -> Result<Vec<String>, ApiError> {
    let tags = sqlx::query_scalar::<Sqlite, String>(
        "SELECT tags.name
         FROM tags
              JOIN articletags ON articletags.tag_id = tags.id
         WHERE articletags.article_id = $1
         ORDER BY tags.name",
    )
    .bind(article_id)
    .fetch_all(pool)
    .await?;
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::testing;
    use crate::errors::ApiError;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn duplicate_tag_creation_is_a_conflict() {
        let pool = testing::pool().await;
        create_tag_in_db(&pool, "uniquetag").await.unwrap();
        let second = create_tag_in_db(&pool, "uniquetag").await;
        assert!(matches!(second, Err(ApiError::Conflict { .. })));
        // normalization makes these the same value
        let shouty = create_tag_in_db(&pool, "  UniqueTag ").await;
        assert!(matches!(shouty, Err(ApiError::Conflict { .. })));
    }

    #[tokio::test]
    async fn set_tags_replaces_the_association() {
        let pool = testing::pool().await;
        let author = testing::seed_user(&pool, "author", "author@test.com").await;
        let article = testing::seed_article(&pool, author, "Article with Tags", None).await;

        set_tags_in_db(&pool, article.id, &names(&["x", "y"]))
            .await
            .unwrap();
        assert_eq!(
            get_tags_for_article_in_db(&pool, article.id).await.unwrap(),
            names(&["x", "y"])
        );

        set_tags_in_db(&pool, article.id, &names(&["z"]))
            .await
            .unwrap();
        assert_eq!(
            get_tags_for_article_in_db(&pool, article.id).await.unwrap(),
            names(&["z"])
        );
    }

    #[tokio::test]
    async fn duplicate_names_in_one_call_associate_once() {
        let pool = testing::pool().await;
        let author = testing::seed_user(&pool, "author", "author@test.com").await;
        let article = testing::seed_article(&pool, author, "Repeated Tags", None).await;

        set_tags_in_db(&pool, article.id, &names(&["rust", "Rust", " rust "]))
            .await
            .unwrap();
        assert_eq!(
            get_tags_for_article_in_db(&pool, article.id).await.unwrap(),
            names(&["rust"])
        );
    }

    #[tokio::test]
    async fn catalog_is_shared_across_articles() {
        let pool = testing::pool().await;
        let author = testing::seed_user(&pool, "author", "author@test.com").await;
        let first = testing::seed_article(&pool, author, "First Article", Some(vec!["shared"])).await;
        let second =
            testing::seed_article(&pool, author, "Second Article", Some(vec!["shared"])).await;

        let catalog = get_tags_in_db(&pool).await.unwrap();
        assert_eq!(catalog, names(&["shared"]));
        assert_eq!(
            get_tags_for_article_in_db(&pool, first.id).await.unwrap(),
            names(&["shared"])
        );
        assert_eq!(
            get_tags_for_article_in_db(&pool, second.id).await.unwrap(),
            names(&["shared"])
        );
    }
}
