use crate::models::parenting::ParentingPost;
use crate::search::{PostSearch, Predicates};
use sqlx::{PgPool, QueryBuilder};

const SELECT_POSTS: &str = r#"
    SELECT p.*, u.username AS author_username
    FROM parenting_posts p
    JOIN users u ON u.id = p.author_id
"#;

/// Posts matching `search`, newest first
pub async fn list_posts(
    pool: &PgPool,
    search: &PostSearch,
) -> Result<Vec<ParentingPost>, sqlx::Error> {
    let mut qb = QueryBuilder::new(SELECT_POSTS);
    search.push_predicates(&mut Predicates::new(&mut qb));
    qb.push(" ORDER BY p.created_at DESC, p.id DESC");

    qb.build_query_as::<ParentingPost>().fetch_all(pool).await
}

pub async fn find_post(pool: &PgPool, post_id: i64) -> Result<Option<ParentingPost>, sqlx::Error> {
    sqlx::query_as::<_, ParentingPost>(&format!("{SELECT_POSTS} WHERE p.id = $1"))
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

pub async fn create_post(
    pool: &PgPool,
    author_id: i64,
    title: &str,
    description: &str,
    image: Option<&str>,
) -> Result<ParentingPost, sqlx::Error> {
    sqlx::query_as::<_, ParentingPost>(
        r#"
        WITH p AS (
            INSERT INTO parenting_posts (author_id, title, description, image)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        )
        SELECT p.*, u.username AS author_username
        FROM p JOIN users u ON u.id = p.author_id
        "#,
    )
    .bind(author_id)
    .bind(title)
    .bind(description)
    .bind(image)
    .fetch_one(pool)
    .await
}

/// Overwrite the editable fields; `image` replaces the stored path (None clears it)
pub async fn update_post(
    pool: &PgPool,
    post_id: i64,
    title: &str,
    description: &str,
    image: Option<&str>,
) -> Result<ParentingPost, sqlx::Error> {
    sqlx::query_as::<_, ParentingPost>(
        r#"
        WITH p AS (
            UPDATE parenting_posts
            SET title = $2, description = $3, image = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
        )
        SELECT p.*, u.username AS author_username
        FROM p JOIN users u ON u.id = p.author_id
        "#,
    )
    .bind(post_id)
    .bind(title)
    .bind(description)
    .bind(image)
    .fetch_one(pool)
    .await
}

/// Delete a post; its comments and replies go with it
pub async fn delete_post(pool: &PgPool, post_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM parenting_posts WHERE id = $1")
        .bind(post_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
