use crate::models::test_post::TestPost;
use sqlx::PgPool;

const SELECT_POSTS: &str = r#"
    SELECT p.*, u.username AS author_username
    FROM test_posts p
    JOIN users u ON u.id = p.author_id
"#;

pub async fn list_posts(pool: &PgPool) -> Result<Vec<TestPost>, sqlx::Error> {
    sqlx::query_as::<_, TestPost>(&format!("{SELECT_POSTS} ORDER BY p.created_at DESC, p.id DESC"))
        .fetch_all(pool)
        .await
}

pub async fn find_post(pool: &PgPool, post_id: i64) -> Result<Option<TestPost>, sqlx::Error> {
    sqlx::query_as::<_, TestPost>(&format!("{SELECT_POSTS} WHERE p.id = $1"))
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

pub async fn create_post(
    pool: &PgPool,
    author_id: i64,
    title: &str,
    description: &str,
) -> Result<TestPost, sqlx::Error> {
    sqlx::query_as::<_, TestPost>(
        r#"
        WITH p AS (
            INSERT INTO test_posts (author_id, title, description)
            VALUES ($1, $2, $3)
            RETURNING *
        )
        SELECT p.*, u.username AS author_username
        FROM p JOIN users u ON u.id = p.author_id
        "#,
    )
    .bind(author_id)
    .bind(title)
    .bind(description)
    .fetch_one(pool)
    .await
}

pub async fn update_post(
    pool: &PgPool,
    post_id: i64,
    title: &str,
    description: &str,
) -> Result<TestPost, sqlx::Error> {
    sqlx::query_as::<_, TestPost>(
        r#"
        WITH p AS (
            UPDATE test_posts
            SET title = $2, description = $3, updated_at = NOW()
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
    .fetch_one(pool)
    .await
}

pub async fn delete_post(pool: &PgPool, post_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM test_posts WHERE id = $1")
        .bind(post_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
