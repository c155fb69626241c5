use crate::models::parenting::ParentingComment;
use sqlx::PgPool;

const SELECT_COMMENTS: &str = r#"
    SELECT c.*, u.username AS author_username
    FROM parenting_comments c
    JOIN users u ON u.id = c.author_id
"#;

/// Every comment and reply on a post, oldest first
pub async fn list_comments_for_post(
    pool: &PgPool,
    post_id: i64,
) -> Result<Vec<ParentingComment>, sqlx::Error> {
    sqlx::query_as::<_, ParentingComment>(&format!(
        "{SELECT_COMMENTS} WHERE c.post_id = $1 ORDER BY c.created_at ASC, c.id ASC"
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await
}

pub async fn find_comment(
    pool: &PgPool,
    comment_id: i64,
) -> Result<Option<ParentingComment>, sqlx::Error> {
    sqlx::query_as::<_, ParentingComment>(&format!("{SELECT_COMMENTS} WHERE c.id = $1"))
        .bind(comment_id)
        .fetch_optional(pool)
        .await
}

/// Insert a comment, or a reply when `parent_comment_id` is set
pub async fn create_comment(
    pool: &PgPool,
    post_id: i64,
    author_id: i64,
    content: &str,
    parent_comment_id: Option<i64>,
) -> Result<ParentingComment, sqlx::Error> {
    sqlx::query_as::<_, ParentingComment>(
        r#"
        WITH c AS (
            INSERT INTO parenting_comments (post_id, author_id, content, parent_comment_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        )
        SELECT c.*, u.username AS author_username
        FROM c JOIN users u ON u.id = c.author_id
        "#,
    )
    .bind(post_id)
    .bind(author_id)
    .bind(content)
    .bind(parent_comment_id)
    .fetch_one(pool)
    .await
}

/// Delete a comment; replies cascade
pub async fn delete_comment(pool: &PgPool, comment_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM parenting_comments WHERE id = $1")
        .bind(comment_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
