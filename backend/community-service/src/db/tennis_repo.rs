use crate::models::tennis::{TennisComment, TennisPost, DEFAULT_TENNIS_IMAGE};
use crate::search::{Predicates, TennisSearch};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, QueryBuilder};

const SELECT_POSTS: &str = r#"
    SELECT p.*, u.username AS author_username
    FROM tennis_posts p
    LEFT JOIN users u ON u.id = p.author_id
"#;

/// Writable columns of a partner search post
#[derive(Debug, Clone)]
pub struct TennisFields<'a> {
    pub user_gender: Option<&'a str>,
    pub birth_date: NaiveDate,
    pub phone: &'a str,
    pub description: &'a str,
    pub play_date: DateTime<Utc>,
    pub level: &'a str,
    pub language: &'a str,
    pub play_type: &'a str,
    pub club_name: Option<&'a str>,
}

/// Posts matching `search`, ages measured against `today`
pub async fn list_posts(
    pool: &PgPool,
    search: &TennisSearch,
    today: NaiveDate,
) -> Result<Vec<TennisPost>, sqlx::Error> {
    let mut qb = QueryBuilder::new(SELECT_POSTS);
    search.push_predicates(&mut Predicates::new(&mut qb), today);
    qb.push(" ORDER BY p.id");

    qb.build_query_as::<TennisPost>().fetch_all(pool).await
}

pub async fn find_post(pool: &PgPool, post_id: i64) -> Result<Option<TennisPost>, sqlx::Error> {
    sqlx::query_as::<_, TennisPost>(&format!("{SELECT_POSTS} WHERE p.id = $1"))
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

/// `image` of `None` stores the default picture
pub async fn create_post(
    pool: &PgPool,
    author_id: Option<i64>,
    fields: &TennisFields<'_>,
    image: Option<&str>,
) -> Result<TennisPost, sqlx::Error> {
    sqlx::query_as::<_, TennisPost>(
        r#"
        WITH p AS (
            INSERT INTO tennis_posts
                (author_id, user_gender, birth_date, phone, description, play_date,
                 level, language, type, club_name, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, COALESCE($11, $12))
            RETURNING *
        )
        SELECT p.*, u.username AS author_username
        FROM p LEFT JOIN users u ON u.id = p.author_id
        "#,
    )
    .bind(author_id)
    .bind(fields.user_gender)
    .bind(fields.birth_date)
    .bind(fields.phone)
    .bind(fields.description)
    .bind(fields.play_date)
    .bind(fields.level)
    .bind(fields.language)
    .bind(fields.play_type)
    .bind(fields.club_name)
    .bind(image)
    .bind(DEFAULT_TENNIS_IMAGE)
    .fetch_one(pool)
    .await
}

pub async fn update_post(
    pool: &PgPool,
    post_id: i64,
    fields: &TennisFields<'_>,
    image: &str,
) -> Result<TennisPost, sqlx::Error> {
    sqlx::query_as::<_, TennisPost>(
        r#"
        WITH p AS (
            UPDATE tennis_posts
            SET user_gender = $2, birth_date = $3, phone = $4, description = $5,
                play_date = $6, level = $7, language = $8, type = $9,
                club_name = $10, image = $11
            WHERE id = $1
            RETURNING *
        )
        SELECT p.*, u.username AS author_username
        FROM p LEFT JOIN users u ON u.id = p.author_id
        "#,
    )
    .bind(post_id)
    .bind(fields.user_gender)
    .bind(fields.birth_date)
    .bind(fields.phone)
    .bind(fields.description)
    .bind(fields.play_date)
    .bind(fields.level)
    .bind(fields.language)
    .bind(fields.play_type)
    .bind(fields.club_name)
    .bind(image)
    .fetch_one(pool)
    .await
}

pub async fn delete_post(pool: &PgPool, post_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tennis_posts WHERE id = $1")
        .bind(post_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_comments(pool: &PgPool, post_id: i64) -> Result<Vec<TennisComment>, sqlx::Error> {
    sqlx::query_as::<_, TennisComment>(
        r#"
        SELECT c.*, u.username AS author_username
        FROM tennis_comments c
        LEFT JOIN users u ON u.id = c.author_id
        WHERE c.post_id = $1
        ORDER BY c.created_at ASC, c.id ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
}

pub async fn create_comment(
    pool: &PgPool,
    post_id: i64,
    author_id: i64,
    text: &str,
    rank: &str,
) -> Result<TennisComment, sqlx::Error> {
    sqlx::query_as::<_, TennisComment>(
        r#"
        WITH c AS (
            INSERT INTO tennis_comments (post_id, author_id, text, rank)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        )
        SELECT c.*, u.username AS author_username
        FROM c LEFT JOIN users u ON u.id = c.author_id
        "#,
    )
    .bind(post_id)
    .bind(author_id)
    .bind(text)
    .bind(rank)
    .fetch_one(pool)
    .await
}
