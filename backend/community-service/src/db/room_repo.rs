use std::collections::HashSet;

use crate::models::room::{slugify, Message, Room};
use sqlx::PgPool;

/// Messages shown when a room page opens
pub const ROOM_HISTORY_LIMIT: i64 = 25;

/// Slug insert attempts before giving up on concurrent collisions
const SLUG_ATTEMPTS: usize = 5;

/// Rooms the user takes part in, newest first
pub async fn list_rooms_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<Room>, sqlx::Error> {
    sqlx::query_as::<_, Room>(
        r#"
        SELECT * FROM rooms
        WHERE chat_initiator_id = $1 OR post_author_id = $1
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn find_room(pool: &PgPool, room_id: i64) -> Result<Option<Room>, sqlx::Error> {
    sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1")
        .bind(room_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_room_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Room>, sqlx::Error> {
    sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await
}

/// First free slug for `base` given the slugs already taken: `base`, `base-2`, `base-3`, ...
pub fn next_slug(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|s| s == base) {
        return base.to_string();
    }

    let suffixes: HashSet<u32> = taken
        .iter()
        .filter_map(|s| s.strip_prefix(base)?.strip_prefix('-')?.parse::<u32>().ok())
        .collect();
    let highest = suffixes.iter().copied().max().unwrap_or(1);

    // A suffix at u32::MAX falls back to the lowest gap
    let suffix = match highest.checked_add(1) {
        Some(next) => next,
        None => (2..).find(|n| !suffixes.contains(n)).unwrap_or(2),
    };
    format!("{}-{}", base, suffix)
}

/// Create a room with a unique slug derived from `name`
pub async fn create_room(
    pool: &PgPool,
    name: &str,
    chat_initiator_id: i64,
    post_author_id: i64,
) -> Result<Room, sqlx::Error> {
    let base = slugify(name);

    for _ in 0..SLUG_ATTEMPTS {
        let taken: Vec<String> = sqlx::query_scalar(
            "SELECT slug FROM rooms WHERE slug = $1 OR slug LIKE $1 || '-%'",
        )
        .bind(&base)
        .fetch_all(pool)
        .await?;

        let slug = next_slug(&base, &taken);

        let room = sqlx::query_as::<_, Room>(
            r#"
            INSERT INTO rooms (name, slug, chat_initiator_id, post_author_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(&slug)
        .bind(chat_initiator_id)
        .bind(post_author_id)
        .fetch_optional(pool)
        .await?;

        if let Some(room) = room {
            return Ok(room);
        }
        tracing::debug!(slug = %slug, "Room slug taken concurrently, retrying");
    }

    Err(sqlx::Error::Protocol(format!(
        "could not allocate a unique slug for room '{}'",
        name
    )))
}

/// The room's first messages in chronological order
pub async fn room_history(pool: &PgPool, room_id: i64) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT m.*, u.username
        FROM messages m
        JOIN users u ON u.id = m.user_id
        WHERE m.room_id = $1
        ORDER BY m.date_added ASC, m.id ASC
        LIMIT $2
        "#,
    )
    .bind(room_id)
    .bind(ROOM_HISTORY_LIMIT)
    .fetch_all(pool)
    .await
}

pub async fn insert_message(
    pool: &PgPool,
    room_id: i64,
    user_id: i64,
    content: &str,
) -> Result<Message, sqlx::Error> {
    sqlx::query_as::<_, Message>(
        r#"
        WITH m AS (
            INSERT INTO messages (room_id, user_id, content)
            VALUES ($1, $2, $3)
            RETURNING *
        )
        SELECT m.*, u.username
        FROM m JOIN users u ON u.id = m.user_id
        "#,
    )
    .bind(room_id)
    .bind(user_id)
    .bind(content)
    .fetch_one(pool)
    .await
}
