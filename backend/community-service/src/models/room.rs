use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub chat_initiator_id: i64,
    pub post_author_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.chat_initiator_id == user_id || self.post_author_id == user_id
    }

    /// Broadcast group shared by every connection to this room
    pub fn group_name(&self) -> String {
        format!("chat_{}", self.slug)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub room_id: i64,
    pub user_id: i64,
    pub username: String,
    pub content: String,
    pub date_added: DateTime<Utc>,
}

/// Lowercase ASCII slug with runs of other characters collapsed to `-`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "room".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Kids' Soccer  Club!"), "kids-soccer-club");
        assert_eq!(slugify("  --Hello__World--  "), "hello-world");
        assert_eq!(slugify("Über Tennis"), "ber-tennis");
        assert_eq!(slugify("!!!"), "room");
    }

    #[test]
    fn participants_and_group() {
        let room = Room {
            id: 1,
            name: "Stroller".into(),
            slug: "stroller".into(),
            chat_initiator_id: 10,
            post_author_id: 20,
            created_at: Utc::now(),
        };
        assert!(room.is_participant(10));
        assert!(room.is_participant(20));
        assert!(!room.is_participant(30));
        assert_eq!(room.group_name(), "chat_stroller");
    }
}
