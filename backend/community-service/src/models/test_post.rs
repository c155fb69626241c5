use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::Authored;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TestPost {
    pub id: i64,
    #[serde(rename = "author")]
    pub author_id: i64,
    pub author_username: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Authored for TestPost {
    fn author_id(&self) -> Option<i64> {
        Some(self.author_id)
    }
}
