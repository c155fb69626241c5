use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::Authored;

pub const DEFAULT_TENNIS_IMAGE: &str = "tennis_img/default.png";

/// Fixed choice list stored as a one-character code
pub struct Choices(pub &'static [(&'static str, &'static str)]);

impl Choices {
    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|(c, _)| *c == code)
    }

    pub fn label(&self, code: &str) -> Option<&'static str> {
        self.0.iter().find(|(c, _)| *c == code).map(|(_, l)| *l)
    }
}

pub const GENDERS: Choices = Choices(&[("M", "Male"), ("F", "Female"), ("O", "Other")]);

pub const LEVELS: Choices = Choices(&[
    ("1", "Novice"),
    ("2", "Intermediate"),
    ("3", "Advanced"),
    ("4", "Expert"),
    ("5", "Master"),
]);

pub const LANGUAGES: Choices = Choices(&[
    ("1", "english"),
    ("2", "deutsch"),
    ("3", "spanish"),
    ("4", "french"),
    ("5", "persia"),
]);

pub const RANKS: Choices = Choices(&[
    ("1", "Very Bad"),
    ("2", "Bad"),
    ("3", "Good"),
    ("4", "Very Good"),
    ("5", "Perfect"),
]);

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TennisPost {
    pub id: i64,
    pub user_gender: Option<String>,
    pub birth_date: NaiveDate,
    pub phone: String,
    pub description: String,
    #[sqlx(rename = "created_on")]
    pub current_date: NaiveDate,
    pub play_date: DateTime<Utc>,
    pub image: String,
    pub level: String,
    pub language: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub play_type: String,
    pub club_name: Option<String>,
    #[serde(rename = "author")]
    pub author_id: Option<i64>,
    pub author_username: Option<String>,
}

impl Authored for TennisPost {
    fn author_id(&self) -> Option<i64> {
        self.author_id
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TennisComment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: Option<i64>,
    pub author_username: Option<String>,
    pub text: String,
    pub rank: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_lookup() {
        assert!(LEVELS.contains("5"));
        assert!(!LEVELS.contains("6"));
        assert_eq!(LANGUAGES.label("3"), Some("spanish"));
        assert_eq!(GENDERS.label("X"), None);
        assert!(!RANKS.contains(""));
    }
}
