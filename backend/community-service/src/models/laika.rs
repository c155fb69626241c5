use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

use super::Authored;

pub const DEFAULT_LAIKA_IMAGE: &str = "laika_img/laika_logo_400.png";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LaikaProfile {
    pub user_id: i64,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Pet {
    pub id: i64,
    pub owner_id: i64,
    pub pet_name: String,
    pub species: String,
    pub species_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LaikaPost {
    pub id: i64,
    #[serde(rename = "author")]
    pub author_id: i64,
    pub author_username: String,
    pub image: String,
    pub title: String,
    pub description: String,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
}

impl Authored for LaikaPost {
    fn author_id(&self) -> Option<i64> {
        Some(self.author_id)
    }
}
