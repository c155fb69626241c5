use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use super::Authored;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Technology,
    Services,
    Vehicles,
    FashionBeauty,
    Furniture,
    Animals,
    PropertyForRent,
    Books,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Technology,
        Category::Services,
        Category::Vehicles,
        Category::FashionBeauty,
        Category::Furniture,
        Category::Animals,
        Category::PropertyForRent,
        Category::Books,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Technology => "technology",
            Category::Services => "services",
            Category::Vehicles => "vehicles",
            Category::FashionBeauty => "fashion_beauty",
            Category::Furniture => "furniture",
            Category::Animals => "animals",
            Category::PropertyForRent => "property_for_rent",
            Category::Books => "books",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Technology => "Technology",
            Category::Services => "Services",
            Category::Vehicles => "Vehicles",
            Category::FashionBeauty => "Fashion & Beauty",
            Category::Furniture => "Furniture",
            Category::Animals => "Animals",
            Category::PropertyForRent => "Property for rent",
            Category::Books => "Books",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Select a valid choice. {s} is not one of the available choices."))
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MarketplaceItem {
    pub id: i64,
    #[serde(rename = "author")]
    pub author_id: i64,
    pub author_username: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub location: Option<String>,
    /// Stored as the snake_case category key
    pub category: Option<String>,
    pub image: Option<String>,
}

impl Authored for MarketplaceItem {
    fn author_id(&self) -> Option<i64> {
        Some(self.author_id)
    }
}
