use crate::models::marketplace::{Category, MarketplaceItem};
use crate::search::{MarketplaceSearch, Predicates};
use rust_decimal::Decimal;
use sqlx::{PgPool, QueryBuilder};

const SELECT_ITEMS: &str = r#"
    SELECT p.*, u.username AS author_username
    FROM marketplace_items p
    JOIN users u ON u.id = p.author_id
"#;

/// Writable columns of a listing
#[derive(Debug, Clone)]
pub struct ItemFields<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub price: Decimal,
    pub location: Option<&'a str>,
    pub category: Option<Category>,
    pub image: Option<&'a str>,
}

/// Listings matching `search`, newest first
pub async fn list_items(
    pool: &PgPool,
    search: &MarketplaceSearch,
) -> Result<Vec<MarketplaceItem>, sqlx::Error> {
    let mut qb = QueryBuilder::new(SELECT_ITEMS);
    search.push_predicates(&mut Predicates::new(&mut qb));
    qb.push(" ORDER BY p.created_on DESC, p.id DESC");

    qb.build_query_as::<MarketplaceItem>().fetch_all(pool).await
}

pub async fn list_items_by_author(
    pool: &PgPool,
    author_id: i64,
) -> Result<Vec<MarketplaceItem>, sqlx::Error> {
    sqlx::query_as::<_, MarketplaceItem>(&format!(
        "{SELECT_ITEMS} WHERE p.author_id = $1 ORDER BY p.created_on DESC, p.id DESC"
    ))
    .bind(author_id)
    .fetch_all(pool)
    .await
}

pub async fn find_item(pool: &PgPool, item_id: i64) -> Result<Option<MarketplaceItem>, sqlx::Error> {
    sqlx::query_as::<_, MarketplaceItem>(&format!("{SELECT_ITEMS} WHERE p.id = $1"))
        .bind(item_id)
        .fetch_optional(pool)
        .await
}

pub async fn create_item(
    pool: &PgPool,
    author_id: i64,
    fields: &ItemFields<'_>,
) -> Result<MarketplaceItem, sqlx::Error> {
    sqlx::query_as::<_, MarketplaceItem>(
        r#"
        WITH p AS (
            INSERT INTO marketplace_items
                (author_id, title, description, price, location, category, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
        )
        SELECT p.*, u.username AS author_username
        FROM p JOIN users u ON u.id = p.author_id
        "#,
    )
    .bind(author_id)
    .bind(fields.title)
    .bind(fields.description)
    .bind(fields.price)
    .bind(fields.location)
    .bind(fields.category.map(Category::as_str))
    .bind(fields.image)
    .fetch_one(pool)
    .await
}

pub async fn update_item(
    pool: &PgPool,
    item_id: i64,
    fields: &ItemFields<'_>,
) -> Result<MarketplaceItem, sqlx::Error> {
    sqlx::query_as::<_, MarketplaceItem>(
        r#"
        WITH p AS (
            UPDATE marketplace_items
            SET title = $2, description = $3, price = $4, location = $5,
                category = $6, image = $7, updated_on = NOW()
            WHERE id = $1
            RETURNING *
        )
        SELECT p.*, u.username AS author_username
        FROM p JOIN users u ON u.id = p.author_id
        "#,
    )
    .bind(item_id)
    .bind(fields.title)
    .bind(fields.description)
    .bind(fields.price)
    .bind(fields.location)
    .bind(fields.category.map(Category::as_str))
    .bind(fields.image)
    .fetch_one(pool)
    .await
}

pub async fn delete_item(pool: &PgPool, item_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM marketplace_items WHERE id = $1")
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
