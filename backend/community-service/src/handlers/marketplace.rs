/// Marketplace listings
use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use validator::Validate;

use crate::db::marketplace_repo::{self, ItemFields};
use crate::db::user_repo;
use crate::error::{collect_field_errors, ensure_valid, push_field_error, FieldErrors, Result};
use crate::forms::{checked, Flag, FormData};
use crate::media::{MediaStore, MARKETPLACE_DIR};
use crate::metrics;
use crate::middleware::CurrentUser;
use crate::models::marketplace::{Category, MarketplaceItem};
use crate::search::{MarketplaceSearch, MarketplaceSearchParams};
use crate::security::OwnershipPolicy;

use super::{blank_to_none, discard_on_error, found, see_other, with_image_url, ImageChange};

/// NUMERIC(10,2)
const MAX_PRICE_DIGITS: u32 = 10;
const PRICE_SCALE: u32 = 2;

#[derive(Debug, Deserialize, Validate)]
pub struct ItemForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Title is required (at most 100 characters)."))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub location: Option<String>,
    pub category: Option<String>,
    pub remove_image: Option<Flag>,
}

/// Parse a listing price: non-negative, two decimal places, fits NUMERIC(10,2)
pub fn parse_price(raw: &str) -> std::result::Result<Decimal, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("This field is required.".to_string());
    }
    let price: Decimal = raw.parse().map_err(|_| "Enter a number.".to_string())?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err("Ensure this value is greater than or equal to 0.".to_string());
    }
    if price.scale() > PRICE_SCALE {
        return Err(format!("Ensure that there are no more than {PRICE_SCALE} decimal places."));
    }
    let limit = Decimal::from(10_i64.pow(MAX_PRICE_DIGITS - PRICE_SCALE));
    if price >= limit {
        return Err(format!("Ensure that there are no more than {MAX_PRICE_DIGITS} digits in total."));
    }
    Ok(price)
}

/// Validated form values ready for the repository
pub(crate) struct CleanItem {
    price: Decimal,
    category: Option<Category>,
}

impl ItemForm {
    pub(crate) fn clean(&self) -> Result<CleanItem> {
        let mut errors: FieldErrors = collect_field_errors(self);

        let price = match parse_price(&self.price) {
            Ok(price) => Some(price),
            Err(msg) => {
                push_field_error(&mut errors, "price", msg);
                None
            }
        };
        let category = match blank_to_none(&self.category).map(str::parse::<Category>) {
            None => None,
            Some(Ok(category)) => Some(category),
            Some(Err(msg)) => {
                push_field_error(&mut errors, "category", msg);
                None
            }
        };

        ensure_valid(errors)?;
        Ok(CleanItem {
            price: price.unwrap_or_default(),
            category,
        })
    }

    pub(crate) fn fields<'a>(&'a self, clean: &CleanItem, image: Option<&'a str>) -> ItemFields<'a> {
        ItemFields {
            title: self.title.trim(),
            description: &self.description,
            price: clean.price,
            location: blank_to_none(&self.location),
            category: clean.category,
            image,
        }
    }
}

pub(crate) fn item_json(store: &MediaStore, item: &MarketplaceItem) -> Value {
    with_image_url(store, item, item.image.as_deref())
}

fn categories() -> Vec<Value> {
    Category::ALL
        .iter()
        .map(|c| json!({ "key": c.as_str(), "label": c.label() }))
        .collect()
}

async fn load_item(pool: &PgPool, item_id: i64) -> Result<MarketplaceItem> {
    found(marketplace_repo::find_item(pool, item_id).await?, "Listing")
}

/// `GET /marketplace/`
pub async fn list(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
) -> Result<HttpResponse> {
    let items = marketplace_repo::list_items(pool.get_ref(), &MarketplaceSearch::default()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "marketplace/list",
        "user": user.username,
        "categories": categories(),
        "items": items.iter().map(|i| item_json(&store, i)).collect::<Vec<_>>(),
    })))
}

/// `GET /marketplace/search_results/`
pub async fn search_results(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    _user: CurrentUser,
    query: web::Query<MarketplaceSearchParams>,
) -> Result<HttpResponse> {
    let params = query.into_inner();
    let search = MarketplaceSearch::try_from(params.clone())?;
    let items = marketplace_repo::list_items(pool.get_ref(), &search).await?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "marketplace/search_results",
        "search": params,
        "categories": categories(),
        "items": items.iter().map(|i| item_json(&store, i)).collect::<Vec<_>>(),
    })))
}

/// `GET /marketplace/my_posts/{username}/`
pub async fn my_posts(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    _user: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let owner = found(
        user_repo::find_user_by_username(pool.get_ref(), &path).await?,
        "User",
    )?;
    let items = marketplace_repo::list_items_by_author(pool.get_ref(), owner.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "marketplace/my_posts",
        "owner": owner.username,
        "items": items.iter().map(|i| item_json(&store, i)).collect::<Vec<_>>(),
    })))
}

/// `GET /marketplace/detail_post/{id}/`
pub async fn detail_post(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let item = load_item(pool.get_ref(), path.into_inner()).await?;
    let can_edit = OwnershipPolicy::AuthorOrModerator.allows(&user, &item);

    Ok(HttpResponse::Ok().json(json!({
        "page": "marketplace/detail",
        "item": item_json(&store, &item),
        "category_label": item
            .category
            .as_deref()
            .and_then(|c| c.parse::<Category>().ok())
            .map(Category::label),
        "can_edit": can_edit,
    })))
}

pub async fn create_page(_user: CurrentUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "page": "marketplace/create",
        "form": { "fields": ["title", "description", "price", "location", "category", "image"] },
        "categories": categories(),
    }))
}

/// `POST /marketplace/create/`
pub async fn create(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    mut form: FormData<ItemForm>,
) -> Result<HttpResponse> {
    let clean = form.data.clean()?;
    let image = match form.take_file("image") {
        Some(file) => Some(store.save_image(MARKETPLACE_DIR, file, None).await?),
        None => None,
    };
    let data = form.into_inner();

    let saved =
        marketplace_repo::create_item(pool.get_ref(), user.id, &data.fields(&clean, image.as_deref()))
            .await;
    let item = discard_on_error(&store, image.as_deref(), saved).await?;

    metrics::record_created("marketplace", "item");
    tracing::info!(item_id = item.id, author_id = user.id, price = %item.price, "Listing created");
    Ok(see_other("/marketplace/"))
}

pub async fn update_page(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let item = load_item(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrModerator.check(&user, &item)?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "marketplace/update",
        "item": item_json(&store, &item),
        "form": { "fields": ["title", "description", "price", "location", "category", "image", "remove_image"] },
        "categories": categories(),
    })))
}

/// `POST /marketplace/update_post/{id}/`
pub async fn update_post(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
    mut form: FormData<ItemForm>,
) -> Result<HttpResponse> {
    let item = load_item(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrModerator.check(&user, &item)?;
    let clean = form.data.clean()?;

    let upload = form.take_file("image");
    let data = form.into_inner();
    let change = ImageChange::resolve(
        &store,
        MARKETPLACE_DIR,
        item.image.as_deref(),
        upload,
        checked(&data.remove_image),
        None,
    )
    .await?;

    let saved = marketplace_repo::update_item(
        pool.get_ref(),
        item.id,
        &data.fields(&clean, change.image.as_deref()),
    )
    .await;
    change.settle(&store, saved).await?;

    tracing::info!(item_id = item.id, by = user.id, "Listing updated");
    Ok(see_other("/marketplace/"))
}

pub async fn delete_page(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let item = load_item(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrModerator.check(&user, &item)?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "marketplace/delete",
        "item": item_json(&store, &item),
    })))
}

/// `POST /marketplace/delete_post/{id}/`
pub async fn delete_post(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let item = load_item(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrModerator.check(&user, &item)?;

    marketplace_repo::delete_item(pool.get_ref(), item.id).await?;
    if let Some(image) = &item.image {
        store.remove(image).await;
    }

    tracing::info!(item_id = item.id, by = user.id, "Listing deleted");
    Ok(see_other("/marketplace/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn form(price: &str, category: Option<&str>) -> ItemForm {
        ItemForm {
            title: "Pram".into(),
            description: "Barely used".into(),
            price: price.into(),
            location: Some("Berlin".into()),
            category: category.map(Into::into),
            remove_image: None,
        }
    }

    #[test]
    fn prices_follow_the_column_shape() {
        assert_eq!(parse_price(" 12.50 ").unwrap(), Decimal::new(1250, 2));
        assert_eq!(parse_price("0").unwrap(), Decimal::ZERO);
        assert!(parse_price("").is_err());
        assert!(parse_price("-1").is_err());
        assert!(parse_price("1.999").is_err());
        assert!(parse_price("100000000").is_err());
        assert!(parse_price("99999999.99").is_ok());
        assert!(parse_price("ten").is_err());
    }

    #[test]
    fn clean_collects_every_field_error() {
        let mut bad = form("abc", Some("boats"));
        bad.title.clear();
        match bad.clean() {
            Err(AppError::Validation(fields)) => {
                assert!(fields.contains_key("price"));
                assert!(fields.contains_key("category"));
                assert!(fields.contains_key("title"));
            }
            other => panic!("unexpected: {:?}", other.map(|c| c.price)),
        }
    }

    #[test]
    fn clean_form_maps_to_fields() {
        let form = form("5", Some("books"));
        let clean = form.clean().unwrap();
        let fields = form.fields(&clean, None);
        assert_eq!(fields.category, Some(Category::Books));
        assert_eq!(fields.price, Decimal::from(5));
        assert_eq!(fields.location, Some("Berlin"));
    }
}
