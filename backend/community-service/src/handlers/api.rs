//! JSON API over parenting, laika, marketplace and tennis records
//!
//! `PUT` must carry every required writable field; `PATCH` any subset.
//! `author` and `image` are read-only here. Mutations need the author or a
//! staff account.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::db::{laika_repo, marketplace_repo, parenting_repo, tennis_repo};
use crate::error::{ensure_valid, push_field_error, FieldErrors, Result};
use crate::media::MediaStore;
use crate::middleware::CurrentUser;
use crate::search::{MarketplaceSearch, PostSearch, TennisSearch};
use crate::security::OwnershipPolicy;

use super::{found, laika, marketplace, parenting, tennis, validate_form};

const POLICY: OwnershipPolicy = OwnershipPolicy::AuthorOrStaff;

/// Full replacement or partial update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Put,
    Patch,
}

/// Fills absent fields from the stored record, noting which were required
struct Merge {
    mode: UpdateMode,
    errors: FieldErrors,
}

impl Merge {
    fn new(mode: UpdateMode) -> Self {
        Self {
            mode,
            errors: FieldErrors::new(),
        }
    }

    /// Required field: `PUT` must supply it
    fn required<T>(&mut self, field: &str, incoming: Option<T>, current: T) -> T {
        match incoming {
            Some(value) => value,
            None => {
                if self.mode == UpdateMode::Put {
                    push_field_error(&mut self.errors, field, "This field is required.");
                }
                current
            }
        }
    }

    /// Optional field: absent keeps the stored value
    fn optional<T>(&mut self, incoming: Option<T>, current: T) -> T {
        incoming.unwrap_or(current)
    }

    fn finish(self) -> Result<()> {
        ensure_valid(self.errors)
    }
}

/// JSON number or string, as clients send prices either way
fn text_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Parenting
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

pub async fn parenting_list(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    _user: CurrentUser,
) -> Result<HttpResponse> {
    let posts = parenting_repo::list_posts(pool.get_ref(), &PostSearch::default()).await?;
    Ok(HttpResponse::Ok().json(
        posts
            .iter()
            .map(|p| parenting::post_json(&store, p))
            .collect::<Vec<_>>(),
    ))
}

pub async fn parenting_retrieve(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    _user: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = found(parenting_repo::find_post(pool.get_ref(), path.into_inner()).await?, "Post")?;
    Ok(HttpResponse::Ok().json(parenting::post_json(&store, &post)))
}

async fn parenting_update(
    pool: &PgPool,
    store: &MediaStore,
    user: CurrentUser,
    post_id: i64,
    body: PostPatch,
    mode: UpdateMode,
) -> Result<HttpResponse> {
    let post = found(parenting_repo::find_post(pool, post_id).await?, "Post")?;
    POLICY.check(&user.0, &post)?;

    let mut merge = Merge::new(mode);
    let form = parenting::PostForm {
        title: merge.required("title", body.title, post.title.clone()),
        description: merge.required("description", body.description, post.description.clone()),
        remove_image: None,
    };
    merge.finish()?;
    validate_form(&form)?;

    let updated = parenting_repo::update_post(
        pool,
        post.id,
        form.title.trim(),
        &form.description,
        post.image.as_deref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(parenting::post_json(store, &updated)))
}

pub async fn parenting_put(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    user: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<PostPatch>,
) -> Result<HttpResponse> {
    parenting_update(&pool, &store, user, path.into_inner(), body.into_inner(), UpdateMode::Put).await
}

pub async fn parenting_patch(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    user: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<PostPatch>,
) -> Result<HttpResponse> {
    parenting_update(&pool, &store, user, path.into_inner(), body.into_inner(), UpdateMode::Patch).await
}

pub async fn parenting_delete(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = found(parenting_repo::find_post(pool.get_ref(), path.into_inner()).await?, "Post")?;
    POLICY.check(&user, &post)?;

    parenting_repo::delete_post(pool.get_ref(), post.id).await?;
    if let Some(image) = &post.image {
        store.remove(image).await;
    }
    tracing::info!(post_id = post.id, by = user.id, "Parenting post deleted via API");
    Ok(HttpResponse::NoContent().finish())
}

// ---------------------------------------------------------------------------
// Laika
// ---------------------------------------------------------------------------

pub async fn laika_list(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    _user: CurrentUser,
) -> Result<HttpResponse> {
    let posts = laika_repo::list_posts(pool.get_ref(), &PostSearch::default()).await?;
    Ok(HttpResponse::Ok().json(
        posts
            .iter()
            .map(|p| laika::post_json(&store, p))
            .collect::<Vec<_>>(),
    ))
}

pub async fn laika_retrieve(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    _user: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = found(laika_repo::find_post(pool.get_ref(), path.into_inner()).await?, "Post")?;
    Ok(HttpResponse::Ok().json(laika::post_json(&store, &post)))
}

async fn laika_update(
    pool: &PgPool,
    store: &MediaStore,
    user: CurrentUser,
    post_id: i64,
    body: PostPatch,
    mode: UpdateMode,
) -> Result<HttpResponse> {
    let post = found(laika_repo::find_post(pool, post_id).await?, "Post")?;
    POLICY.check(&user.0, &post)?;

    let mut merge = Merge::new(mode);
    let form = laika::PostForm {
        title: merge.required("title", body.title, post.title.clone()),
        description: merge.required("description", body.description, post.description.clone()),
        remove_image: None,
    };
    merge.finish()?;
    validate_form(&form)?;

    let updated =
        laika_repo::update_post(pool, post.id, form.title.trim(), &form.description, &post.image)
            .await?;
    Ok(HttpResponse::Ok().json(laika::post_json(store, &updated)))
}

pub async fn laika_put(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    user: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<PostPatch>,
) -> Result<HttpResponse> {
    laika_update(&pool, &store, user, path.into_inner(), body.into_inner(), UpdateMode::Put).await
}

pub async fn laika_patch(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    user: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<PostPatch>,
) -> Result<HttpResponse> {
    laika_update(&pool, &store, user, path.into_inner(), body.into_inner(), UpdateMode::Patch).await
}

pub async fn laika_delete(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = found(laika_repo::find_post(pool.get_ref(), path.into_inner()).await?, "Post")?;
    POLICY.check(&user, &post)?;

    laika_repo::delete_post(pool.get_ref(), post.id).await?;
    store.remove(&post.image).await;
    tracing::info!(post_id = post.id, by = user.id, "Laika post deleted via API");
    Ok(HttpResponse::NoContent().finish())
}

// ---------------------------------------------------------------------------
// Marketplace
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Value>,
    pub location: Option<String>,
    pub category: Option<String>,
}

pub async fn marketplace_list(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    _user: CurrentUser,
) -> Result<HttpResponse> {
    let items = marketplace_repo::list_items(pool.get_ref(), &MarketplaceSearch::default()).await?;
    Ok(HttpResponse::Ok().json(
        items
            .iter()
            .map(|i| marketplace::item_json(&store, i))
            .collect::<Vec<_>>(),
    ))
}

pub async fn marketplace_retrieve(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    _user: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let item = found(marketplace_repo::find_item(pool.get_ref(), path.into_inner()).await?, "Listing")?;
    Ok(HttpResponse::Ok().json(marketplace::item_json(&store, &item)))
}

async fn marketplace_update(
    pool: &PgPool,
    store: &MediaStore,
    user: CurrentUser,
    item_id: i64,
    body: ItemPatch,
    mode: UpdateMode,
) -> Result<HttpResponse> {
    let item = found(marketplace_repo::find_item(pool, item_id).await?, "Listing")?;
    POLICY.check(&user.0, &item)?;

    let mut merge = Merge::new(mode);
    let form = marketplace::ItemForm {
        title: merge.required("title", body.title, item.title.clone()),
        description: merge.required("description", body.description, item.description.clone()),
        price: merge.required("price", body.price.map(text_value), item.price.to_string()),
        location: merge.optional(body.location.map(Some), item.location.clone()),
        category: merge.optional(body.category.map(Some), item.category.clone()),
        remove_image: None,
    };
    merge.finish()?;
    let clean = form.clean()?;

    let updated =
        marketplace_repo::update_item(pool, item.id, &form.fields(&clean, item.image.as_deref())).await?;
    Ok(HttpResponse::Ok().json(marketplace::item_json(store, &updated)))
}

pub async fn marketplace_put(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    user: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<ItemPatch>,
) -> Result<HttpResponse> {
    marketplace_update(&pool, &store, user, path.into_inner(), body.into_inner(), UpdateMode::Put).await
}

pub async fn marketplace_patch(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    user: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<ItemPatch>,
) -> Result<HttpResponse> {
    marketplace_update(&pool, &store, user, path.into_inner(), body.into_inner(), UpdateMode::Patch).await
}

pub async fn marketplace_delete(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let item = found(marketplace_repo::find_item(pool.get_ref(), path.into_inner()).await?, "Listing")?;
    POLICY.check(&user, &item)?;

    marketplace_repo::delete_item(pool.get_ref(), item.id).await?;
    if let Some(image) = &item.image {
        store.remove(image).await;
    }
    tracing::info!(item_id = item.id, by = user.id, "Listing deleted via API");
    Ok(HttpResponse::NoContent().finish())
}

// ---------------------------------------------------------------------------
// Tennis
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct TennisPatch {
    pub user_gender: Option<String>,
    pub birth_date: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub play_date: Option<String>,
    pub level: Option<String>,
    pub language: Option<String>,
    #[serde(rename = "type")]
    pub play_type: Option<String>,
    pub club_name: Option<String>,
}

pub async fn tennis_list(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    _user: CurrentUser,
) -> Result<HttpResponse> {
    let today = chrono::Utc::now().date_naive();
    let posts = tennis_repo::list_posts(pool.get_ref(), &TennisSearch::default(), today).await?;
    Ok(HttpResponse::Ok().json(
        posts
            .iter()
            .map(|p| tennis::post_json(&store, p))
            .collect::<Vec<_>>(),
    ))
}

pub async fn tennis_retrieve(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    _user: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = found(tennis_repo::find_post(pool.get_ref(), path.into_inner()).await?, "Post")?;
    Ok(HttpResponse::Ok().json(tennis::post_json(&store, &post)))
}

async fn tennis_update(
    pool: &PgPool,
    store: &MediaStore,
    user: CurrentUser,
    post_id: i64,
    body: TennisPatch,
    mode: UpdateMode,
) -> Result<HttpResponse> {
    let post = found(tennis_repo::find_post(pool, post_id).await?, "Post")?;
    POLICY.check(&user.0, &post)?;

    let mut merge = Merge::new(mode);
    let form = tennis::TennisForm {
        user_gender: merge.optional(body.user_gender.map(Some), post.user_gender.clone()),
        birth_date: merge.required(
            "birth_date",
            body.birth_date,
            post.birth_date.format("%Y-%m-%d").to_string(),
        ),
        phone: merge.required("phone", body.phone, post.phone.clone()),
        description: merge.required("description", body.description, post.description.clone()),
        play_date: merge.required("play_date", body.play_date, post.play_date.to_rfc3339()),
        level: merge.required("level", body.level, post.level.clone()),
        language: merge.required("language", body.language, post.language.clone()),
        play_type: merge.required("type", body.play_type, post.play_type.clone()),
        club_name: merge.optional(body.club_name.map(Some), post.club_name.clone()),
    };
    merge.finish()?;
    let clean = form.clean()?;

    let updated = tennis_repo::update_post(pool, post.id, &form.fields(&clean), &post.image).await?;
    Ok(HttpResponse::Ok().json(tennis::post_json(store, &updated)))
}

pub async fn tennis_put(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    user: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<TennisPatch>,
) -> Result<HttpResponse> {
    tennis_update(&pool, &store, user, path.into_inner(), body.into_inner(), UpdateMode::Put).await
}

pub async fn tennis_patch(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    user: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<TennisPatch>,
) -> Result<HttpResponse> {
    tennis_update(&pool, &store, user, path.into_inner(), body.into_inner(), UpdateMode::Patch).await
}

pub async fn tennis_delete(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = found(tennis_repo::find_post(pool.get_ref(), path.into_inner()).await?, "Post")?;
    POLICY.check(&user, &post)?;

    tennis_repo::delete_post(pool.get_ref(), post.id).await?;
    store.remove(&post.image).await;
    tracing::info!(post_id = post.id, by = user.id, "Tennis post deleted via API");
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_requires_every_required_field() {
        let mut merge = Merge::new(UpdateMode::Put);
        let title = merge.required("title", None, "old".to_string());
        let description = merge.required("description", Some("new".to_string()), "old".to_string());
        assert_eq!(title, "old");
        assert_eq!(description, "new");
        match merge.finish() {
            Err(crate::error::AppError::Validation(fields)) => {
                assert!(fields.contains_key("title"));
                assert!(!fields.contains_key("description"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn patch_keeps_stored_values() {
        let mut merge = Merge::new(UpdateMode::Patch);
        assert_eq!(merge.required("title", None, "old".to_string()), "old");
        assert_eq!(merge.optional(None, Some("Berlin".to_string())), Some("Berlin".to_string()));
        assert_eq!(merge.optional(Some(None::<String>), Some("Berlin".to_string())), None);
        assert!(merge.finish().is_ok());
    }

    #[test]
    fn prices_accept_numbers_and_strings() {
        assert_eq!(text_value(serde_json::json!(12.5)), "12.5");
        assert_eq!(text_value(serde_json::json!("12.50")), "12.50");
    }
}
