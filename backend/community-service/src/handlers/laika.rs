/// Laika pet social: posts plus a per-user profile and pet
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use validator::Validate;

use crate::db::laika_repo::{self, PetFields};
use crate::error::Result;
use crate::forms::{checked, Flag, FormData};
use crate::media::{MediaStore, LAIKA_DIR};
use crate::metrics;
use crate::middleware::CurrentUser;
use crate::models::laika::{LaikaPost, DEFAULT_LAIKA_IMAGE};
use crate::search::{PostSearch, PostSearchParams};
use crate::security::OwnershipPolicy;

use super::{discard_on_error, form_page, found, see_other, validate_form, with_image_url, ImageChange};

/// Stored when the owner leaves the pet's name blank
const UNNAMED_PET: &str = "None";

#[derive(Debug, Deserialize, Validate)]
pub struct PostForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Title is required (at most 100 characters)."))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub description: String,
    pub remove_image: Option<Flag>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PetForm {
    #[serde(default)]
    #[validate(length(max = 20, message = "Ensure this value has at most 20 characters."))]
    pub pet_name: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 20, message = "Species is required (at most 20 characters)."))]
    pub species: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 20, message = "Type is required (at most 20 characters)."))]
    pub species_type: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub description: String,
}

impl PetForm {
    fn pet_name(&self) -> &str {
        match self.pet_name.trim() {
            "" => UNNAMED_PET,
            name => name,
        }
    }
}

pub(crate) fn post_json(store: &MediaStore, post: &LaikaPost) -> Value {
    with_image_url(store, post, Some(&post.image))
}

async fn load_post(pool: &PgPool, post_id: i64) -> Result<LaikaPost> {
    found(laika_repo::find_post(pool, post_id).await?, "Post")
}

/// `GET /laika/`
pub async fn list(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    query: web::Query<PostSearchParams>,
) -> Result<HttpResponse> {
    let params = query.into_inner();
    let search = PostSearch::try_from(params.clone())?;
    let posts = laika_repo::list_posts(pool.get_ref(), &search).await?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "laika/list",
        "user": user.username,
        "search": params,
        "posts": posts.iter().map(|p| post_json(&store, p)).collect::<Vec<_>>(),
    })))
}

/// `GET /laika/{id}/`
pub async fn detail(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    _user: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "page": "laika/detail",
        "post": post_json(&store, &post),
    })))
}

pub async fn create_page(_user: CurrentUser) -> HttpResponse {
    form_page("laika/create", &["title", "description", "add_image"])
}

/// `POST /laika/create/`
pub async fn create(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    mut form: FormData<PostForm>,
) -> Result<HttpResponse> {
    validate_form(&form.data)?;
    let image = match form.take_file("add_image") {
        Some(file) => Some(store.save_image(LAIKA_DIR, file, None).await?),
        None => None,
    };
    let data = form.into_inner();

    let saved = laika_repo::create_post(
        pool.get_ref(),
        user.id,
        data.title.trim(),
        &data.description,
        image.as_deref(),
    )
    .await;
    let post = discard_on_error(&store, image.as_deref(), saved).await?;

    metrics::record_created("laika", "post");
    tracing::info!(post_id = post.id, author_id = user.id, "Laika post created");
    Ok(see_other("/laika/"))
}

pub async fn update_page(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrStaff.check(&user, &post)?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "laika/update",
        "post": post_json(&store, &post),
        "form": { "fields": ["title", "description", "remove_image", "replace_image"] },
    })))
}

/// `POST /laika/{id}/update/`; removing the image restores the default picture
pub async fn update(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
    mut form: FormData<PostForm>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrStaff.check(&user, &post)?;
    validate_form(&form.data)?;

    let upload = form.take_file("replace_image");
    let data = form.into_inner();
    let change = ImageChange::resolve(
        &store,
        LAIKA_DIR,
        Some(&post.image),
        upload,
        checked(&data.remove_image),
        None,
    )
    .await?;

    let saved = laika_repo::update_post(
        pool.get_ref(),
        post.id,
        data.title.trim(),
        &data.description,
        change.image.as_deref().unwrap_or(DEFAULT_LAIKA_IMAGE),
    )
    .await;
    change.settle(&store, saved).await?;

    tracing::info!(post_id = post.id, by = user.id, "Laika post updated");
    Ok(see_other(format!("/laika/{}/", post.id)))
}

pub async fn delete_page(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrStaff.check(&user, &post)?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "laika/delete",
        "post": post_json(&store, &post),
    })))
}

/// `POST /laika/{id}/delete/`
pub async fn delete(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrStaff.check(&user, &post)?;

    laika_repo::delete_post(pool.get_ref(), post.id).await?;
    store.remove(&post.image).await;

    tracing::info!(post_id = post.id, by = user.id, "Laika post deleted");
    Ok(see_other("/laika/"))
}

/// `GET /laika/profile/`
pub async fn profile_page(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
) -> Result<HttpResponse> {
    let profile = laika_repo::find_profile(pool.get_ref(), user.id).await?;
    let pet = laika_repo::find_pet_by_owner(pool.get_ref(), user.id).await?;
    let image_url = store.url(
        profile
            .as_ref()
            .map_or(DEFAULT_LAIKA_IMAGE, |p| p.image.as_str()),
    );

    Ok(HttpResponse::Ok().json(json!({
        "page": "laika/profile",
        "user": { "id": user.id, "username": user.username, "email": user.email },
        "profile": profile,
        "image_url": image_url,
        "pet": pet,
        "form": { "fields": ["image", "pet_name", "species", "species_type", "description"] },
    })))
}

/// `POST /laika/profile/`: get-or-create the profile and the owner's pet
pub async fn update_profile(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    mut form: FormData<PetForm>,
) -> Result<HttpResponse> {
    validate_form(&form.data)?;

    let previous = laika_repo::find_profile(pool.get_ref(), user.id).await?;
    let image = match form.take_file("image") {
        Some(file) => Some(store.save_image(LAIKA_DIR, file, None).await?),
        None => None,
    };
    let data = form.into_inner();

    let pet = PetFields {
        pet_name: data.pet_name(),
        species: data.species.trim(),
        species_type: data.species_type.trim(),
        description: &data.description,
    };
    let saved = laika_repo::save_profile(pool.get_ref(), user.id, image.as_deref(), pet).await;
    let (_, pet) = discard_on_error(&store, image.as_deref(), saved).await?;

    if let (Some(_), Some(old)) = (&image, previous) {
        store.remove(&old.image).await;
    }

    tracing::info!(user_id = user.id, pet_id = pet.id, "Laika profile saved");
    Ok(see_other("/laika/profile/"))
}
