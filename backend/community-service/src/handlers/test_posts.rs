/// Generic posts under `/test/`
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::db::test_post_repo;
use crate::error::Result;
use crate::forms::FormData;
use crate::metrics;
use crate::middleware::CurrentUser;
use crate::models::test_post::TestPost;
use crate::security::OwnershipPolicy;

use super::{form_page, found, see_other, validate_form};

#[derive(Debug, Deserialize, Validate)]
pub struct TestPostForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Title is required (at most 100 characters)."))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub description: String,
}

async fn load_post(pool: &PgPool, post_id: i64) -> Result<TestPost> {
    found(test_post_repo::find_post(pool, post_id).await?, "Post")
}

pub async fn list(pool: web::Data<PgPool>, _user: CurrentUser) -> Result<HttpResponse> {
    let posts = test_post_repo::list_posts(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "page": "test/list", "posts": posts })))
}

pub async fn detail(
    pool: web::Data<PgPool>,
    _user: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "page": "test/detail", "post": post })))
}

pub async fn create_page(_user: CurrentUser) -> HttpResponse {
    form_page("test/create", &["title", "description"])
}

pub async fn create(
    pool: web::Data<PgPool>,
    CurrentUser(user): CurrentUser,
    form: FormData<TestPostForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    validate_form(&form)?;

    let post =
        test_post_repo::create_post(pool.get_ref(), user.id, form.title.trim(), &form.description)
            .await?;

    metrics::record_created("test", "post");
    tracing::info!(post_id = post.id, "Test post created");
    Ok(see_other("/test/"))
}

pub async fn edit_page(
    pool: web::Data<PgPool>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrStaff.check(&user, &post)?;
    Ok(HttpResponse::Ok().json(json!({
        "page": "test/edit",
        "post": post,
        "form": { "fields": ["title", "description"] },
    })))
}

pub async fn edit(
    pool: web::Data<PgPool>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
    form: FormData<TestPostForm>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrStaff.check(&user, &post)?;
    let form = form.into_inner();
    validate_form(&form)?;

    test_post_repo::update_post(pool.get_ref(), post.id, form.title.trim(), &form.description)
        .await?;
    Ok(see_other(format!("/test/{}/", post.id)))
}

pub async fn delete_page(
    pool: web::Data<PgPool>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrStaff.check(&user, &post)?;
    Ok(HttpResponse::Ok().json(json!({ "page": "test/delete", "post": post })))
}

pub async fn delete(
    pool: web::Data<PgPool>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrStaff.check(&user, &post)?;

    test_post_repo::delete_post(pool.get_ref(), post.id).await?;
    tracing::info!(post_id = post.id, by = user.id, "Test post deleted");
    Ok(see_other("/test/"))
}
