/// Tennis partner matchmaking
use actix_web::{web, HttpResponse};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use validator::Validate;

use crate::db::tennis_repo::{self, TennisFields};
use crate::error::{collect_field_errors, ensure_valid, push_field_error, AppError, FieldErrors, Result};
use crate::forms::FormData;
use crate::media::{MediaStore, TENNIS_DIR, TENNIS_THUMBNAIL};
use crate::metrics;
use crate::middleware::CurrentUser;
use crate::models::tennis::{Choices, TennisPost, DEFAULT_TENNIS_IMAGE, GENDERS, LANGUAGES, LEVELS, RANKS};
use crate::search::{TennisSearch, TennisSearchParams};
use crate::security::OwnershipPolicy;

use super::{blank_to_none, discard_on_error, found, see_other, with_image_url, ImageChange};

const PLAY_DATE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];

const POST_FIELDS: &[&str] = &[
    "user_gender",
    "birth_date",
    "phone",
    "description",
    "play_date",
    "image",
    "level",
    "language",
    "type",
    "club_name",
];

#[derive(Debug, Deserialize, Validate)]
pub struct TennisForm {
    pub user_gender: Option<String>,
    #[serde(default)]
    pub birth_date: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 50, message = "Phone is required (at most 50 characters)."))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 500, message = "Description is required (at most 500 characters)."))]
    pub description: String,
    #[serde(default)]
    pub play_date: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub language: String,
    #[serde(default, rename = "type")]
    #[validate(length(min = 1, max = 100, message = "Type is required (at most 100 characters)."))]
    pub play_type: String,
    #[validate(length(max = 50, message = "Ensure this value has at most 50 characters."))]
    pub club_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 500, message = "Comment is required (at most 500 characters)."))]
    pub text: String,
    #[serde(default)]
    pub rank: String,
}

/// Accepts `datetime-local` input or RFC 3339; naive times are taken as UTC
pub fn parse_play_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    PLAY_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn check_choice(errors: &mut FieldErrors, field: &str, value: &str, choices: &Choices) {
    if value.is_empty() {
        push_field_error(errors, field, "This field is required.");
    } else if !choices.contains(value) {
        push_field_error(
            errors,
            field,
            format!("Select a valid choice. {value} is not one of the available choices."),
        );
    }
}

/// Parsed dates of a valid form
pub(crate) struct CleanPost {
    birth_date: NaiveDate,
    play_date: DateTime<Utc>,
}

impl TennisForm {
    pub(crate) fn clean(&self) -> Result<CleanPost> {
        let mut errors = collect_field_errors(self);

        if let Some(gender) = blank_to_none(&self.user_gender) {
            if !GENDERS.contains(gender) {
                push_field_error(
                    &mut errors,
                    "user_gender",
                    format!("Select a valid choice. {gender} is not one of the available choices."),
                );
            }
        }
        check_choice(&mut errors, "level", self.level.trim(), &LEVELS);
        check_choice(&mut errors, "language", self.language.trim(), &LANGUAGES);

        let birth_date = NaiveDate::parse_from_str(self.birth_date.trim(), "%Y-%m-%d").ok();
        let play_date = parse_play_date(&self.play_date);

        match (birth_date, play_date) {
            (Some(birth_date), Some(play_date)) if errors.is_empty() => Ok(CleanPost {
                birth_date,
                play_date,
            }),
            (birth_date, play_date) => {
                if birth_date.is_none() {
                    push_field_error(&mut errors, "birth_date", "Enter a valid date (YYYY-MM-DD).");
                }
                if play_date.is_none() {
                    push_field_error(&mut errors, "play_date", "Enter a valid date/time.");
                }
                Err(AppError::Validation(errors))
            }
        }
    }

    pub(crate) fn fields<'a>(&'a self, clean: &CleanPost) -> TennisFields<'a> {
        TennisFields {
            user_gender: blank_to_none(&self.user_gender),
            birth_date: clean.birth_date,
            phone: self.phone.trim(),
            description: &self.description,
            play_date: clean.play_date,
            level: self.level.trim(),
            language: self.language.trim(),
            play_type: self.play_type.trim(),
            club_name: blank_to_none(&self.club_name),
        }
    }
}

impl CommentForm {
    fn clean(&self) -> Result<()> {
        let mut errors = collect_field_errors(self);
        let rank = self.rank.trim();
        if !rank.is_empty() && !RANKS.contains(rank) {
            push_field_error(
                &mut errors,
                "rank",
                format!("Select a valid choice. {rank} is not one of the available choices."),
            );
        }
        ensure_valid(errors)
    }
}

fn choices_json(choices: &Choices) -> Vec<Value> {
    choices
        .0
        .iter()
        .map(|(code, label)| json!({ "key": code, "label": label }))
        .collect()
}

pub(crate) fn post_json(store: &MediaStore, post: &TennisPost) -> Value {
    let mut value = with_image_url(store, post, Some(&post.image));
    if let Value::Object(map) = &mut value {
        map.insert("level_label".into(), LEVELS.label(&post.level).into());
        map.insert("language_label".into(), LANGUAGES.label(&post.language).into());
    }
    value
}

async fn load_post(pool: &PgPool, post_id: i64) -> Result<TennisPost> {
    found(tennis_repo::find_post(pool, post_id).await?, "Post")
}

/// `GET /tennis/` with the partner search form
pub async fn list(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    query: web::Query<TennisSearchParams>,
) -> Result<HttpResponse> {
    let params = query.into_inner();
    let search = TennisSearch::try_from(params.clone())?;
    let today = Utc::now().date_naive();
    let posts = tennis_repo::list_posts(pool.get_ref(), &search, today).await?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "tennis/list",
        "user": user.username,
        "search": params,
        "choices": {
            "gender": choices_json(&GENDERS),
            "level": choices_json(&LEVELS),
            "language": choices_json(&LANGUAGES),
        },
        "posts": posts.iter().map(|p| post_json(&store, p)).collect::<Vec<_>>(),
    })))
}

/// `GET /tennis/{id}/detail/`
pub async fn detail(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    let comments = tennis_repo::list_comments(pool.get_ref(), post.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "tennis/detail",
        "post": post_json(&store, &post),
        "comments": comments,
        "can_edit": OwnershipPolicy::AuthorOrStaff.allows(&user, &post),
        "can_delete": OwnershipPolicy::AuthorOnly.allows(&user, &post),
        "form": { "fields": ["text", "rank"], "ranks": choices_json(&RANKS) },
    })))
}

/// `POST /tennis/{id}/detail/`: add a comment
pub async fn comment(
    pool: web::Data<PgPool>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
    form: FormData<CommentForm>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    let form = form.into_inner();
    form.clean()?;

    let created =
        tennis_repo::create_comment(pool.get_ref(), post.id, user.id, form.text.trim(), form.rank.trim())
            .await?;

    metrics::record_created("tennis", "comment");
    tracing::info!(post_id = post.id, comment_id = created.id, "Tennis comment added");
    Ok(see_other(format!("/tennis/{}/detail/", post.id)))
}

pub async fn create_page(_user: CurrentUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "page": "tennis/create",
        "form": { "fields": POST_FIELDS },
        "choices": {
            "user_gender": choices_json(&GENDERS),
            "level": choices_json(&LEVELS),
            "language": choices_json(&LANGUAGES),
        },
    }))
}

/// `POST /tennis/create/`
pub async fn create(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    mut form: FormData<TennisForm>,
) -> Result<HttpResponse> {
    let clean = form.data.clean()?;
    let image = match form.take_file("image") {
        Some(file) => Some(
            store
                .save_image(TENNIS_DIR, file, Some(TENNIS_THUMBNAIL))
                .await?,
        ),
        None => None,
    };
    let data = form.into_inner();

    let saved = tennis_repo::create_post(
        pool.get_ref(),
        Some(user.id),
        &data.fields(&clean),
        image.as_deref(),
    )
    .await;
    let post = discard_on_error(&store, image.as_deref(), saved).await?;

    metrics::record_created("tennis", "post");
    tracing::info!(post_id = post.id, author_id = user.id, "Tennis post created");
    Ok(see_other("/tennis/"))
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
        "page": "tennis/update",
        "post": post_json(&store, &post),
        "form": { "fields": POST_FIELDS },
    })))
}

/// `POST /tennis/{id}/update/`
pub async fn update(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
    mut form: FormData<TennisForm>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrStaff.check(&user, &post)?;
    let clean = form.data.clean()?;

    let upload = form.take_file("image");
    let data = form.into_inner();
    let change = ImageChange::resolve(
        &store,
        TENNIS_DIR,
        Some(&post.image),
        upload,
        false,
        Some(TENNIS_THUMBNAIL),
    )
    .await?;

    let saved = tennis_repo::update_post(
        pool.get_ref(),
        post.id,
        &data.fields(&clean),
        change.image.as_deref().unwrap_or(DEFAULT_TENNIS_IMAGE),
    )
    .await;
    change.settle(&store, saved).await?;

    tracing::info!(post_id = post.id, by = user.id, "Tennis post updated");
    Ok(see_other(format!("/tennis/{}/detail/", post.id)))
}

pub async fn delete_page(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOnly.check(&user, &post)?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "tennis/delete",
        "post": post_json(&store, &post),
    })))
}

/// `POST /tennis/{id}/delete/`: author only
pub async fn delete(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOnly.check(&user, &post)?;

    tennis_repo::delete_post(pool.get_ref(), post.id).await?;
    store.remove(&post.image).await;

    tracing::info!(post_id = post.id, by = user.id, "Tennis post deleted");
    Ok(see_other("/tennis/"))
}
