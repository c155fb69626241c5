/// Parenting forum: posts with two-level comment threads
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use validator::Validate;

use crate::db::{comment_repo, parenting_repo};
use crate::error::{AppError, Result};
use crate::forms::{checked, Flag, FormData};
use crate::media::{MediaStore, PARENTING_DIR};
use crate::metrics;
use crate::middleware::{CurrentUser, OptionalUser};
use crate::models::parenting::{build_threads, ParentingComment, ParentingPost};
use crate::models::User;
use crate::search::{PostSearch, PostSearchParams};
use crate::security::OwnershipPolicy;

use super::{blank_to_none, discard_on_error, form_page, found, parse_id, see_other, validate_form, with_image_url, ImageChange};

const MAX_COMMENT_LENGTH: usize = 5000;

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

/// Raw comment-box submission; exactly one action must be present
#[derive(Debug, Default, Deserialize)]
pub struct CommentForm {
    pub content: Option<String>,
    pub parent_comment_id: Option<String>,
    pub delete_comment_id: Option<String>,
    pub delete_reply_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentAction {
    Comment { content: String },
    Reply { parent_id: i64, content: String },
    DeleteComment(i64),
    DeleteReply(i64),
}

impl TryFrom<CommentForm> for CommentAction {
    type Error = AppError;

    fn try_from(form: CommentForm) -> Result<Self> {
        let content = blank_to_none(&form.content).map(str::to_string);
        let parent = blank_to_none(&form.parent_comment_id);
        let delete_comment = blank_to_none(&form.delete_comment_id);
        let delete_reply = blank_to_none(&form.delete_reply_id);

        let action = match (content, parent, delete_comment, delete_reply) {
            (Some(content), None, None, None) => CommentAction::Comment { content },
            (Some(content), Some(parent), None, None) => CommentAction::Reply {
                parent_id: parse_id("parent_comment_id", parent)?,
                content,
            },
            (None, None, Some(id), None) => {
                CommentAction::DeleteComment(parse_id("delete_comment_id", id)?)
            }
            (None, None, None, Some(id)) => {
                CommentAction::DeleteReply(parse_id("delete_reply_id", id)?)
            }
            (None, Some(_), None, None) => {
                return Err(AppError::field("content", "This field is required."))
            }
            _ => {
                return Err(AppError::BadRequest(
                    "Submit exactly one of: comment, reply, delete_comment_id, delete_reply_id"
                        .to_string(),
                ))
            }
        };

        if let CommentAction::Comment { content } | CommentAction::Reply { content, .. } = &action {
            if content.chars().count() > MAX_COMMENT_LENGTH {
                return Err(AppError::field(
                    "content",
                    format!("Ensure this value has at most {MAX_COMMENT_LENGTH} characters."),
                ));
            }
        }

        Ok(action)
    }
}

pub(crate) fn post_json(store: &MediaStore, post: &ParentingPost) -> Value {
    with_image_url(store, post, post.image.as_deref())
}

async fn load_post(pool: &PgPool, post_id: i64) -> Result<ParentingPost> {
    found(parenting_repo::find_post(pool, post_id).await?, "Post")
}

/// `GET /parenting/`
pub async fn list(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    OptionalUser(user): OptionalUser,
    query: web::Query<PostSearchParams>,
) -> Result<HttpResponse> {
    let params = query.into_inner();
    let search = PostSearch::try_from(params.clone())?;
    let posts = parenting_repo::list_posts(pool.get_ref(), &search).await?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "parenting/list",
        "user": user.map(|u| u.username),
        "search": params,
        "posts": posts.iter().map(|p| post_json(&store, p)).collect::<Vec<_>>(),
    })))
}

/// `GET /parenting/{id}/`
pub async fn detail(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    OptionalUser(user): OptionalUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    let comments = comment_repo::list_comments_for_post(pool.get_ref(), post.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "parenting/detail",
        "user": user.map(|u| u.username),
        "post": post_json(&store, &post),
        "comments": build_threads(comments),
    })))
}

/// Comment of `post` to delete, checking it is the expected kind
async fn comment_in_post(
    pool: &PgPool,
    post: &ParentingPost,
    comment_id: i64,
    want_reply: bool,
) -> Result<ParentingComment> {
    let comment = comment_repo::find_comment(pool, comment_id)
        .await?
        .filter(|c| c.post_id == Some(post.id))
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
    if comment.is_reply() != want_reply {
        return Err(AppError::BadRequest(if want_reply {
            "Not a reply; use delete_comment_id".to_string()
        } else {
            "Is a reply; use delete_reply_id".to_string()
        }));
    }
    Ok(comment)
}

async fn delete_comment(
    pool: &PgPool,
    post: &ParentingPost,
    user: &User,
    comment_id: i64,
    want_reply: bool,
) -> Result<()> {
    let target = comment_in_post(pool, post, comment_id, want_reply).await?;
    OwnershipPolicy::AuthorOrStaff.check(user, &target)?;
    comment_repo::delete_comment(pool, target.id).await?;
    tracing::info!(post_id = post.id, comment_id = target.id, by = user.id, "Comment deleted");
    Ok(())
}

/// `POST /parenting/{id}/`: add a comment or reply, or delete one
pub async fn comment(
    pool: web::Data<PgPool>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
    form: FormData<CommentForm>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    let action = CommentAction::try_from(form.into_inner())?;

    match action {
        CommentAction::Comment { content } => {
            let created =
                comment_repo::create_comment(pool.get_ref(), post.id, user.id, &content, None).await?;
            metrics::record_created("parenting", "comment");
            tracing::info!(post_id = post.id, comment_id = created.id, "Comment added");
        }
        CommentAction::Reply { parent_id, content } => {
            let parent = comment_repo::find_comment(pool.get_ref(), parent_id)
                .await?
                .filter(|c| c.post_id == Some(post.id) && !c.is_reply())
                .ok_or_else(|| {
                    AppError::field("parent_comment_id", "Replies must answer a top-level comment of this post.")
                })?;
            let created = comment_repo::create_comment(
                pool.get_ref(),
                post.id,
                user.id,
                &content,
                Some(parent.id),
            )
            .await?;
            metrics::record_created("parenting", "reply");
            tracing::info!(post_id = post.id, parent_id = parent.id, comment_id = created.id, "Reply added");
        }
        CommentAction::DeleteComment(id) => delete_comment(pool.get_ref(), &post, &user, id, false).await?,
        CommentAction::DeleteReply(id) => delete_comment(pool.get_ref(), &post, &user, id, true).await?,
    }

    Ok(see_other(format!("/parenting/{}/", post.id)))
}

/// `GET /parenting/create/`
pub async fn create_page(_user: CurrentUser) -> HttpResponse {
    form_page("parenting/create", &["title", "description", "add_image"])
}

/// `POST /parenting/create/`
pub async fn create(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    mut form: FormData<PostForm>,
) -> Result<HttpResponse> {
    validate_form(&form.data)?;
    let image = match form.take_file("add_image") {
        Some(file) => Some(store.save_image(PARENTING_DIR, file, None).await?),
        None => None,
    };
    let data = form.into_inner();

    let saved = parenting_repo::create_post(
        pool.get_ref(),
        user.id,
        data.title.trim(),
        &data.description,
        image.as_deref(),
    )
    .await;
    let post = discard_on_error(&store, image.as_deref(), saved).await?;

    metrics::record_created("parenting", "post");
    tracing::info!(post_id = post.id, author_id = user.id, "Parenting post created");
    Ok(see_other("/parenting/"))
}

/// `GET /parenting/{id}/update/`
pub async fn update_page(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrStaff.check(&user, &post)?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "parenting/update",
        "post": post_json(&store, &post),
        "form": { "fields": ["title", "description", "remove_image", "replace_image"] },
    })))
}

/// `POST /parenting/{id}/update/`
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
        PARENTING_DIR,
        post.image.as_deref(),
        upload,
        checked(&data.remove_image),
        None,
    )
    .await?;

    let saved = parenting_repo::update_post(
        pool.get_ref(),
        post.id,
        data.title.trim(),
        &data.description,
        change.image.as_deref(),
    )
    .await;
    change.settle(&store, saved).await?;

    tracing::info!(post_id = post.id, by = user.id, "Parenting post updated");
    Ok(see_other(format!("/parenting/{}/", post.id)))
}

/// `GET /parenting/{id}/delete/`: confirmation context
pub async fn delete_page(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrStaff.check(&user, &post)?;

    Ok(HttpResponse::Ok().json(json!({
        "page": "parenting/delete",
        "post": post_json(&store, &post),
    })))
}

/// `POST /parenting/{id}/delete/`
pub async fn delete(
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    CurrentUser(user): CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = load_post(pool.get_ref(), path.into_inner()).await?;
    OwnershipPolicy::AuthorOrStaff.check(&user, &post)?;

    parenting_repo::delete_post(pool.get_ref(), post.id).await?;
    if let Some(image) = &post.image {
        store.remove(image).await;
    }

    tracing::info!(post_id = post.id, by = user.id, "Parenting post deleted");
    Ok(see_other("/parenting/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(content: Option<&str>, parent: Option<&str>, del_c: Option<&str>, del_r: Option<&str>) -> CommentForm {
        CommentForm {
            content: content.map(Into::into),
            parent_comment_id: parent.map(Into::into),
            delete_comment_id: del_c.map(Into::into),
            delete_reply_id: del_r.map(Into::into),
        }
    }

    #[test]
    fn dispatches_each_action() {
        assert_eq!(
            CommentAction::try_from(form(Some("hi"), None, None, None)).unwrap(),
            CommentAction::Comment { content: "hi".into() }
        );
        assert_eq!(
            CommentAction::try_from(form(Some("hi"), Some("4"), None, None)).unwrap(),
            CommentAction::Reply { parent_id: 4, content: "hi".into() }
        );
        assert_eq!(
            CommentAction::try_from(form(None, None, Some("7"), None)).unwrap(),
            CommentAction::DeleteComment(7)
        );
        assert_eq!(
            CommentAction::try_from(form(None, None, None, Some("8"))).unwrap(),
            CommentAction::DeleteReply(8)
        );
    }

    #[test]
    fn blank_fields_count_as_absent() {
        assert_eq!(
            CommentAction::try_from(form(Some("hi"), Some(""), Some(" "), None)).unwrap(),
            CommentAction::Comment { content: "hi".into() }
        );
    }

    #[test]
    fn ambiguous_or_empty_submissions_are_rejected() {
        assert!(matches!(
            CommentAction::try_from(CommentForm::default()),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            CommentAction::try_from(form(Some("hi"), None, Some("1"), None)),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            CommentAction::try_from(form(None, None, Some("1"), Some("2"))),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn reply_without_text_is_a_field_error() {
        match CommentAction::try_from(form(None, Some("3"), None, None)) {
            Err(AppError::Validation(fields)) => assert!(fields.contains_key("content")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn overlong_comments_are_rejected() {
        let long = "a".repeat(MAX_COMMENT_LENGTH + 1);
        assert!(matches!(
            CommentAction::try_from(form(Some(&long), None, None, None)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn post_form_requires_title() {
        let form = PostForm {
            title: String::new(),
            description: "text".into(),
            remove_image: None,
        };
        assert!(form.validate().is_err());
    }
}
