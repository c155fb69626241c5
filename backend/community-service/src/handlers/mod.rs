/// HTTP handlers for community-service
///
/// Page handlers answer with a JSON page context for GET and a
/// `303 See Other` redirect after a successful POST. Invalid forms answer
/// `400` with per-field errors.
pub mod accounts;
pub mod api;
pub mod health;
pub mod home;
pub mod laika;
pub mod marketplace;
pub mod parenting;
pub mod rooms;
pub mod tennis;
pub mod test_posts;

use actix_web::{http::header, HttpResponse};
use serde::Serialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::error::{AppError, Result};
use crate::forms::UploadedFile;
use crate::media::MediaStore;

/// Redirect after a successful form post
pub fn see_other(location: impl AsRef<str>) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location.as_ref()))
        .finish()
}

/// Run `validator` rules, turning failures into field errors
pub fn validate_form<T: Validate>(form: &T) -> Result<()> {
    form.validate().map_err(AppError::from)
}

/// `None` from a lookup becomes a 404 naming `what`
pub fn found<T>(record: Option<T>, what: &str) -> Result<T> {
    record.ok_or_else(|| AppError::NotFound(format!("{} not found", what)))
}

/// Serialize `record` and add an `image_url` resolved against the media prefix
pub fn with_image_url<T: Serialize>(store: &MediaStore, record: &T, image: Option<&str>) -> Value {
    let mut value = serde_json::to_value(record).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert(
            "image_url".to_string(),
            image.map(|path| store.url(path)).into(),
        );
    }
    value
}

/// Optional text input: blank means absent
pub fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Context for an empty (create) form page
pub fn form_page(page: &str, fields: &[&str]) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "page": page,
        "form": { "fields": fields },
    }))
}

/// Numeric id posted as form text
pub fn parse_id(field: &str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::field(field, "Enter a whole number."))
}

/// Outcome of an edit form's image inputs
#[derive(Debug, Default)]
pub struct ImageChange {
    /// Value to store in the record
    pub image: Option<String>,
    /// Previous file to unlink once the record is saved
    pub stale: Option<String>,
    /// Upload stored by this request, unlinked if the record is not saved
    pub fresh: Option<String>,
}

impl ImageChange {
    /// A new upload replaces `current`; otherwise `remove` clears it
    pub async fn resolve(
        store: &MediaStore,
        dir: &str,
        current: Option<&str>,
        upload: Option<UploadedFile>,
        remove: bool,
        thumbnail: Option<u32>,
    ) -> Result<Self> {
        let current = current.map(str::to_string);
        match upload {
            Some(file) => {
                let saved = store.save_image(dir, file, thumbnail).await?;
                Ok(Self {
                    image: Some(saved.clone()),
                    stale: current,
                    fresh: Some(saved),
                })
            }
            None if remove => Ok(Self {
                image: None,
                stale: current,
                fresh: None,
            }),
            None => Ok(Self {
                image: current,
                stale: None,
                fresh: None,
            }),
        }
    }

    /// Finish the change once the record write has run
    ///
    /// On success the replaced file goes; on failure the new upload goes
    /// and the record keeps pointing at the old one.
    pub async fn settle<T, E>(
        &self,
        store: &MediaStore,
        saved: std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let unlink = if saved.is_ok() { &self.stale } else { &self.fresh };
        if let Some(path) = unlink {
            store.remove(path).await;
        }
        saved
    }
}

/// Unlink `fresh` when the write that would reference it failed
pub async fn discard_on_error<T, E>(
    store: &MediaStore,
    fresh: Option<&str>,
    saved: std::result::Result<T, E>,
) -> std::result::Result<T, E> {
    if let (Err(_), Some(path)) = (&saved, fresh) {
        store.remove(path).await;
    }
    saved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn see_other_sets_location() {
        let resp = see_other("/parenting/");
        assert_eq!(resp.status(), actix_web::http::StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/parenting/");
    }

    #[test]
    fn image_url_is_added_to_objects() {
        #[derive(Serialize)]
        struct Post {
            id: i64,
        }
        let store = MediaStore::new(&crate::config::MediaConfig::default());
        let value = with_image_url(&store, &Post { id: 3 }, Some("images/a.png"));
        assert_eq!(value["id"], 3);
        assert_eq!(value["image_url"], "/media/images/a.png");

        let value = with_image_url(&store, &Post { id: 3 }, None);
        assert!(value["image_url"].is_null());
    }

    #[test]
    fn ids_must_be_numeric() {
        assert_eq!(parse_id("delete_comment_id", " 12 ").unwrap(), 12);
        match parse_id("delete_comment_id", "abc") {
            Err(AppError::Validation(fields)) => assert!(fields.contains_key("delete_comment_id")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn keeping_the_image_leaves_nothing_stale() {
        let store = MediaStore::new(&crate::config::MediaConfig::default());
        let change = ImageChange::resolve(&store, "images", Some("images/a.png"), None, false, None)
            .await
            .unwrap();
        assert_eq!(change.image.as_deref(), Some("images/a.png"));
        assert!(change.stale.is_none());

        let change = ImageChange::resolve(&store, "images", Some("images/a.png"), None, true, None)
            .await
            .unwrap();
        assert!(change.image.is_none());
        assert_eq!(change.stale.as_deref(), Some("images/a.png"));
    }

    #[test]
    fn blank_inputs_are_none() {
        assert_eq!(blank_to_none(&Some("  ".into())), None);
        assert_eq!(blank_to_none(&Some(" Club ".into())), Some("Club"));
        assert_eq!(blank_to_none(&None), None);
    }

    fn media_store(root: &std::path::Path) -> MediaStore {
        MediaStore::new(&crate::config::MediaConfig {
            root: root.to_path_buf(),
            ..crate::config::MediaConfig::default()
        })
    }

    #[tokio::test]
    async fn failed_save_unlinks_the_new_upload_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images/old.png"), b"old").unwrap();
        std::fs::write(dir.path().join("images/new.png"), b"new").unwrap();
        let store = media_store(dir.path());

        let change = ImageChange {
            image: Some("images/new.png".into()),
            stale: Some("images/old.png".into()),
            fresh: Some("images/new.png".into()),
        };
        let saved: std::result::Result<(), &str> = change.settle(&store, Err("db down")).await;

        assert!(saved.is_err());
        assert!(!dir.path().join("images/new.png").exists());
        assert!(dir.path().join("images/old.png").exists());
    }

    #[tokio::test]
    async fn successful_save_unlinks_the_replaced_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images/old.png"), b"old").unwrap();
        std::fs::write(dir.path().join("images/new.png"), b"new").unwrap();
        let store = media_store(dir.path());

        let change = ImageChange {
            image: Some("images/new.png".into()),
            stale: Some("images/old.png".into()),
            fresh: Some("images/new.png".into()),
        };
        let saved: std::result::Result<i64, &str> = change.settle(&store, Ok(4)).await;

        assert_eq!(saved, Ok(4));
        assert!(dir.path().join("images/new.png").exists());
        assert!(!dir.path().join("images/old.png").exists());
    }

    #[tokio::test]
    async fn failed_create_unlinks_its_upload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images/new.png"), b"new").unwrap();
        let store = media_store(dir.path());

        let kept: std::result::Result<i64, &str> =
            discard_on_error(&store, Some("images/new.png"), Ok(1)).await;
        assert_eq!(kept, Ok(1));
        assert!(dir.path().join("images/new.png").exists());

        let failed: std::result::Result<i64, &str> =
            discard_on_error(&store, Some("images/new.png"), Err("constraint")).await;
        assert!(failed.is_err());
        assert!(!dir.path().join("images/new.png").exists());
    }
}
