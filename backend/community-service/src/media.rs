//! Uploaded image storage under `MEDIA_ROOT`
//!
//! Files are decoded before they are written, so only real png/jpeg/gif/webp
//! images are stored. Stored paths are relative (`<dir>/<uuid>.<ext>`) and
//! are what the database keeps.

use actix_web::{http::header, web, HttpResponse};
use image::{DynamicImage, ImageFormat, ImageOutputFormat};
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{Config, MediaConfig};
use crate::error::{AppError, Result};
use crate::forms::UploadedFile;
use crate::models::laika::DEFAULT_LAIKA_IMAGE;
use crate::models::tennis::DEFAULT_TENNIS_IMAGE;

/// Upload directories per app
pub const PARENTING_DIR: &str = "images";
pub const LAIKA_DIR: &str = "laika_img";
pub const MARKETPLACE_DIR: &str = "market_img";
pub const TENNIS_DIR: &str = "tennis_img";

/// Bounding box for tennis profile pictures
pub const TENNIS_THUMBNAIL: u32 = 300;

/// Shipped placeholder images; never deleted
const DEFAULT_IMAGES: &[&str] = &[DEFAULT_LAIKA_IMAGE, DEFAULT_TENNIS_IMAGE];

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    url_prefix: String,
    max_upload_bytes: usize,
}

fn extension(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("png"),
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::WebP => Some("webp"),
        _ => None,
    }
}

fn content_type_for(path: &Path) -> mime::Mime {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => mime::IMAGE_PNG,
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("webp") => "image/webp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Decode, optionally shrink, and re-encode an upload. Blocking.
fn prepare_image(bytes: Vec<u8>, thumbnail: Option<u32>) -> Result<(Vec<u8>, &'static str)> {
    let format = image::guess_format(&bytes)
        .map_err(|_| AppError::Media("Upload a valid image.".to_string()))?;
    let ext = extension(format).ok_or_else(|| {
        AppError::Media("Unsupported image type; use png, jpeg, gif or webp.".to_string())
    })?;
    let img: DynamicImage = image::load_from_memory_with_format(&bytes, format)
        .map_err(|e| AppError::Media(format!("Upload a valid image: {}", e)))?;

    match thumbnail {
        Some(max) if img.width() > max || img.height() > max => {
            let thumb = img.thumbnail(max, max);
            let (out_format, out_ext) = match format {
                ImageFormat::Jpeg => (ImageOutputFormat::Jpeg(85), "jpg"),
                _ => (ImageOutputFormat::Png, "png"),
            };
            let mut encoded = Cursor::new(Vec::new());
            thumb
                .write_to(&mut encoded, out_format)
                .map_err(|e| AppError::Internal(format!("Thumbnail encoding failed: {}", e)))?;
            debug!(
                width = thumb.width(),
                height = thumb.height(),
                "Thumbnail generated"
            );
            Ok((encoded.into_inner(), out_ext))
        }
        _ => Ok((bytes, ext)),
    }
}

impl MediaStore {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: config.root.clone(),
            url_prefix: config.url_prefix.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Public URL for a stored relative path
    pub fn url(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.url_prefix.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }

    /// Absolute path for a relative media path; `None` if it escapes the root
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let rel = Path::new(relative);
        if relative.is_empty()
            || !rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(rel))
    }

    /// Validate and store an uploaded image under `dir`, returning its relative path.
    ///
    /// With `thumbnail`, images larger than the box are shrunk to fit it.
    pub async fn save_image(
        &self,
        dir: &str,
        file: UploadedFile,
        thumbnail: Option<u32>,
    ) -> Result<String> {
        if file.bytes.len() > self.max_upload_bytes {
            return Err(AppError::PayloadTooLarge(self.max_upload_bytes));
        }

        let (bytes, ext) = tokio::task::spawn_blocking(move || prepare_image(file.bytes, thumbnail))
            .await
            .map_err(|e| AppError::Internal(format!("Image task panicked: {e}")))??;

        let relative = format!("{}/{}.{}", dir, Uuid::new_v4(), ext);
        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(format!("Cannot create media dir: {}", e)))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot write media file: {}", e)))?;

        debug!(path = %relative, size = bytes.len(), "Stored upload");
        Ok(relative)
    }

    /// Best-effort delete of a stored file; placeholders are kept
    pub async fn remove(&self, relative: &str) {
        if DEFAULT_IMAGES.contains(&relative) {
            return;
        }
        let Some(path) = self.resolve(relative) else {
            warn!(path = %relative, "Refusing to remove media outside root");
            return;
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %relative, error = %e, "Failed to remove media file");
        }
    }
}

/// `GET /media/{path}`: development-only file serving
pub async fn serve_media(
    config: web::Data<Config>,
    store: web::Data<MediaStore>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    if !config.app.debug {
        return Err(AppError::NotFound("Media is not served".to_string()));
    }

    let file = store
        .resolve(&path)
        .ok_or_else(|| AppError::NotFound("Media not found".to_string()))?;

    let bytes = tokio::fs::read(&file)
        .await
        .map_err(|_| AppError::NotFound("Media not found".to_string()))?;

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, content_type_for(&file)))
        .body(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 80, 40])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    fn store(root: &Path) -> MediaStore {
        MediaStore::new(&MediaConfig {
            root: root.to_path_buf(),
            ..MediaConfig::default()
        })
    }

    fn upload(bytes: Vec<u8>) -> UploadedFile {
        UploadedFile {
            field: "image".into(),
            filename: "photo.png".into(),
            content_type: Some(mime::IMAGE_PNG),
            bytes,
        }
    }

    #[tokio::test]
    async fn saves_valid_image_under_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let rel = store.save_image(PARENTING_DIR, upload(png(10, 10)), None).await.unwrap();
        assert!(rel.starts_with("images/"));
        assert!(rel.ends_with(".png"));
        assert!(dir.path().join(&rel).exists());
        assert_eq!(store.url(&rel), format!("/media/{}", rel));
    }

    #[tokio::test]
    async fn tennis_images_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let rel = store
            .save_image(TENNIS_DIR, upload(png(900, 450)), Some(TENNIS_THUMBNAIL))
            .await
            .unwrap();
        let saved = image::open(dir.path().join(&rel)).unwrap();
        assert_eq!(saved.width(), 300);
        assert_eq!(saved.height(), 150);
    }

    #[tokio::test]
    async fn rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path())
            .save_image(PARENTING_DIR, upload(b"not an image".to_vec()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Media(_)));
    }

    #[tokio::test]
    async fn remove_keeps_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let placeholder = dir.path().join(DEFAULT_TENNIS_IMAGE);
        std::fs::create_dir_all(placeholder.parent().unwrap()).unwrap();
        std::fs::write(&placeholder, b"x").unwrap();

        let store = store(dir.path());
        store.remove(DEFAULT_TENNIS_IMAGE).await;
        assert!(placeholder.exists());

        let rel = store.save_image(LAIKA_DIR, upload(png(4, 4)), None).await.unwrap();
        store.remove(&rel).await;
        assert!(!dir.path().join(&rel).exists());
    }

    #[test]
    fn resolve_rejects_traversal() {
        let store = store(Path::new("/srv/media"));
        assert!(store.resolve("../etc/passwd").is_none());
        assert!(store.resolve("images/../../x").is_none());
        assert!(store.resolve("/etc/passwd").is_none());
        assert_eq!(
            store.resolve("images/a.png"),
            Some(PathBuf::from("/srv/media/images/a.png"))
        );
    }
}
