//! Form bodies for page handlers
//!
//! Browser forms post either `application/x-www-form-urlencoded` or, when a
//! file is attached, `multipart/form-data`; API-style clients post JSON.
//! [`FormData`] accepts all three and deserializes the text fields into the
//! same struct, keeping uploaded files aside.

use actix_multipart::Multipart;
use actix_web::{dev::Payload, web, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use futures_util::stream::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::media::MediaStore;

/// Body limit when no media store is registered
const DEFAULT_BODY_LIMIT: usize = 256 * 1024;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub content_type: Option<mime::Mime>,
    pub bytes: Vec<u8>,
}

/// Parsed form: text fields as `T`, plus any attached files
#[derive(Debug)]
pub struct FormData<T> {
    pub data: T,
    files: Vec<UploadedFile>,
}

impl<T> FormData<T> {
    /// Remove and return the file posted under `field`, if any
    pub fn take_file(&mut self, field: &str) -> Option<UploadedFile> {
        let idx = self.files.iter().position(|f| f.field == field)?;
        Some(self.files.swap_remove(idx))
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

/// Boolean form input: a JSON bool, or checkbox text from an HTML form
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    pub fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Text(v) => !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "" | "false" | "0" | "off" | "no"
            ),
        }
    }
}

/// Checkbox semantics: absent means unchecked
pub fn checked(value: &Option<Flag>) -> bool {
    value.as_ref().map_or(false, Flag::is_set)
}

fn parse_urlencoded<T: DeserializeOwned>(body: &str) -> Result<T> {
    web::Query::<T>::from_query(body)
        .map(web::Query::into_inner)
        .map_err(|e| AppError::BadRequest(format!("Invalid form data: {}", e)))
}

async fn read_body(payload: &mut Payload, limit: usize) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Payload error: {}", e)))?;
        if body.len() + chunk.len() > limit {
            return Err(AppError::PayloadTooLarge(limit));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

async fn read_multipart(
    req: &HttpRequest,
    payload: Payload,
    limit: usize,
) -> Result<(String, Vec<UploadedFile>)> {
    let mut multipart = Multipart::new(req.headers(), payload);
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut files = Vec::new();
    let mut total = 0usize;

    while let Some(item) = multipart.next().await {
        let mut field = item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let name = field.name().unwrap_or_default().to_string();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content_type = field.content_type().cloned();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;
            total += chunk.len();
            if total > limit {
                return Err(AppError::PayloadTooLarge(limit));
            }
            bytes.extend_from_slice(&chunk);
        }

        match filename {
            // Browsers send an empty part for an untouched file input
            Some(filename) if !bytes.is_empty() => files.push(UploadedFile {
                field: name,
                filename,
                content_type,
                bytes,
            }),
            Some(_) => {}
            None => {
                let value = String::from_utf8(bytes)
                    .map_err(|_| AppError::BadRequest(format!("Field {} is not UTF-8", name)))?;
                pairs.push((name, value));
            }
        }
    }

    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    Ok((query, files))
}

async fn parse_form<T: DeserializeOwned>(req: &HttpRequest, mut payload: Payload) -> Result<FormData<T>> {
    let limit = req
        .app_data::<web::Data<MediaStore>>()
        .map(|m| m.max_upload_bytes())
        .unwrap_or(DEFAULT_BODY_LIMIT);

    let content_type = req.content_type().to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let (query, files) = read_multipart(req, payload, limit).await?;
        return Ok(FormData {
            data: parse_urlencoded(&query)?,
            files,
        });
    }

    let body = read_body(&mut payload, limit).await?;

    let data = if content_type.starts_with("application/json") {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?
    } else {
        let text = std::str::from_utf8(&body)
            .map_err(|_| AppError::BadRequest("Form body is not UTF-8".to_string()))?;
        parse_urlencoded(text)?
    };

    Ok(FormData {
        data,
        files: Vec::new(),
    })
}

impl<T: DeserializeOwned + 'static> FromRequest for FormData<T> {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        let payload = payload.take();
        Box::pin(async move { Ok(parse_form(&req, payload).await?) })
    }
}
