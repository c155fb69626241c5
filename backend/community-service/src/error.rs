use actix_web::{error::ResponseError, http::header, http::StatusCode, HttpResponse};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Field name -> messages, as rendered next to form inputs
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const SIGNIN_PATH: &str = "/accounts/signin/";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error")]
    Validation(FieldErrors),

    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Browser page reached without a session; rendered as a redirect to sign-in
    #[error("Login required")]
    LoginRequired { next: String },

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Upload exceeds {0} bytes")]
    PayloadTooLarge(usize),
}

impl AppError {
    /// Single-field validation failure
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        AppError::Validation(errors)
    }

    pub fn login_required(path: &str) -> Self {
        AppError::LoginRequired {
            next: path.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

/// Sign-in URL carrying the page to return to
pub fn signin_redirect_location(next: &str) -> String {
    format!("{}?next={}", SIGNIN_PATH, urlencoding::encode(next))
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::LoginRequired { .. } => StatusCode::FOUND,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Media(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::LoginRequired { next } = self {
            return HttpResponse::Found()
                .insert_header((header::LOCATION, signin_redirect_location(next)))
                .finish();
        }

        let status_code = self.status_code();
        let error_type = match self {
            AppError::Database(sqlx::Error::RowNotFound) => "NOT_FOUND",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::LoginRequired { .. } => "LOGIN_REQUIRED",
            AppError::Authorization(_) => "AUTHORIZATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Token(_) => "TOKEN_ERROR",
            AppError::Media(_) => "MEDIA_ERROR",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
        };

        // Store failures are logged, never echoed to the client
        let (message, details) = match self {
            AppError::Database(sqlx::Error::RowNotFound) => ("Not found".to_string(), None),
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                ("Database error".to_string(), None)
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                ("Internal server error".to_string(), None)
            }
            AppError::Token(e) => ("Invalid or expired token".to_string(), Some(e.clone())),
            other => (other.to_string(), None),
        };

        let fields = match self {
            AppError::Validation(errors) => Some(errors.clone()),
            _ => None,
        };

        HttpResponse::build(status_code).json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
            fields,
        })
    }
}

/// Field errors produced by `validator` rules, keyed by field name
pub fn field_errors(errors: &validator::ValidationErrors) -> FieldErrors {
    let mut fields = FieldErrors::new();
    for (field, errs) in errors.field_errors() {
        let messages = errs
            .iter()
            .map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string())
            })
            .collect();
        fields.insert(field.to_string(), messages);
    }
    fields
}

/// Run `validator` rules and return their field errors for further checks
pub fn collect_field_errors<T: validator::Validate>(form: &T) -> FieldErrors {
    match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => field_errors(&errors),
    }
}

/// Append one message to `field`
pub fn push_field_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

/// `Ok` when no field has errors
pub fn ensure_valid(errors: FieldErrors) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(field_errors(&errors))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn login_required_redirects_with_next() {
        let resp = AppError::login_required("/parenting/create/").error_response();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/accounts/signin/?next=%2Fparenting%2Fcreate%2F"
        );
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn validation_errors_list_fields() {
        let resp = AppError::field("title", "This field is required.").error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "VALIDATION_ERROR");
        assert_eq!(json["fields"]["title"][0], "This field is required.");
    }
}
