use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use sqlx::PgPool;
use std::rc::Rc;

use crate::db::user_repo;
use crate::error::AppError;
use crate::models::User;

/// Cookie carrying the signed session token for browser clients
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Identity taken from a validated token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub username: String,
}

/// Token from `Authorization: Bearer`, falling back to the session cookie
pub fn request_token(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        req.cookie(ACCESS_TOKEN_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// Validate a raw token as a credential (refresh tokens are refused)
pub fn authenticate_token(token: &str) -> Result<AuthenticatedUser, String> {
    let claims = crypto_core::jwt::validate_credential(token).map_err(|e| {
        tracing::debug!("Token validation failed: {}", e);
        format!("Invalid token: {}", e)
    })?;
    let user_id = claims
        .user_id()
        .map_err(|_| "Invalid token: malformed subject".to_string())?;

    Ok(AuthenticatedUser {
        user_id,
        username: claims.username,
    })
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, String> {
    let token = request_token(req).ok_or_else(|| "Authentication required".to_string())?;
    authenticate_token(&token)
}

/// How an unauthenticated request is turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardMode {
    /// Redirect to the sign-in page with `next`
    Web,
    /// 401 JSON
    Api,
}

impl GuardMode {
    fn for_path(path: &str) -> Self {
        if path.starts_with("/api/") {
            GuardMode::Api
        } else {
            GuardMode::Web
        }
    }

    fn reject(self, next: &str, reason: String) -> AppError {
        match self {
            GuardMode::Web => AppError::login_required(next),
            GuardMode::Api => AppError::Authentication(reason),
        }
    }
}

fn next_target(req: &HttpRequest) -> String {
    req.uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.path().to_string())
}

/// Session guard for a route scope
///
/// Inserts [`AuthenticatedUser`] into request extensions on success.
pub struct AuthGuard {
    mode: GuardMode,
}

impl AuthGuard {
    pub fn web() -> Self {
        Self {
            mode: GuardMode::Web,
        }
    }

    pub fn api() -> Self {
        Self {
            mode: GuardMode::Api,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthGuardService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthGuardService {
            service: Rc::new(service),
            mode: self.mode,
        }))
    }
}

pub struct AuthGuardService<S> {
    service: Rc<S>,
    mode: GuardMode,
}

impl<S, B> Service<ServiceRequest> for AuthGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let mode = self.mode;

        Box::pin(async move {
            match authenticate(req.request()) {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                    let res = service.call(req).await?;
                    Ok(res.map_into_boxed_body())
                }
                Err(reason) => {
                    tracing::debug!(path = %req.path(), reason = %reason, "Unauthenticated request");
                    let err = mode.reject(&next_target(req.request()), reason);
                    Ok(req.into_response(HttpResponse::from_error(err)))
                }
            }
        })
    }
}

async fn load_user(req: &HttpRequest) -> Result<Option<User>, AppError> {
    let cached = req.extensions().get::<AuthenticatedUser>().cloned();
    let identity = match cached {
        Some(identity) => identity,
        None => match authenticate(req) {
            Ok(identity) => identity,
            Err(_) => return Ok(None),
        },
    };

    let pool = req
        .app_data::<web::Data<PgPool>>()
        .ok_or_else(|| AppError::Internal("Database pool not configured".to_string()))?;

    // Staff and moderator flags are read live, never from the token
    Ok(user_repo::find_user_by_id(pool.get_ref(), identity.user_id).await?)
}

/// The signed-in account, loaded from the store
///
/// Rejects like the guard for the request's path when nobody is signed in
/// or the account no longer exists.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequest for CurrentUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            match load_user(&req).await? {
                Some(user) => Ok(CurrentUser(user)),
                None => Err(GuardMode::for_path(req.path())
                    .reject(&next_target(&req), "Authentication required".to_string())
                    .into()),
            }
        })
    }
}

/// The signed-in account when there is one
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<User>);

impl FromRequest for OptionalUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move { Ok(OptionalUser(load_user(&req).await?)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer header-token"))
            .cookie(Cookie::new(ACCESS_TOKEN_COOKIE, "cookie-token"))
            .to_http_request();
        assert_eq!(request_token(&req).as_deref(), Some("header-token"));
    }

    #[test]
    fn cookie_is_used_without_header() {
        let req = TestRequest::default()
            .cookie(Cookie::new(ACCESS_TOKEN_COOKIE, "cookie-token"))
            .to_http_request();
        assert_eq!(request_token(&req).as_deref(), Some("cookie-token"));
    }

    #[test]
    fn non_bearer_scheme_is_ignored() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert!(request_token(&req).is_none());
    }

    #[test]
    fn api_paths_reject_with_401() {
        assert_eq!(GuardMode::for_path("/api/tennis/"), GuardMode::Api);
        assert_eq!(GuardMode::for_path("/tennis/"), GuardMode::Web);
        assert!(matches!(
            GuardMode::Api.reject("/api/", "nope".into()),
            AppError::Authentication(_)
        ));
    }
}
