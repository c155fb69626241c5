//! Account pages: signup, signin/out, password reset and change, API tokens

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpResponse};
use chrono::Duration;
use crypto_core::jwt::{self, SESSION_TOKEN_EXPIRY_DAYS};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::config::Config;
use crate::db::{is_unique_violation, password_reset_repo, user_repo};
use crate::error::{collect_field_errors, ensure_valid, push_field_error, AppError, FieldErrors, Result};
use crate::forms::{Flag, FormData};
use crate::middleware::{CurrentUser, ACCESS_TOKEN_COOKIE};
use crate::models::User;
use crate::security::{hash_password, verify_password};
use crate::services::EmailService;
use crate::validators::{password_problems, validate_username_shape};

use super::{found, see_other, validate_form};

/// Where signin lands without a usable `next`
pub const LOGIN_REDIRECT: &str = "/home/";

/// Lifetime of a token behind a browser-session cookie
const SESSION_COOKIE_TOKEN_HOURS: i64 = 12;

const BAD_CREDENTIALS: &str = "The username and/or password you specified are not correct.";

fn session_cookie(token: String, remember: bool, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build(ACCESS_TOKEN_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .finish();
    if remember {
        cookie.set_max_age(CookieDuration::days(SESSION_TOKEN_EXPIRY_DAYS));
    }
    cookie
}

/// Signed session cookie for `user`
fn sign_in_cookie(user: &User, remember: bool, secure: bool) -> Result<Cookie<'static>> {
    let lifetime = if remember {
        Duration::days(SESSION_TOKEN_EXPIRY_DAYS)
    } else {
        Duration::hours(SESSION_COOKIE_TOKEN_HOURS)
    };
    let token = jwt::generate_session_token(user.id, &user.email, &user.username, lifetime)?;
    Ok(session_cookie(token, remember, secure))
}

/// Only same-site absolute paths are followed after signin
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => LOGIN_REDIRECT,
    }
}

/// Both entries match and the password passes the strength rules
fn check_new_password(errors: &mut FieldErrors, password1: &str, password2: &str, username: &str) {
    for problem in password_problems(password1, username) {
        push_field_error(errors, "password1", problem);
    }
    if password1 != password2 {
        push_field_error(errors, "password2", "You must type the same password each time.");
    }
}

// ---------------------------------------------------------------------------
// Signup
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct SignupForm {
    #[serde(default)]
    #[validate(custom(function = "validate_username_shape"))]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

pub async fn signup_page() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "page": "accounts/signup",
        "form": { "fields": ["username", "email", "password1", "password2"] },
    }))
}

pub async fn signup(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    form: FormData<SignupForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = collect_field_errors(&form);
    check_new_password(&mut errors, &form.password1, &form.password2, &form.username);
    ensure_valid(errors)?;

    let password_hash = hash_password(&form.password1)?;
    let user = user_repo::create_user(pool.get_ref(), &form.username, form.email.trim(), &password_hash)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, Some(user_repo::USERNAME_CONSTRAINT)) {
                AppError::Conflict("A user with that username already exists.".to_string())
            } else if is_unique_violation(&e, Some(user_repo::EMAIL_CONSTRAINT)) {
                AppError::Conflict("A user is already registered with this email address.".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    tracing::info!(user_id = user.id, username = %user.username, "User signed up");

    let cookie = sign_in_cookie(&user, false, config.auth.cookie_secure)?;
    let mut resp = see_other("/");
    resp.add_cookie(&cookie)
        .map_err(|e| AppError::Internal(format!("Cannot set session cookie: {}", e)))?;
    Ok(resp)
}

// ---------------------------------------------------------------------------
// Signin / signout
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct NextParam {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SigninForm {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    pub remember: Option<Flag>,
}

pub async fn signin_page(query: web::Query<NextParam>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "page": "accounts/signin",
        "form": { "fields": ["login", "password", "remember"] },
        "next": safe_next(query.next.as_deref()),
    }))
}

pub async fn signin(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    query: web::Query<NextParam>,
    form: FormData<SigninForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = FieldErrors::new();
    if form.login.trim().is_empty() {
        push_field_error(&mut errors, "login", "This field is required.");
    }
    if form.password.is_empty() {
        push_field_error(&mut errors, "password", "This field is required.");
    }
    ensure_valid(errors)?;

    let user = user_repo::find_user_by_login(pool.get_ref(), form.login.trim())
        .await?
        .ok_or_else(|| AppError::Authentication(BAD_CREDENTIALS.to_string()))?;

    if !verify_password(&form.password, &user.password_hash)? {
        tracing::info!(login = %form.login, "Failed signin attempt");
        return Err(AppError::Authentication(BAD_CREDENTIALS.to_string()));
    }

    let remember = form.remember.as_ref().map_or(true, Flag::is_set);
    let cookie = sign_in_cookie(&user, remember, config.auth.cookie_secure)?;

    tracing::info!(user_id = user.id, remember, "User signed in");

    let mut resp = see_other(safe_next(query.next.as_deref()));
    resp.add_cookie(&cookie)
        .map_err(|e| AppError::Internal(format!("Cannot set session cookie: {}", e)))?;
    Ok(resp)
}

pub async fn signout() -> Result<HttpResponse> {
    let mut resp = see_other("/");
    resp.add_removal_cookie(&Cookie::build(ACCESS_TOKEN_COOKIE, "").path("/").finish())
        .map_err(|e| AppError::Internal(format!("Cannot clear session cookie: {}", e)))?;
    Ok(resp)
}

// ---------------------------------------------------------------------------
// Password reset
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetForm {
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
}

pub async fn password_reset_page() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "page": "accounts/password_reset",
        "form": { "fields": ["email"] },
    }))
}

/// Always redirects home so account existence is not revealed
pub async fn password_reset(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    email: web::Data<EmailService>,
    form: FormData<PasswordResetForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    validate_form(&form)?;

    if let Some(user) = user_repo::find_user_by_email(pool.get_ref(), form.email.trim()).await? {
        let ttl = Duration::minutes(config.auth.password_reset_ttl_minutes);
        let issued = password_reset_repo::create_reset_token(pool.get_ref(), user.id, ttl).await?;
        email.send_password_reset(&user.email, &user.username, &issued.token);
        tracing::info!(user_id = user.id, expires_at = %issued.expires_at, "Password reset issued");
    }

    Ok(see_other("/"))
}

pub async fn password_reset_done() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "page": "accounts/password_reset_done",
        "message": "We have sent you an email. If you have not received it please check your spam folder.",
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordForm {
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

pub async fn password_reset_key_page(
    pool: web::Data<PgPool>,
    token: web::Path<String>,
) -> Result<HttpResponse> {
    let usable = password_reset_repo::find_token(pool.get_ref(), &token)
        .await?
        .map_or(false, |t| t.is_usable(chrono::Utc::now()));

    Ok(HttpResponse::Ok().json(json!({
        "page": "accounts/password_reset_from_key",
        "token_valid": usable,
        "form": { "fields": ["password1", "password2"] },
    })))
}

pub async fn password_reset_key(
    pool: web::Data<PgPool>,
    token: web::Path<String>,
    form: FormData<SetPasswordForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let invalid = || {
        AppError::BadRequest(
            "The password reset link was invalid, possibly because it has already been used."
                .to_string(),
        )
    };

    let record = password_reset_repo::find_token(pool.get_ref(), &token)
        .await?
        .filter(|t| t.is_usable(chrono::Utc::now()))
        .ok_or_else(invalid)?;
    let user = found(
        user_repo::find_user_by_id(pool.get_ref(), record.user_id).await?,
        "User",
    )?;

    let mut errors = FieldErrors::new();
    check_new_password(&mut errors, &form.password1, &form.password2, &user.username);
    ensure_valid(errors)?;

    let password_hash = hash_password(&form.password1)?;
    password_reset_repo::reset_password(pool.get_ref(), &token, &password_hash)
        .await?
        .ok_or_else(invalid)?;

    tracing::info!(user_id = user.id, "Password reset completed");
    Ok(see_other("/"))
}

// ---------------------------------------------------------------------------
// Password change
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChangePasswordForm {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

pub async fn password_change_page(CurrentUser(user): CurrentUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "page": "accounts/password_change",
        "user": { "id": user.id, "username": user.username },
        "form": { "fields": ["old_password", "password1", "password2"] },
    }))
}

pub async fn password_change(
    pool: web::Data<PgPool>,
    CurrentUser(user): CurrentUser,
    form: FormData<ChangePasswordForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();

    let mut errors = FieldErrors::new();
    if !verify_password(&form.old_password, &user.password_hash)? {
        push_field_error(&mut errors, "old_password", "Please type your current password.");
    }
    check_new_password(&mut errors, &form.password1, &form.password2, &user.username);
    ensure_valid(errors)?;

    let password_hash = hash_password(&form.password1)?;
    user_repo::update_password(pool.get_ref(), user.id, &password_hash).await?;

    tracing::info!(user_id = user.id, "Password changed");
    Ok(see_other("/"))
}

// ---------------------------------------------------------------------------
// API tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `POST /api/token/`: exchange credentials for an access/refresh pair
pub async fn obtain_token(
    pool: web::Data<PgPool>,
    body: web::Json<TokenRequest>,
) -> Result<HttpResponse> {
    let user = user_repo::find_user_by_login(pool.get_ref(), body.username.trim())
        .await?
        .ok_or_else(|| AppError::Authentication(BAD_CREDENTIALS.to_string()))?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::Authentication(BAD_CREDENTIALS.to_string()));
    }

    let tokens = jwt::generate_token_pair(user.id, &user.email, &user.username)?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// `POST /api/token/refresh/`: trade a refresh token for a new pair
pub async fn refresh_token(
    pool: web::Data<PgPool>,
    body: web::Json<RefreshRequest>,
) -> Result<HttpResponse> {
    let claims = jwt::validate_refresh_token(&body.refresh_token)
        .map_err(|e| AppError::Token(e.to_string()))?;
    let user_id = claims
        .user_id()
        .map_err(|e| AppError::Token(e.to_string()))?;

    let user = user_repo::find_user_by_id(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| AppError::Token("Account no longer exists".to_string()))?;

    let tokens = jwt::generate_token_pair(user.id, &user.email, &user.username)?;
    Ok(HttpResponse::Ok().json(tokens))
}
