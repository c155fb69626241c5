/// Password reset token storage
///
/// Only the SHA-256 of a token is stored; the raw value goes out by email.
use crate::models::user::PasswordResetToken;
use chrono::{DateTime, Duration, Utc};
use crypto_core::{random_token, sha256_hex};
use sqlx::PgPool;

/// Random bytes per token before hex encoding
const TOKEN_BYTES: usize = 32;

#[derive(Debug)]
pub struct CreateTokenResult {
    /// Raw token, to be delivered to the user
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issue a reset token for `user_id`, invalidating any unused earlier ones
pub async fn create_reset_token(
    pool: &PgPool,
    user_id: i64,
    ttl: Duration,
) -> Result<CreateTokenResult, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE password_reset_tokens SET used_at = NOW() WHERE user_id = $1 AND used_at IS NULL",
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    let token = random_token(TOKEN_BYTES);
    let expires_at = Utc::now() + ttl;

    sqlx::query(
        r#"
        INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user_id)
    .bind(sha256_hex(&token))
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(CreateTokenResult { token, expires_at })
}

/// Token row for a raw token, if one was ever issued
pub async fn find_token(
    pool: &PgPool,
    raw_token: &str,
) -> Result<Option<PasswordResetToken>, sqlx::Error> {
    sqlx::query_as::<_, PasswordResetToken>(
        "SELECT id, user_id, token_hash, expires_at, used_at FROM password_reset_tokens WHERE token_hash = $1",
    )
    .bind(sha256_hex(raw_token))
    .fetch_optional(pool)
    .await
}

/// Consume a usable token and set the new password in one transaction.
///
/// Returns the user id, or `None` when the token is unknown, used or expired.
pub async fn reset_password(
    pool: &PgPool,
    raw_token: &str,
    password_hash: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let user_id = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE password_reset_tokens
        SET used_at = NOW()
        WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()
        RETURNING user_id
        "#,
    )
    .bind(sha256_hex(raw_token))
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(user_id) = user_id {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(user_id)
}
