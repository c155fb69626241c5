/// Database access layer
///
/// One repository module per app, each a set of free functions over a
/// `PgPool`. Author usernames are joined in so rows render without a second
/// lookup.
use sqlx::migrate::Migrator;

pub mod comment_repo;
pub mod laika_repo;
pub mod marketplace_repo;
pub mod parenting_repo;
pub mod password_reset_repo;
pub mod room_repo;
pub mod tennis_repo;
pub mod test_post_repo;
pub mod user_repo;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Postgres `unique_violation`, optionally on a specific constraint
pub fn is_unique_violation(err: &sqlx::Error, constraint: Option<&str>) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505")
                && constraint.map_or(true, |name| db_err.constraint() == Some(name))
        }
        _ => false,
    }
}
