pub mod laika;
pub mod marketplace;
pub mod parenting;
pub mod room;
pub mod tennis;
pub mod test_post;
pub mod user;

pub use user::User;

/// Anything with an (optional) owning account, for ownership checks
pub trait Authored {
    fn author_id(&self) -> Option<i64>;
}
