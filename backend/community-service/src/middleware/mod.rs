/// Request middleware and extractors for community-service
///
/// - **auth**: session guard for page and API scopes, plus the
///   `CurrentUser` / `OptionalUser` extractors handlers use
pub mod auth;

pub use auth::{AuthGuard, AuthenticatedUser, CurrentUser, OptionalUser, ACCESS_TOKEN_COOKIE};
