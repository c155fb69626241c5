/// Security primitives for community-service
///
/// - **password**: Argon2id hashing and verification
/// - **permissions**: ownership policies applied before edits and deletes
/// - JWT issuing and validation come from `crypto-core` (RS256)
pub use crypto_core::jwt;

pub mod password;
pub mod permissions;

pub use password::{hash_password, verify_password};
pub use permissions::OwnershipPolicy;
