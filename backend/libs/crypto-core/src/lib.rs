//! Token and hashing primitives shared by Agora services
//!
//! - `jwt`: RS256 access, refresh and browser-session tokens
//! - `hash`: SHA-256 digests and opaque random tokens (password reset links)

pub mod hash;
pub mod jwt;

pub use hash::{random_token, sha256, sha256_hex};
pub use jwt::{Claims, TokenResponse, TokenType};
