//! Authentication and authorization.

pub mod extract;
pub mod password;
pub mod permissions;
pub mod tokens;

pub use extract::AuthUser;
pub use tokens::{TokenPair, TokenService, TokenType};
