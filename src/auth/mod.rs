/// Authentication module
///
/// Password hashing, access-token signing/verification and refresh-token
/// generation. Nothing in here touches storage; `crate::session` composes
/// these pieces with the stores.

mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use claims::{AccessClaims, TokenType};
pub use jwt::{AccessTokenCodec, TypeCheck};
pub use password::{
    hash_password, unknown_account_hash, validate_password_strength, verify_password,
};
pub use refresh_token::{constant_time_eq, digest_of, generate_refresh_token, RefreshToken};
