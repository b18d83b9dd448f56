/// JWT Claims structure
///
/// The payload carried inside an access token. Never persisted: it only
/// exists inside the signed token and in the verifier's return value.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{AuthError, VerificationError};

/// Value of the `type` claim
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Token type. Kept as a raw string so that unknown values still decode
    /// and are rejected by the type policy rather than as malformed.
    #[serde(rename = "type")]
    pub token_type: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl AccessClaims {
    pub fn new(subject: Uuid, token_type: TokenType, issued_at: i64, expires_at: i64) -> Self {
        Self {
            sub: subject.to_string(),
            token_type: token_type.to_string(),
            iat: issued_at,
            exp: expires_at,
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// A validly signed token whose subject is not a UUID is treated as malformed.
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AuthError::Verification(VerificationError::Malformed))
    }

    pub fn is_type(&self, expected: TokenType) -> bool {
        self.token_type == expected.to_string()
    }

    pub fn is_expired(&self) -> bool {
        self.exp < chrono::Utc::now().timestamp()
    }
}
