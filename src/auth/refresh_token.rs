/// Refresh Token Management
///
/// Refresh tokens are:
/// - 32 bytes from the OS random source, hex-encoded (64 characters)
/// - Hashed with SHA-256 before storage (only the digest is ever persisted)
/// - Single-use: the stored record is deleted when the token is rotated

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AuthError;

const TOKEN_BYTES: usize = 32;

/// A freshly generated refresh token
///
/// `raw` goes to the client and nowhere else; `digest` goes to the store.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub raw: String,
    pub digest: String,
}

impl std::fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshToken")
            .field("raw", &"<redacted>")
            .field("digest", &self.digest)
            .finish()
    }
}

/// Generate a new cryptographically secure refresh token
///
/// # Errors
/// Returns `AuthError::Entropy` if the OS random source is unavailable.
pub fn generate_refresh_token() -> Result<RefreshToken, AuthError> {
    let mut buf = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| AuthError::Entropy(e.to_string()))?;

    let raw = hex::encode(buf);
    let digest = digest_of(&raw);
    Ok(RefreshToken { raw, digest })
}

/// SHA-256 of the token text, lowercase hex
///
/// This is the lookup key and the only form that is stored.
pub fn digest_of(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two token strings without short-circuiting on the first mismatch
///
/// Lengths are compared up front; a length is not secret.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }

    let diff = a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    std::hint::black_box(diff) == 0
}
