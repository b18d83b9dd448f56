/// Password Hashing and Verification
///
/// Handles password hashing with bcrypt and password strength validation.

use bcrypt::{hash, verify, DEFAULT_COST};
use lazy_static::lazy_static;

use crate::error::{AuthError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
/// bcrypt ignores everything past 72 bytes
const MAX_PASSWORD_LENGTH: usize = 72;

lazy_static! {
    // Verified against when no account matches, so an unknown email costs
    // one bcrypt round like a wrong password does.
    static ref UNKNOWN_ACCOUNT_HASH: String = hash("unknown-account-placeholder", DEFAULT_COST)
        .expect("bcrypt accepts its default cost");
}

/// Hash used in place of a stored one when the account does not exist
pub fn unknown_account_hash() -> &'static str {
    UNKNOWN_ACCOUNT_HASH.as_str()
}

/// Hash a password using bcrypt at the library default cost
///
/// The salt is generated by bcrypt and embedded in the returned string.
///
/// # Errors
/// Returns `AuthError::Hashing` only if bcrypt itself fails
/// (e.g. the random source for the salt is unavailable).
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    hash(password, DEFAULT_COST).map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verify a password against its hash
///
/// Returns `false` for a wrong password and for a hash that cannot be parsed.
/// A wrong password is never an error.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash could not be checked");
            false
        }
    }
}

/// Validate password strength requirements
///
/// Applied when a password is set (registration, password change), never at
/// login.
///
/// Requirements:
/// - 8 to 72 bytes
/// - At least one digit
/// - At least one lowercase letter
/// - At least one uppercase letter
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        ));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        ));
    }

    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(ValidationError::InvalidFormat(
            "password must contain at least one digit, one lowercase letter, and one uppercase letter"
                .to_string(),
        ));
    }

    Ok(())
}
