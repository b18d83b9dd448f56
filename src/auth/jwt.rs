/// JWT Token Generation and Validation
///
/// Stateless HMAC signing and verification of short-lived access tokens.
/// The signing secret is handed in at construction; the codec holds no other
/// state and is cheap to clone into request handlers.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, TokenType};
use crate::configuration::SigningSecret;
use crate::error::{AuthError, VerificationError};

/// Algorithm used when issuing tokens
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Header algorithms accepted on verification. Anything outside the HMAC
/// family is refused before the signature is looked at.
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// What to do with the `type` claim on verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCheck {
    /// Reject tokens whose `type` claim differs
    Require(TokenType),
    /// Accept any `type` as long as the signature and expiry hold
    Skip,
}

impl TypeCheck {
    pub fn from_enforcement(enforce: bool) -> Self {
        if enforce {
            TypeCheck::Require(TokenType::Access)
        } else {
            TypeCheck::Skip
        }
    }
}

#[derive(Clone)]
pub struct AccessTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    type_check: TypeCheck,
}

impl AccessTokenCodec {
    pub fn new(secret: &SigningSecret, type_check: TypeCheck) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            type_check,
        }
    }

    pub fn type_check(&self) -> TypeCheck {
        self.type_check
    }

    /// Sign a new token for `subject`
    ///
    /// # Errors
    /// Returns `AuthError::Signing` if the signer rejects the claim set.
    pub fn issue(
        &self,
        subject: Uuid,
        token_type: TokenType,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = AccessClaims::new(
            subject,
            token_type,
            Utc::now().timestamp(),
            expires_at.timestamp(),
        );

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Validate a token and extract its claims
    ///
    /// # Errors
    /// - `Expired` when `exp` is in the past
    /// - `BadSignature` when the signature does not match or the header
    ///   declares a non-HMAC algorithm
    /// - `Malformed` for anything that does not parse
    /// - `WrongType` when the type policy rejects the `type` claim
    pub fn verify(&self, token: &str) -> Result<AccessClaims, VerificationError> {
        let claims = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => VerificationError::Expired,
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        VerificationError::BadSignature
                    }
                    _ => VerificationError::Malformed,
                };
                tracing::debug!(error = %e, reason = %reason, "JWT validation error");
                reason
            })?;

        if let TypeCheck::Require(expected) = self.type_check {
            if !claims.is_type(expected) {
                tracing::warn!(
                    expected = %expected,
                    actual = %claims.token_type,
                    "Token with unexpected type presented"
                );
                return Err(VerificationError::WrongType);
            }
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const RS256_HEADER: &str = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9";
    const NONE_HEADER: &str = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0";

    fn get_test_codec(type_check: TypeCheck) -> AccessTokenCodec {
        let secret = SigningSecret::new(b"test-secret-key-at-least-32-characters-long");
        AccessTokenCodec::new(&secret, type_check)
    }

    fn in_two_hours() -> DateTime<Utc> {
        Utc::now() + Duration::hours(2)
    }

    fn swap_header(token: &str, header: &str) -> String {
        let (_, rest) = token.split_once('.').expect("token has three segments");
        format!("{}.{}", header, rest)
    }

    #[test]
    fn test_generate_and_validate_token() {
        let codec = get_test_codec(TypeCheck::Require(TokenType::Access));
        let user_id = Uuid::new_v4();
        let expires_at = in_two_hours();

        let token = codec
            .issue(user_id, TokenType::Access, expires_at)
            .expect("Failed to generate token");
        let claims = codec.verify(&token).expect("Failed to validate token");

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.token_type, "access");
        assert_eq!(claims.exp, expires_at.timestamp());
        assert!(claims.iat <= Utc::now().timestamp());
    }

    #[test]
    fn test_expired_token() {
        let codec = get_test_codec(TypeCheck::Require(TokenType::Access));
        let token = codec
            .issue(Uuid::new_v4(), TokenType::Access, Utc::now() - Duration::seconds(10))
            .expect("Failed to generate token");

        assert_eq!(codec.verify(&token), Err(VerificationError::Expired));
    }

    #[test]
    fn test_invalid_token() {
        let codec = get_test_codec(TypeCheck::Skip);

        assert_eq!(
            codec.verify("invalid.token.here"),
            Err(VerificationError::Malformed)
        );
        assert_eq!(codec.verify(""), Err(VerificationError::Malformed));
    }

    #[test]
    fn test_tampered_token() {
        let codec = get_test_codec(TypeCheck::Skip);
        let token = codec
            .issue(Uuid::new_v4(), TokenType::Access, in_two_hours())
            .expect("Failed to generate token");

        let tampered = format!("{}X", token);
        assert!(codec.verify(&tampered).is_err());
    }

    #[test]
    fn test_token_signed_with_other_secret() {
        let codec = get_test_codec(TypeCheck::Skip);
        let other = AccessTokenCodec::new(
            &SigningSecret::new(b"a-completely-different-signing-secret"),
            TypeCheck::Skip,
        );
        let token = other
            .issue(Uuid::new_v4(), TokenType::Access, in_two_hours())
            .expect("Failed to generate token");

        assert_eq!(codec.verify(&token), Err(VerificationError::BadSignature));
    }

    #[test]
    fn test_non_hmac_algorithm_is_rejected() {
        let codec = get_test_codec(TypeCheck::Skip);
        let token = codec
            .issue(Uuid::new_v4(), TokenType::Access, in_two_hours())
            .expect("Failed to generate token");

        let confused = swap_header(&token, RS256_HEADER);
        assert_eq!(codec.verify(&confused), Err(VerificationError::BadSignature));
    }

    #[test]
    fn test_unsigned_token_is_rejected() {
        let codec = get_test_codec(TypeCheck::Skip);
        let token = codec
            .issue(Uuid::new_v4(), TokenType::Access, in_two_hours())
            .expect("Failed to generate token");

        let unsigned = swap_header(&token, NONE_HEADER);
        assert!(codec.verify(&unsigned).is_err());
    }

    #[test]
    fn test_wrong_type_rejected_when_enforced() {
        let codec = get_test_codec(TypeCheck::Require(TokenType::Access));
        let token = codec
            .issue(Uuid::new_v4(), TokenType::Refresh, in_two_hours())
            .expect("Failed to generate token");

        assert_eq!(codec.verify(&token), Err(VerificationError::WrongType));
    }

    #[test]
    fn test_wrong_type_accepted_when_skipped() {
        let codec = get_test_codec(TypeCheck::Skip);
        let user_id = Uuid::new_v4();
        let token = codec
            .issue(user_id, TokenType::Refresh, in_two_hours())
            .expect("Failed to generate token");

        let claims = codec.verify(&token).expect("Type should not be checked");
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.token_type, "refresh");
    }

    #[test]
    fn test_type_check_from_enforcement() {
        assert_eq!(
            TypeCheck::from_enforcement(true),
            TypeCheck::Require(TokenType::Access)
        );
        assert_eq!(TypeCheck::from_enforcement(false), TypeCheck::Skip);
    }
}
