/// Error Handling Module
///
/// Unified error handling for the auth service:
/// 1. Domain-specific error types (validation, database, configuration, auth)
/// 2. A single `AppError` used for control flow with `?`
/// 3. HTTP response mapping with structured logging
///
/// Every authentication failure is rendered to the client with the same
/// status, code and message, so a caller cannot tell which check failed.
/// The precise variant is only visible in the server logs.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    SuspiciousContent(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
        }
    }
}

impl StdError for ValidationError {}

/// Database operation errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    QueryExecution(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => {
                write!(f, "Duplicate entry: {}", msg)
            }
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
    ParseError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Why an access token was rejected
///
/// Kept distinguishable so that "expired" and "forged" can be told apart in
/// logs, even though both end up as the same 401 for the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationError {
    Expired,
    Malformed,
    BadSignature,
    WrongType,
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationError::Expired => write!(f, "token has expired"),
            VerificationError::Malformed => write!(f, "token is malformed"),
            VerificationError::BadSignature => write!(f, "token signature is invalid"),
            VerificationError::WrongType => write!(f, "token type is not accepted here"),
        }
    }
}

impl StdError for VerificationError {}

/// Authentication and session errors
#[derive(Debug)]
pub enum AuthError {
    /// Unknown email or wrong password. The two are never told apart.
    InvalidCredentials,
    /// Refresh token never existed, was already rotated, or was logged out.
    UnknownToken,
    /// Refresh token is past its expiry.
    RefreshExpired,
    /// Access token was rejected by the codec.
    Verification(VerificationError),
    /// The signer refused the claim set.
    Signing(String),
    /// The OS random source failed.
    Entropy(String),
    /// bcrypt failed internally.
    Hashing(String),
    MissingToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::UnknownToken => write!(f, "Unknown refresh token"),
            AuthError::RefreshExpired => write!(f, "Refresh token has expired"),
            AuthError::Verification(e) => write!(f, "Access token rejected: {}", e),
            AuthError::Signing(msg) => write!(f, "Token signing failed: {}", msg),
            AuthError::Entropy(msg) => write!(f, "Random source failure: {}", msg),
            AuthError::Hashing(msg) => write!(f, "Password hashing failed: {}", msg),
            AuthError::MissingToken => write!(f, "Missing authentication token"),
        }
    }
}

impl StdError for AuthError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AuthError::Verification(e) => Some(e),
            _ => None,
        }
    }
}

impl From<VerificationError> for AuthError {
    fn from(err: VerificationError) -> Self {
        AuthError::Verification(err)
    }
}

impl AuthError {
    /// Failures caused by what the client presented, as opposed to server faults
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::UnknownToken
                | AuthError::RefreshExpired
                | AuthError::Verification(_)
                | AuthError::MissingToken
        )
    }
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Database(DatabaseError),
    Auth(AuthError),
    Config(ConfigError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl AppError {
    /// The auth error inside, if any
    pub fn as_auth(&self) -> Option<&AuthError> {
        match self {
            AppError::Auth(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<VerificationError> for AppError {
    fn from(err: VerificationError) -> Self {
        AppError::Auth(AuthError::Verification(err))
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // 23505 = unique_violation
            if db_err.code().as_deref() == Some("23505") {
                return AppError::Database(DatabaseError::UniqueConstraintViolation(
                    unique_violation_message(db_err.constraint()),
                ));
            }
        }

        match &err {
            sqlx::Error::RowNotFound => {
                AppError::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            sqlx::Error::Database(_) => {
                AppError::Database(DatabaseError::QueryExecution(err.to_string()))
            }
            other => AppError::Database(DatabaseError::UnexpectedError(other.to_string())),
        }
    }
}

/// Message for a unique violation, named after the constraint that fired
fn unique_violation_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("users_email_key") => "Email already registered".to_string(),
        Some("refresh_tokens_token_hash_key") => "Refresh token already issued".to_string(),
        Some(other) => format!("Duplicate value violates {}", other),
        None => "Duplicate value".to_string(),
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Blocking task failed: {}", err))
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID, echoed in the server log line
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

const UNAUTHORIZED_CODE: &str = "UNAUTHORIZED";
const UNAUTHORIZED_MESSAGE: &str = "Invalid or expired credentials";

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = match self {
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR".to_string(),
                e.to_string(),
            ),

            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => (
                    StatusCode::CONFLICT,
                    "DUPLICATE_ENTRY".to_string(),
                    e.to_string(),
                ),
                DatabaseError::NotFound(_) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND".to_string(),
                    e.to_string(),
                ),
                DatabaseError::ConnectionPool(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE".to_string(),
                    "Database service temporarily unavailable".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR".to_string(),
                    "Database error occurred".to_string(),
                ),
            },

            AppError::Auth(e) if e.is_rejection() => (
                StatusCode::UNAUTHORIZED,
                UNAUTHORIZED_CODE.to_string(),
                UNAUTHORIZED_MESSAGE.to_string(),
            ),

            AppError::Auth(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_SERVICE_ERROR".to_string(),
                "Authentication service error".to_string(),
            ),

            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR".to_string(),
                "Server configuration error".to_string(),
            ),

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
                "Internal server error".to_string(),
            ),
        };

        let error_response =
            ErrorResponse::new(request_id.to_string(), message, code, status.as_u16());

        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                tracing::warn!(request_id = request_id, error = %self, "Duplicate entry attempt");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Auth(e) if e.is_rejection() => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication rejected");
            }
            AppError::Auth(e) => {
                tracing::error!(request_id = request_id, error = %e, "Authentication failure");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,
                DatabaseError::NotFound(_) => StatusCode::NOT_FOUND,
                DatabaseError::ConnectionPool(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Auth(e) if e.is_rejection() => StatusCode::UNAUTHORIZED,
            AppError::Auth(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("email".to_string());
        assert_eq!(err.to_string(), "email is empty");
    }

    #[test]
    fn test_verification_error_converts_to_auth() {
        let app_err: AppError = VerificationError::Expired.into();
        match app_err {
            AppError::Auth(AuthError::Verification(VerificationError::Expired)) => (),
            _ => panic!("Expected Auth(Verification(Expired))"),
        }
    }

    #[test]
    fn test_auth_rejections_share_one_response() {
        let rejections = vec![
            AppError::Auth(AuthError::InvalidCredentials),
            AppError::Auth(AuthError::UnknownToken),
            AppError::Auth(AuthError::RefreshExpired),
            AppError::Auth(AuthError::Verification(VerificationError::BadSignature)),
            AppError::Auth(AuthError::Verification(VerificationError::Expired)),
            AppError::Auth(AuthError::MissingToken),
        ];

        for err in rejections {
            let (status, body) = <AppError as ErrorHandler>::error_response(&err, "req-1");
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body.code, UNAUTHORIZED_CODE);
            assert_eq!(body.message, UNAUTHORIZED_MESSAGE);
        }
    }

    #[test]
    fn test_unique_violation_message_follows_constraint() {
        assert_eq!(
            unique_violation_message(Some("users_email_key")),
            "Email already registered"
        );
        assert_eq!(
            unique_violation_message(Some("refresh_tokens_token_hash_key")),
            "Refresh token already issued"
        );
        assert_eq!(
            unique_violation_message(Some("orders_pkey")),
            "Duplicate value violates orders_pkey"
        );
        assert_eq!(unique_violation_message(None), "Duplicate value");
    }

    #[test]
    fn test_server_side_auth_failures_are_500() {
        let err = AppError::Auth(AuthError::Entropy("rng offline".to_string()));
        assert_eq!(
            ResponseError::status_code(&err),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let (_, body) = <AppError as ErrorHandler>::error_response(&err, "req-2");
        assert!(!body.message.contains("rng offline"));
    }
}
