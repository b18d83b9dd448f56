/// Storage contracts for the auth core
///
/// The session layer only sees these traits. `PgStore` backs them with
/// PostgreSQL, `InMemoryStore` with process memory for tests and local runs.
///
/// Deletions report whether a row went away. Rotation depends on that:
/// when two callers race to delete the same record, exactly one sees `true`.

mod memory;
mod postgres;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// A user identity plus the bcrypt hash of their password
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Credential {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Server-side half of a refresh token
///
/// `token_hash` is `hex(sha256(raw))`; the raw token is never stored.
/// `revoked` is written `false` and kept for forward compatibility: consumed
/// records are deleted, not flagged.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn create_refresh_record(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        issued_at: DateTime<Utc>,
        revoked: bool,
    ) -> Result<Uuid, AppError>;

    async fn get_refresh_record_by_digest(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshRecord>, AppError>;

    /// `false` when no row matched
    async fn delete_refresh_record_by_id(&self, id: Uuid) -> Result<bool, AppError>;

    /// `false` when no row matched
    async fn delete_refresh_record_by_digest(&self, token_hash: &str) -> Result<bool, AppError>;

    /// Drop every session of one user; returns how many were removed
    async fn delete_refresh_records_for_user(&self, user_id: Uuid) -> Result<u64, AppError>;

    /// Drop records whose expiry is before `now`; returns how many were removed
    async fn delete_expired_refresh_records(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credential_by_email(&self, email: &str) -> Result<Option<Credential>, AppError>;

    async fn get_credential_by_id(&self, id: Uuid) -> Result<Option<Credential>, AppError>;

    /// Fails with `DatabaseError::UniqueConstraintViolation` if the email is taken
    async fn create_credential(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Uuid, AppError>;

    /// `false` when no user has this id
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError>;
}
