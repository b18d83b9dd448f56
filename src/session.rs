/// Session protocol
///
/// Drives the login / refresh / logout state machine on top of the stores:
///
/// ```text
/// Anonymous --login--> Authenticated --refresh--> Authenticated (new pair)
///                            |                          |
///                            +---------logout-----------+--> LoggedOut
/// ```
///
/// Policies:
/// - Login never reveals whether the email exists.
/// - A refresh token is single use. The delete of its record is the
///   serialization point: a concurrent second use finds nothing to delete
///   and gets `UnknownToken`.
/// - An expired refresh record is reported as `RefreshExpired` and left in
///   place; `purge_expired` is the reaper.
/// - Logout of a token that matches no record is `UnknownToken`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::auth::{
    digest_of, generate_refresh_token, hash_password, unknown_account_hash,
    validate_password_strength, verify_password, AccessClaims, AccessTokenCodec, TokenType,
    TypeCheck,
};
use crate::configuration::{JwtSettings, SigningSecret};
use crate::error::{AppError, AuthError, ConfigError};
use crate::store::{Credential, CredentialStore, TokenStore};
use crate::validators::{is_valid_email, is_valid_name};

/// Token lifetimes
#[derive(Debug, Clone, Copy)]
pub struct SessionLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for SessionLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::hours(2),
            refresh: Duration::days(7),
        }
    }
}

impl TryFrom<&JwtSettings> for SessionLifetimes {
    type Error = ConfigError;

    fn try_from(settings: &JwtSettings) -> Result<Self, Self::Error> {
        settings.validate()?;
        let seconds = |value: i64| {
            Duration::try_seconds(value).ok_or_else(|| {
                ConfigError::InvalidValue(format!("{} seconds is out of range", value))
            })
        };
        Ok(Self {
            access: seconds(settings.access_token_expiry)?,
            refresh: seconds(settings.refresh_token_expiry)?,
        })
    }
}

/// What a successful login or refresh hands back to the client
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("access_expires_at", &self.access_expires_at)
            .finish()
    }
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<Credential> for UserProfile {
    fn from(credential: Credential) -> Self {
        Self {
            id: credential.id,
            name: credential.name,
            email: credential.email,
        }
    }
}

#[derive(Clone)]
pub struct SessionService {
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<dyn TokenStore>,
    codec: AccessTokenCodec,
    lifetimes: SessionLifetimes,
}

impl SessionService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenStore>,
        codec: AccessTokenCodec,
        lifetimes: SessionLifetimes,
    ) -> Self {
        // Build the placeholder hash now rather than on the first failed login
        unknown_account_hash();

        Self {
            credentials,
            tokens,
            codec,
            lifetimes,
        }
    }

    /// Build from configuration; fails if no signing secret is configured
    /// or a token lifetime is out of range
    pub fn from_settings(
        credentials: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenStore>,
        settings: &JwtSettings,
    ) -> Result<Self, AppError> {
        let lifetimes = SessionLifetimes::try_from(settings)?;
        let secret: SigningSecret = settings.signing_secret()?;
        let codec = AccessTokenCodec::new(
            &secret,
            TypeCheck::from_enforcement(settings.enforce_token_type),
        );
        Ok(Self::new(credentials, tokens, codec, lifetimes))
    }

    pub fn codec(&self) -> &AccessTokenCodec {
        &self.codec
    }

    pub fn lifetimes(&self) -> SessionLifetimes {
        self.lifetimes
    }

    /// Exchange email + password for a token pair
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email and for a wrong password alike.
    /// Both paths run one bcrypt verify.
    #[tracing::instrument(name = "session.login", skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let found = self.credentials.get_credential_by_email(email.trim()).await?;
        let stored_hash = match &found {
            Some(credential) => credential.password_hash.as_str(),
            None => unknown_account_hash(),
        };
        let matches = self.password_matches(password, stored_hash).await?;

        let credential = match found {
            Some(credential) if matches => credential,
            _ => return Err(reject_login()),
        };

        let pair = self.issue_pair(credential.id).await?;
        tracing::info!(user_id = %credential.id, "User logged in successfully");
        Ok(pair)
    }

    /// Rotate a refresh token: consume it and hand out a new pair
    ///
    /// # Errors
    /// - `UnknownToken` if no record matches, including when another caller
    ///   consumed it first
    /// - `RefreshExpired` if the record is past its expiry (the record stays)
    #[tracing::instrument(name = "session.refresh", skip(self, raw_token))]
    pub async fn refresh(&self, raw_token: &str) -> Result<TokenPair, AppError> {
        let digest = digest_of(raw_token);

        let record = self
            .tokens
            .get_refresh_record_by_digest(&digest)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Refresh token not found");
                AuthError::UnknownToken
            })?;

        if record.is_expired_at(Utc::now()) {
            tracing::info!(user_id = %record.user_id, "Refresh token expired");
            return Err(AuthError::RefreshExpired.into());
        }

        if !self.tokens.delete_refresh_record_by_id(record.id).await? {
            tracing::warn!(user_id = %record.user_id, "Refresh token already consumed");
            return Err(AuthError::UnknownToken.into());
        }

        let pair = self.issue_pair(record.user_id).await?;
        tracing::info!(user_id = %record.user_id, "Token refreshed successfully");
        Ok(pair)
    }

    /// End the session belonging to a refresh token
    ///
    /// # Errors
    /// `UnknownToken` when nothing was deleted.
    #[tracing::instrument(name = "session.logout", skip(self, raw_token))]
    pub async fn logout(&self, raw_token: &str) -> Result<(), AppError> {
        let digest = digest_of(raw_token);

        if !self.tokens.delete_refresh_record_by_digest(&digest).await? {
            tracing::warn!("Logout with unknown refresh token");
            return Err(AuthError::UnknownToken.into());
        }

        tracing::info!("User logged out");
        Ok(())
    }

    /// End every session of a user
    pub async fn logout_all(&self, user_id: Uuid) -> Result<u64, AppError> {
        let removed = self.tokens.delete_refresh_records_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, removed, "All refresh tokens revoked for user");
        Ok(removed)
    }

    /// Check an access token presented to a protected endpoint
    pub fn authenticate(&self, access_token: &str) -> Result<AccessClaims, AppError> {
        Ok(self.codec.verify(access_token)?)
    }

    /// Delete refresh records past their expiry
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let removed = self
            .tokens
            .delete_expired_refresh_records(Utc::now())
            .await?;
        if removed > 0 {
            tracing::info!(removed, "Expired refresh tokens purged");
        }
        Ok(removed)
    }

    /// Create a credential and return the new user id
    #[tracing::instrument(name = "session.register", skip(self, name, password))]
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<Uuid, AppError> {
        let email = is_valid_email(email)?;
        let name = is_valid_name(name)?;
        validate_password_strength(password)?;

        let password_hash = hash_blocking(password).await?;
        let user_id = self
            .credentials
            .create_credential(&name, &email, &password_hash)
            .await?;

        tracing::info!(user_id = %user_id, "User registered successfully");
        Ok(user_id)
    }

    /// Replace a user's password and end all their sessions
    ///
    /// # Errors
    /// `InvalidCredentials` if `current_password` is wrong or the user is gone.
    #[tracing::instrument(name = "session.change_password", skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let credential = self
            .credentials
            .get_credential_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self
            .password_matches(current_password, &credential.password_hash)
            .await?
        {
            return Err(AuthError::InvalidCredentials.into());
        }

        validate_password_strength(new_password)?;
        let password_hash = hash_blocking(new_password).await?;

        if !self
            .credentials
            .update_password_hash(user_id, &password_hash)
            .await?
        {
            return Err(AuthError::InvalidCredentials.into());
        }

        self.logout_all(user_id).await?;
        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserProfile, AppError> {
        self.credentials
            .get_credential_by_id(user_id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| AuthError::InvalidCredentials.into())
    }

    async fn password_matches(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let password = password.to_string();
        let hash = hash.to_string();
        Ok(tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?)
    }

    async fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, AppError> {
        let now = Utc::now();
        let access_expires_at = expiry_after(now, self.lifetimes.access)?;
        let refresh_expires_at = expiry_after(now, self.lifetimes.refresh)?;
        let access_token = self
            .codec
            .issue(user_id, TokenType::Access, access_expires_at)?;

        let refresh = generate_refresh_token()?;
        self.tokens
            .create_refresh_record(user_id, &refresh.digest, refresh_expires_at, now, false)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh.raw,
            access_expires_at,
        })
    }
}

/// Same error and same log line for "no such user" and "wrong password"
fn reject_login() -> AppError {
    tracing::warn!("Login rejected");
    AuthError::InvalidCredentials.into()
}

fn expiry_after(now: DateTime<Utc>, lifetime: Duration) -> Result<DateTime<Utc>, AppError> {
    now.checked_add_signed(lifetime)
        .ok_or_else(|| AppError::Internal(format!("token lifetime {} is out of range", lifetime)))
}

async fn hash_blocking(password: &str) -> Result<String, AppError> {
    let password = password.to_string();
    Ok(tokio::task::spawn_blocking(move || hash_password(&password)).await??)
}
