use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;

/// Environment variable holding the token signing secret
pub const JWT_SECRET_ENV: &str = "JWT_SECRET_KEY";

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_ACCESS_TOKEN_EXPIRY: i64 = 2 * 60 * 60; // 2 hours
const DEFAULT_REFRESH_TOKEN_EXPIRY: i64 = 7 * 24 * 60 * 60; // 7 days
/// Upper bound for either token lifetime
pub const MAX_TOKEN_EXPIRY: i64 = 365 * 24 * 60 * 60; // 1 year

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Token settings as read from configuration sources
///
/// `secret` is optional here so that a missing value surfaces as a
/// `ConfigError::MissingRequired` from `signing_secret`, not as a serde error.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    #[serde(default)]
    pub secret: Option<String>,
    pub access_token_expiry: i64,  // seconds
    pub refresh_token_expiry: i64, // seconds
    pub enforce_token_type: bool,
}

impl JwtSettings {
    /// Resolve the signing secret, refusing to start without one
    pub fn signing_secret(&self) -> Result<SigningSecret, ConfigError> {
        match self.secret.as_deref() {
            Some(secret) if !secret.trim().is_empty() => Ok(SigningSecret::new(secret.as_bytes())),
            _ => Err(ConfigError::MissingRequired(format!(
                "token signing secret ({} or jwt.secret)",
                JWT_SECRET_ENV
            ))),
        }
    }

    /// Both lifetimes must lie in `1..=MAX_TOKEN_EXPIRY` seconds
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_lifetime("jwt.access_token_expiry", self.access_token_expiry)?;
        check_lifetime("jwt.refresh_token_expiry", self.refresh_token_expiry)
    }
}

fn check_lifetime(key: &str, seconds: i64) -> Result<(), ConfigError> {
    if seconds <= 0 || seconds > MAX_TOKEN_EXPIRY {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be between 1 and {} seconds, got {}",
            key, MAX_TOKEN_EXPIRY, seconds
        )));
    }
    Ok(())
}

/// HMAC key material, resolved once at startup and shared read-only
#[derive(Clone)]
pub struct SigningSecret(Arc<[u8]>);

impl SigningSecret {
    pub fn new(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// Load settings from `configuration.{yaml,toml,json}` and the environment
///
/// Precedence (last wins): built-in defaults, the optional configuration file,
/// `APP__SECTION__KEY` variables, then `JWT_SECRET_KEY` for the secret.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", i64::from(DEFAULT_PORT))?
        .set_default("jwt.access_token_expiry", DEFAULT_ACCESS_TOKEN_EXPIRY)?
        .set_default("jwt.refresh_token_expiry", DEFAULT_REFRESH_TOKEN_EXPIRY)?
        .set_default("jwt.enforce_token_type", true)?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .set_override_option("jwt.secret", std::env::var(JWT_SECRET_ENV).ok())?
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.jwt.validate()?;
    Ok(settings)
}
