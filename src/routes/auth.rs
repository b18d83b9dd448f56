/// Authentication Routes
///
/// Thin JSON wrappers around `SessionService`. All failures are `AppError`s,
/// so every authentication rejection renders as the same 401.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::AccessClaims;
use crate::error::{AppError, ValidationError};
use crate::session::{SessionService, TokenPair};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of refresh and logout
#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub id: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// RFC 3339 timestamp at which the access token stops verifying
    pub expires_at: String,
    pub expires_in: i64,
}

impl From<TokenPair> for AuthResponse {
    fn from(pair: TokenPair) -> Self {
        let expires_in = (pair.access_expires_at - chrono::Utc::now()).num_seconds().max(0);
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_at: pair.access_expires_at.to_rfc3339(),
            expires_in,
        }
    }
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
}

fn require_refresh_token(form: &RefreshRequest) -> Result<&str, AppError> {
    let token = form.refresh_token.trim();
    if token.is_empty() {
        return Err(ValidationError::EmptyField("refresh_token".to_string()).into());
    }
    Ok(token)
}

/// POST /api/v1/user/register
///
/// # Errors
/// - 400: invalid email, name or weak password
/// - 409: email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    session: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let user_id = session
        .register(&form.name, &form.email, &form.password)
        .await?;

    Ok(HttpResponse::Created().json(RegisterResponse {
        id: user_id.to_string(),
    }))
}

/// POST /api/v1/user/login
///
/// # Errors
/// - 401: unknown email or wrong password (same response for both)
pub async fn login(
    form: web::Json<LoginRequest>,
    session: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let pair = session.login(&form.email, &form.password).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::from(pair)))
}

/// POST /api/v1/user/refresh
///
/// Consumes the presented refresh token and returns a new pair. Replaying a
/// consumed token gets a 401.
///
/// # Errors
/// - 400: missing refresh token
/// - 401: unknown, already used or expired refresh token
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    session: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let raw_token = require_refresh_token(&form)?;
    let pair = session.refresh(raw_token).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::from(pair)))
}

/// POST /api/v1/user/logout
///
/// # Errors
/// - 400: missing refresh token
/// - 401: the token matched no session
pub async fn logout(
    form: web::Json<RefreshRequest>,
    session: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let raw_token = require_refresh_token(&form)?;
    session.logout(raw_token).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/v1/user/me
///
/// **Requires** `Authorization: Bearer <access_token>`; claims are injected
/// by `JwtMiddleware`.
pub async fn get_current_user(
    claims: web::ReqData<AccessClaims>,
    session: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let user = session.current_user(user_id).await?;

    Ok(HttpResponse::Ok().json(UserResponse {
        id: user.id.to_string(),
        name: user.name,
        email: user.email,
    }))
}

/// POST /api/v1/user/password
///
/// Ends every session of the user on success.
pub async fn change_password(
    claims: web::ReqData<AccessClaims>,
    form: web::Json<ChangePasswordRequest>,
    session: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    session
        .change_password(user_id, &form.current_password, &form.new_password)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
