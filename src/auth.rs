use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env, MAX_JWT_TTL_MINUTES},
    error::{AppError, AppResult},
    models::{Admin, AdminStatus, AuthToken},
    repository::AdminRepositoryState,
};

/// The `token_type` reported alongside every access token.
pub const TOKEN_TYPE: &str = "Bearer";

/// Format of `expires_time` in token responses.
pub const EXPIRES_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Claims
///
/// Payload of an access token. `sub` is the admin id; `jti` makes every issued
/// token distinct even when two are minted within the same second, and is the
/// key under which a logged-out or refreshed token is revoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: i64,
    pub jti: Uuid,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    /// Expiry as a timestamp. A revoked `jti` only needs keeping until then.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp as i64, 0).unwrap_or_else(Utc::now)
    }
}

/// TokenService
///
/// Issues and verifies HS256 access tokens. Cheap to clone, shared through the
/// application state.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl: Duration,
}

impl TokenService {
    /// `ttl_minutes` is clamped to `1..=MAX_JWT_TTL_MINUTES`.
    pub fn new(secret: impl Into<String>, ttl_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::minutes(ttl_minutes.clamp(1, MAX_JWT_TTL_MINUTES)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.jwt_secret.clone(), config.jwt_ttl_minutes)
    }

    /// issue
    ///
    /// Signs a fresh token for `admin_id` and returns it in the shape the console
    /// stores after login.
    pub fn issue(&self, admin_id: i64) -> AppResult<AuthToken> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: admin_id,
            jti: Uuid::new_v4(),
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };

        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("token signing failed: {}", e)))?;

        Ok(AuthToken {
            access_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_time: expires_at.format(EXPIRES_TIME_FORMAT).to_string(),
        })
    }

    /// verify
    ///
    /// Checks signature and expiry. Every failure collapses to `Unauthorized`;
    /// only the message tells an expired token apart.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::unauthorized("Token has expired"),
            _ => AppError::unauthorized("Invalid token"),
        })
    }
}

/// Hashes a plaintext password with the configured bcrypt cost.
pub fn hash_password(plain: &str, cost: u32) -> AppResult<String> {
    Ok(bcrypt::hash(plain, cost)?)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(plain: &str, hashed: &str) -> bool {
    bcrypt::verify(plain, hashed).unwrap_or(false)
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(parts: &Parts) -> AppResult<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing bearer token"))
}

/// AuthAdmin
///
/// The authenticated caller, resolved from the bearer token and re-read from the
/// store on every request so a deleted or disabled account is locked out
/// immediately.
///
/// *Token lifecycle*: a token whose `jti` was revoked by logout or refresh is
/// rejected even though its signature and expiry still check out.
///
/// *Dev bypass*: with `auth_dev_bypass` set (opt-in through `AUTH_DEV_BYPASS`,
/// only in `Env::Local`) an `x-admin-id` header stands in for a token. `claims`
/// is `None` for such callers.
#[derive(Debug, Clone)]
pub struct AuthAdmin {
    pub id: i64,
    pub admin: Admin,
    pub claims: Option<Claims>,
}

impl<S> FromRequestParts<S> for AuthAdmin
where
    S: Send + Sync,
    AdminRepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // The auth middleware already resolved the caller for this request.
        if let Some(resolved) = parts.extensions.get::<AuthAdmin>() {
            return Ok(resolved.clone());
        }

        let repo = AdminRepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // 1. Local dev bypass, off unless explicitly enabled
        if config.auth_dev_bypass && config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-admin-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<i64>().ok());
            if let Some(admin_id) = bypass_id {
                if let Some(admin) = repo.find_admin(admin_id).await? {
                    tracing::debug!(admin_id, "x-admin-id dev bypass used");
                    return active(admin, None);
                }
            }
        }

        // 2. Signature and expiry
        let token = bearer_token(parts)?;
        let claims = TokenService::from_ref(state).verify(token)?;

        // 3. Revocation (logout, refresh)
        if repo.is_token_revoked(claims.jti).await? {
            return Err(AppError::unauthorized("Token has been revoked"));
        }

        // 4. The account must still exist and be enabled
        let admin = repo
            .find_admin(claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized("Account no longer exists"))?;

        active(admin, Some(claims))
    }
}

fn active(admin: Admin, claims: Option<Claims>) -> AppResult<AuthAdmin> {
    if admin.status == AdminStatus::Disabled {
        return Err(AppError::unauthorized("Account is disabled"));
    }
    Ok(AuthAdmin {
        id: admin.id,
        admin,
        claims,
    })
}
