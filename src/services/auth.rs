use chrono::Utc;

use crate::{
    auth::{Claims, TokenService, verify_password},
    error::{AppError, AppResult},
    models::{Admin, AdminInfo, AdminStatus, AuthToken, LoginResponse},
    repository::AdminRepositoryState,
};

const BAD_CREDENTIALS: &str = "Account does not exist or password is incorrect";

/// AuthService
///
/// Credential checks, token issuance and token revocation. A revoked `jti` is
/// kept in the store until the token's own expiry, after which it could not be
/// used anyway.
#[derive(Clone)]
pub struct AuthService {
    admins: AdminRepositoryState,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(admins: AdminRepositoryState, tokens: TokenService) -> Self {
        Self { admins, tokens }
    }

    /// login
    ///
    /// Verifies the credentials, rejects disabled accounts and stamps the login
    /// time and client ip. Unknown usernames and wrong passwords produce the same
    /// message.
    pub async fn login(&self, username: &str, password: &str, ip: &str) -> AppResult<Admin> {
        let mut admin = self
            .admins
            .find_admin_by_username(username)
            .await?
            .ok_or_else(|| AppError::unauthorized(BAD_CREDENTIALS))?;

        if !verify_password(password, &admin.password) {
            return Err(AppError::unauthorized(BAD_CREDENTIALS));
        }
        if admin.status == AdminStatus::Disabled {
            return Err(AppError::unauthorized("Account is disabled"));
        }

        let now = Utc::now();
        self.admins.record_login(admin.id, now, ip).await?;
        admin.last_login_time = Some(now);
        admin.last_login_ip = ip.to_string();

        tracing::info!(admin_id = admin.id, "admin logged in");
        Ok(admin)
    }

    pub fn issue_token(&self, admin: &Admin) -> AppResult<AuthToken> {
        self.tokens.issue(admin.id)
    }

    /// Login followed by token issuance, shaped for the login endpoint.
    pub async fn login_with_token(
        &self,
        username: &str,
        password: &str,
        ip: &str,
    ) -> AppResult<LoginResponse> {
        let admin = self.login(username, password, ip).await?;
        Ok(LoginResponse {
            auth: self.issue_token(&admin)?,
            admin_info: AdminInfo {
                username: admin.username,
                email: admin.email,
                avatar: admin.avatar,
            },
        })
    }

    /// logout
    ///
    /// Revokes the presented token. Callers without claims (dev bypass) have
    /// nothing to revoke.
    pub async fn logout(&self, admin_id: i64, claims: Option<&Claims>) -> AppResult<()> {
        if let Some(claims) = claims {
            self.revoke(admin_id, claims).await?;
        }
        tracing::info!(admin_id, "admin logged out");
        Ok(())
    }

    /// refresh
    ///
    /// Rotates the caller's token: a new one is issued and the presented one is
    /// revoked.
    pub async fn refresh(&self, admin: &Admin, claims: Option<&Claims>) -> AppResult<AuthToken> {
        let token = self.issue_token(admin)?;
        if let Some(claims) = claims {
            self.revoke(admin.id, claims).await?;
        }
        Ok(token)
    }

    async fn revoke(&self, admin_id: i64, claims: &Claims) -> AppResult<()> {
        self.admins
            .revoke_token(claims.jti, admin_id, claims.expires_at())
            .await?;
        tracing::debug!(admin_id, jti = %claims.jti, "token revoked");
        Ok(())
    }
}
