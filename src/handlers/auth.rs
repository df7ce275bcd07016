use axum::extract::State;

use super::{ApiResult, Done, done, ok};
use crate::{
    AppState,
    auth::AuthAdmin,
    extract::{ClientIp, ValidJson},
    models::{AuthMenusResponse, AuthToken, LoginRequest, LoginResponse},
};

/// login
///
/// [Public Route] Exchanges a username and password for an access token.
/// Records the login time and client ip on success.
#[utoipa::path(
    post,
    path = "/admin/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Bad credentials or disabled account"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let response = state
        .auth
        .login_with_token(&payload.username, &payload.password, &ip)
        .await?;
    ok(response)
}

/// logout
///
/// Revokes the caller's token. Any later request presenting it gets a 401.
#[utoipa::path(
    post,
    path = "/admin/auth/logout",
    tag = "auth",
    responses((status = 200, description = "Logged out"))
)]
pub async fn logout(
    AuthAdmin { id, claims, .. }: AuthAdmin,
    State(state): State<AppState>,
) -> Done {
    state.auth.logout(id, claims.as_ref()).await?;
    done("Successfully logged out")
}

/// refresh
///
/// Issues a new token for the caller and revokes the one presented.
#[utoipa::path(
    post,
    path = "/admin/auth/refresh",
    tag = "auth",
    responses((status = 200, description = "Token refreshed", body = AuthToken))
)]
pub async fn refresh(auth_admin: AuthAdmin, State(state): State<AppState>) -> ApiResult<AuthToken> {
    let token = state
        .auth
        .refresh(&auth_admin.admin, auth_admin.claims.as_ref())
        .await?;
    ok(token)
}

/// menus
///
/// The caller's navigable route tree and their action `perms` strings.
#[utoipa::path(
    get,
    path = "/admin/auth/menus",
    tag = "auth",
    responses((status = 200, description = "Menus and perms", body = AuthMenusResponse))
)]
pub async fn menus(
    AuthAdmin { id, .. }: AuthAdmin,
    State(state): State<AppState>,
) -> ApiResult<AuthMenusResponse> {
    ok(AuthMenusResponse {
        menus: state.rbac.get_auth_menu_routes(id).await?,
        perms: state.rbac.get_auth_perms(id).await?,
    })
}
