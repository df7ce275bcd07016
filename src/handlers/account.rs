use axum::extract::State;

use super::{ApiResult, Done, done, ok};
use crate::{
    AppState,
    auth::AuthAdmin,
    extract::ValidJson,
    models::{AccountDetail, AccountProfile, UpdateAccountPasswordRequest, UpdateAccountRequest},
};

/// detail
///
/// [Authenticated Route] Profile of the caller.
#[utoipa::path(
    get,
    path = "/admin/account/detail",
    tag = "account",
    responses((status = 200, description = "Account detail", body = AccountDetail))
)]
pub async fn detail(auth_admin: AuthAdmin, State(state): State<AppState>) -> ApiResult<AccountDetail> {
    ok(state.admins.detail(&auth_admin.admin))
}

/// update_password
///
/// Changes the caller's own password. The current password must verify.
#[utoipa::path(
    post,
    path = "/admin/account/update-password",
    tag = "account",
    request_body = UpdateAccountPasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 422, description = "Old password wrong or confirmation mismatch")
    )
)]
pub async fn update_password(
    auth_admin: AuthAdmin,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<UpdateAccountPasswordRequest>,
) -> Done {
    state
        .admins
        .update_account_password(
            &auth_admin.admin,
            &payload.old_password,
            &payload.password,
            &payload.password2,
        )
        .await?;
    done("Password of the current account has been changed")
}

#[utoipa::path(
    post,
    path = "/admin/account/update-account",
    tag = "account",
    request_body = UpdateAccountRequest,
    responses((status = 200, description = "Profile updated"))
)]
pub async fn update_account(
    AuthAdmin { id, .. }: AuthAdmin,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<UpdateAccountRequest>,
) -> Done {
    state
        .admins
        .update_account(
            id,
            AccountProfile {
                email: payload.email,
                avatar: payload.avatar,
                nickname: payload.nickname,
            },
        )
        .await?;
    done("Account information updated")
}
