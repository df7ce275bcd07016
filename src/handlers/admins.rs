use axum::extract::State;

use super::{ApiResult, Done, done, ok};
use crate::{
    AppState,
    auth::AuthAdmin,
    error::AppError,
    extract::{ValidJson, ValidQuery},
    models::{
        Admin, AdminListQuery, AdminStatus, CreateAdminRequest, DeleteAdminRequest,
        UpdateAdminPasswordRequest, UpdateAdminStatusRequest,
    },
    response::Paginated,
};

/// create
///
/// [Guarded Route: system:user:insert] Adds an admin account.
#[utoipa::path(
    post,
    path = "/admin/admins/create",
    tag = "admins",
    request_body = CreateAdminRequest,
    responses(
        (status = 200, description = "Admin created"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn create(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateAdminRequest>,
) -> Done {
    state
        .admins
        .create(&payload.username, &payload.password, &payload.password2)
        .await?;
    done("Admin created")
}

/// delete
///
/// [Guarded Route: system:user:delete] Removes an admin and their grants.
/// Deleting one's own account is always a `409`.
#[utoipa::path(
    post,
    path = "/admin/admins/delete",
    tag = "admins",
    request_body = DeleteAdminRequest,
    responses(
        (status = 200, description = "Admin deleted"),
        (status = 404, description = "Unknown admin"),
        (status = 409, description = "Own account")
    )
)]
pub async fn delete(
    AuthAdmin { id: caller_id, .. }: AuthAdmin,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<DeleteAdminRequest>,
) -> Done {
    state.admins.delete(caller_id, payload.admin_id).await?;
    done("Admin deleted")
}

#[utoipa::path(
    post,
    path = "/admin/admins/update-password",
    tag = "admins",
    request_body = UpdateAdminPasswordRequest,
    responses((status = 200, description = "Password reset"))
)]
pub async fn update_password(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<UpdateAdminPasswordRequest>,
) -> Done {
    state
        .admins
        .update_password(payload.id, &payload.password, &payload.password2)
        .await?;
    done("Password updated")
}

#[utoipa::path(
    post,
    path = "/admin/admins/update-status",
    tag = "admins",
    request_body = UpdateAdminStatusRequest,
    responses((status = 200, description = "Status updated"))
)]
pub async fn update_status(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<UpdateAdminStatusRequest>,
) -> Done {
    let status = AdminStatus::try_from(i16::from(payload.status)).map_err(AppError::Validation)?;
    state.admins.update_status(payload.admin_id, status).await?;
    done("Status updated")
}

/// lists
///
/// [Guarded Route: system:user:search] Paged admin listing with an optional
/// status filter and sort.
#[utoipa::path(
    get,
    path = "/admin/admins/lists",
    tag = "admins",
    params(AdminListQuery),
    responses((status = 200, description = "One page of admins"))
)]
pub async fn lists(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<AdminListQuery>,
) -> ApiResult<Paginated<Admin>> {
    ok(state.admins.list(&query).await?)
}
