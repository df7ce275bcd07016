use axum::extract::State;

use super::{ApiResult, ok};
use crate::{
    AppState,
    extract::ValidQuery,
    models::{AdminLog, AdminLogQuery},
    response::Paginated,
};

/// lists
///
/// [Authenticated Route] Paged audit trail, newest first unless a whitelisted
/// `sortField` is given. `admin_id` narrows it to one admin.
#[utoipa::path(
    get,
    path = "/admin/admins-logs/lists",
    tag = "admin-logs",
    params(AdminLogQuery),
    responses((status = 200, description = "One page of audit records"))
)]
pub async fn lists(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<AdminLogQuery>,
) -> ApiResult<Paginated<AdminLog>> {
    ok(state.logs.list(&query).await?)
}
