use axum::extract::State;

use super::{ApiResult, Done, done, ok};
use crate::{
    AppState,
    error::AppError,
    extract::{ValidJson, ValidQuery},
    models::{
        AdminIdQuery, AdminPermissionsResponse, CreateRoleRequest, DeletePermissionRequest,
        DeleteRoleRequest, EditRoleRequest, GiveAdminPermissionRequest, GiveRolePermissionRequest,
        PageQuery, PermissionNode, PermissionRequest, Role, RoleIdQuery, RoleInput,
        RolePermissionsResponse,
    },
    response::{PageRequest, Paginated},
};

// --- Roles ---

/// roles
///
/// [Guarded Route: system:role:search] Paged role listing, newest first.
#[utoipa::path(
    get,
    path = "/admin/rbac/roles",
    tag = "rbac",
    params(PageQuery),
    responses((status = 200, description = "One page of roles"))
)]
pub async fn roles(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<PageQuery>,
) -> ApiResult<Paginated<Role>> {
    ok(state
        .rbac
        .roles(PageRequest::new(query.page, query.page_size))
        .await?)
}

#[utoipa::path(
    post,
    path = "/admin/rbac/create-role",
    tag = "rbac",
    request_body = CreateRoleRequest,
    responses(
        (status = 200, description = "Role created"),
        (status = 409, description = "Name taken")
    )
)]
pub async fn create_role(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateRoleRequest>,
) -> Done {
    state
        .rbac
        .create_role(RoleInput {
            name: payload.name,
            display_name: payload.display_name,
            description: payload.description,
        })
        .await?;
    done("Role created")
}

#[utoipa::path(
    post,
    path = "/admin/rbac/edit-role",
    tag = "rbac",
    request_body = EditRoleRequest,
    responses(
        (status = 200, description = "Role updated"),
        (status = 404, description = "Unknown role"),
        (status = 409, description = "Name taken")
    )
)]
pub async fn edit_role(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<EditRoleRequest>,
) -> Done {
    state
        .rbac
        .edit_role(
            payload.role_id,
            RoleInput {
                name: payload.name,
                display_name: payload.display_name,
                description: payload.description,
            },
        )
        .await?;
    done("Role updated")
}

/// delete_role
///
/// `cascade` defaults to `true`: admins holding the role are detached.
#[utoipa::path(
    post,
    path = "/admin/rbac/delete-role",
    tag = "rbac",
    request_body = DeleteRoleRequest,
    responses(
        (status = 200, description = "Role deleted"),
        (status = 404, description = "Unknown role"),
        (status = 409, description = "Role in use and cascade disabled")
    )
)]
pub async fn delete_role(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<DeleteRoleRequest>,
) -> Done {
    state.rbac.delete_role(payload.role_id, payload.cascade).await?;
    done("Role deleted")
}

// --- Permission nodes ---

/// permissions
///
/// [Guarded Route: system:menu:search] Every node as a flat list.
#[utoipa::path(
    get,
    path = "/admin/rbac/permissions",
    tag = "rbac",
    responses((status = 200, description = "All permission nodes", body = [PermissionNode]))
)]
pub async fn permissions(State(state): State<AppState>) -> ApiResult<Vec<PermissionNode>> {
    ok(state.rbac.permissions().await?)
}

#[utoipa::path(
    post,
    path = "/admin/rbac/create-permission",
    tag = "rbac",
    request_body = PermissionRequest,
    responses(
        (status = 200, description = "Node created", body = PermissionNode),
        (status = 404, description = "Unknown parent")
    )
)]
pub async fn create_permission(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<PermissionRequest>,
) -> ApiResult<PermissionNode> {
    ok(state.rbac.create_permission(payload.into()).await?)
}

/// edit_permission
///
/// Requires `id` in the body. Moving a node under its own subtree is a `422`.
#[utoipa::path(
    post,
    path = "/admin/rbac/edit-permission",
    tag = "rbac",
    request_body = PermissionRequest,
    responses(
        (status = 200, description = "Node updated"),
        (status = 404, description = "Unknown node or parent"),
        (status = 422, description = "Validation error or cycle")
    )
)]
pub async fn edit_permission(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<PermissionRequest>,
) -> Done {
    let id = payload
        .id
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::validation("id is required"))?;
    state.rbac.edit_permission(id, payload.into()).await?;
    done("Permission updated")
}

/// delete_permission
///
/// Without `cascade` a node that has children is refused with `409`.
#[utoipa::path(
    post,
    path = "/admin/rbac/delete-permission",
    tag = "rbac",
    request_body = DeletePermissionRequest,
    responses(
        (status = 200, description = "Node (and subtree) deleted"),
        (status = 404, description = "Unknown node"),
        (status = 409, description = "Node has children")
    )
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<DeletePermissionRequest>,
) -> Done {
    state.rbac.delete_permission(payload.id, payload.cascade).await?;
    done("Permission deleted")
}

// --- Grants ---

/// give_role_permission
///
/// Replaces the role's grant set with the comma-separated `permissions`.
#[utoipa::path(
    post,
    path = "/admin/rbac/give-role-permission",
    tag = "rbac",
    request_body = GiveRolePermissionRequest,
    responses(
        (status = 200, description = "Grants replaced"),
        (status = 404, description = "Unknown role or permission id")
    )
)]
pub async fn give_role_permission(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<GiveRolePermissionRequest>,
) -> Done {
    state
        .rbac
        .give_role_permission(payload.role_id, &payload.permissions)
        .await?;
    done("Role permissions saved")
}

/// give_admin_permission
///
/// Sets the admin's role (`0` for none) and replaces their direct grants.
#[utoipa::path(
    post,
    path = "/admin/rbac/give-admin-permission",
    tag = "rbac",
    request_body = GiveAdminPermissionRequest,
    responses(
        (status = 200, description = "Role and grants replaced"),
        (status = 404, description = "Unknown admin, role or permission id")
    )
)]
pub async fn give_admin_permission(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<GiveAdminPermissionRequest>,
) -> Done {
    state
        .rbac
        .give_admin_role(payload.admin_id, payload.role_id, &payload.permissions)
        .await?;
    done("Admin permissions saved")
}

#[utoipa::path(
    get,
    path = "/admin/rbac/get-role-permission",
    tag = "rbac",
    params(RoleIdQuery),
    responses(
        (status = 200, description = "Full tree and the role's grant ids", body = RolePermissionsResponse),
        (status = 404, description = "Unknown role")
    )
)]
pub async fn get_role_permission(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<RoleIdQuery>,
) -> ApiResult<RolePermissionsResponse> {
    ok(state.rbac.role_permissions(query.role_id).await?)
}

#[utoipa::path(
    get,
    path = "/admin/rbac/get-admin-permission",
    tag = "rbac",
    params(AdminIdQuery),
    responses(
        (status = 200, description = "Roles, full tree, direct grants and role id", body = AdminPermissionsResponse),
        (status = 404, description = "Unknown admin")
    )
)]
pub async fn get_admin_permission(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<AdminIdQuery>,
) -> ApiResult<AdminPermissionsResponse> {
    ok(state.rbac.admin_permissions(query.admin_id).await?)
}
