use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Admin-account and RBAC management endpoints.
///
/// Access Control:
/// Every path here has an entry in `middleware::ROUTE_PERMISSIONS`. Behind the
/// auth layer, `require_permission` looks the matched route up and answers 403
/// unless the caller's effective perms (role grants plus direct grants) contain
/// the mapped identifier. The configured super admin passes every check.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/admins/lists (system:user:search)
        // Paged admins, filterable by status, sortable on whitelisted columns.
        .route("/admin/admins/lists", get(handlers::admins::lists))
        // GET /admin/rbac/roles (system:role:search)
        .route("/admin/rbac/roles", get(handlers::rbac::roles))
        // GET /admin/rbac/permissions (system:menu:search)
        // Flat node listing ordered by `sort`, then `id`.
        .route("/admin/rbac/permissions", get(handlers::rbac::permissions))
}

/// Guarded mutations.
///
/// Same guard as `admin_routes`, with the audit layer inside it: only calls
/// that pass the guard are recorded.
pub fn admin_logged_routes() -> Router<AppState> {
    Router::new()
        // --- Admin accounts ---
        // Deleting one's own account is refused with 409.
        .route("/admin/admins/create", post(handlers::admins::create))
        .route("/admin/admins/delete", post(handlers::admins::delete))
        .route(
            "/admin/admins/update-password",
            post(handlers::admins::update_password),
        )
        .route(
            "/admin/admins/update-status",
            post(handlers::admins::update_status),
        )
        // --- Roles ---
        // Names are unique; `delete-role` detaches holders unless `cascade` is false.
        .route("/admin/rbac/create-role", post(handlers::rbac::create_role))
        .route("/admin/rbac/edit-role", post(handlers::rbac::edit_role))
        .route("/admin/rbac/delete-role", post(handlers::rbac::delete_role))
        // --- Permission nodes ---
        // Edits may not create cycles or exceed the nesting limit; deleting a
        // node with children needs `cascade`.
        .route(
            "/admin/rbac/create-permission",
            post(handlers::rbac::create_permission),
        )
        .route(
            "/admin/rbac/edit-permission",
            post(handlers::rbac::edit_permission),
        )
        .route(
            "/admin/rbac/delete-permission",
            post(handlers::rbac::delete_permission),
        )
        // --- Grants ---
        // Both replace the whole grant set; ids are checked against the store.
        .route(
            "/admin/rbac/give-role-permission",
            post(handlers::rbac::give_role_permission),
        )
        .route(
            "/admin/rbac/give-admin-permission",
            post(handlers::rbac::give_admin_permission),
        )
}
