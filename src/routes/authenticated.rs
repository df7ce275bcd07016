use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes open to any signed-in admin, whatever their grants.
///
/// Access Control:
/// `create_router` wraps these routes in `auth_middleware`, which resolves the
/// caller through the `AuthAdmin` extractor. A missing, expired or revoked
/// token, or a deleted or disabled account, is rejected with 401 before any
/// handler runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // --- Session ---
        // POST /admin/auth/logout
        // Revokes the presented token.
        .route("/admin/auth/logout", post(handlers::auth::logout))
        // POST /admin/auth/refresh
        // Issues a new token and revokes the presented one.
        .route("/admin/auth/refresh", post(handlers::auth::refresh))
        // GET /admin/auth/menus
        // Route tree and perms strings for the console's dynamic router.
        .route("/admin/auth/menus", get(handlers::auth::menus))
        // --- Own account ---
        // GET /admin/account/detail
        .route("/admin/account/detail", get(handlers::account::detail))
        // --- Audit log ---
        // GET /admin/admins-logs/lists
        // Paged audit records, optionally filtered by admin.
        .route("/admin/admins-logs/lists", get(handlers::admin_logs::lists))
        // --- Grant dialogs ---
        // GET /admin/rbac/get-role-permission, GET /admin/rbac/get-admin-permission
        // Read-only: the full tree plus the current grants of one role or admin.
        .route(
            "/admin/rbac/get-role-permission",
            get(handlers::rbac::get_role_permission),
        )
        .route(
            "/admin/rbac/get-admin-permission",
            get(handlers::rbac::get_admin_permission),
        )
}

/// Self-service account mutations.
///
/// Merged under the same auth layer, plus the audit layer: every call through
/// here leaves an `admin_log` row with password fields masked.
pub fn account_logged_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/account/update-password
        // The old password must verify before the new one is stored.
        .route(
            "/admin/account/update-password",
            post(handlers::account::update_password),
        )
        // POST /admin/account/update-account
        // Email, avatar and nickname of the caller.
        .route(
            "/admin/account/update-account",
            post(handlers::account::update_account),
        )
}
