//! Request middleware: authentication, the per-route permission guard and the
//! operation audit log. Ordering (outermost first) is auth, guard, audit.

use axum::{
    body::{Body, to_bytes},
    extract::{MatchedPath, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::{
    auth::AuthAdmin,
    error::AppError,
    extract::ClientIp,
    models::NewAdminLog,
    services::{AdminLogService, RbacService},
};

/// Largest request body the audit layer buffers.
pub const MAX_AUDITED_BODY: usize = 1024 * 1024;

/// Keys whose values never reach the audit table.
const REDACTED_KEYS: &[&str] = &["password", "password2", "old_password"];

/// Permission identifier required by each guarded route.
pub const ROUTE_PERMISSIONS: &[(&str, &str)] = &[
    ("/admin/admins/create", "system:user:insert"),
    ("/admin/admins/delete", "system:user:delete"),
    ("/admin/admins/update-password", "system:user:change-password"),
    ("/admin/admins/update-status", "system:user:change-status"),
    ("/admin/admins/lists", "system:user:search"),
    ("/admin/rbac/create-role", "system:role:insert"),
    ("/admin/rbac/edit-role", "system:role:edit"),
    ("/admin/rbac/delete-role", "system:role:delete"),
    ("/admin/rbac/roles", "system:role:search"),
    ("/admin/rbac/give-role-permission", "system:role:give-perms"),
    ("/admin/rbac/give-admin-permission", "system:user:give-role"),
    ("/admin/rbac/create-permission", "system:menu:insert"),
    ("/admin/rbac/edit-permission", "system:menu:edit"),
    ("/admin/rbac/delete-permission", "system:menu:delete"),
    ("/admin/rbac/permissions", "system:menu:search"),
];

pub fn route_permission(path: &str) -> Option<&'static str> {
    ROUTE_PERMISSIONS
        .iter()
        .find(|(route, _)| *route == path)
        .map(|(_, perm)| *perm)
}

fn route_of(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

/// auth_middleware
///
/// Resolves the caller once and stores it in the request extensions, where the
/// guard, the audit layer and the handlers' `AuthAdmin` extractor pick it up.
/// A failed resolution rejects the request before any of them run.
pub async fn auth_middleware(auth_admin: AuthAdmin, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_admin);
    next.run(request).await
}

/// require_permission
///
/// Looks up the matched route in `ROUTE_PERMISSIONS` and rejects callers whose
/// effective perms lack the entry. Routes without an entry pass through.
pub async fn require_permission(
    State(rbac): State<RbacService>,
    auth_admin: AuthAdmin,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let route = route_of(&request);
    if let Some(perm) = route_permission(&route) {
        if !rbac.has_perm(auth_admin.id, perm).await? {
            tracing::warn!(admin_id = auth_admin.id, route = %route, perm, "permission denied");
            return Err(AppError::Forbidden(
                "You do not have permission to perform this operation".to_string(),
            ));
        }
    }
    Ok(next.run(request).await)
}

/// audit_log
///
/// Captures the caller, route, JSON body, ip and user agent, lets the request
/// run, then writes the record on a detached task. Write failures are swallowed
/// by `AdminLogService::record`.
pub async fn audit_log(State(logs): State<AdminLogService>, request: Request, next: Next) -> Response {
    let route = route_of(&request);
    let caller = request.extensions().get::<AuthAdmin>().cloned();
    let ClientIp(ip) = ClientIp::resolve(request.headers(), request.extensions());
    let useragent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_AUDITED_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => return AppError::validation("request body is too large").into_response(),
    };
    let param = audit_param(&bytes);
    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;

    if let Some(caller) = caller {
        let entry = NewAdminLog {
            admin_id: caller.id,
            admin_name: caller.admin.username,
            route,
            param,
            ip,
            useragent,
        };
        tokio::spawn(async move { logs.record(entry).await });
    }
    response
}

/// The body as stored in `admin_log.param`: re-serialized JSON with password
/// fields masked, or `{}` when the body is empty or not JSON.
pub fn audit_param(body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(mut value) => {
            if let Value::Object(map) = &mut value {
                for key in REDACTED_KEYS {
                    if let Some(field) = map.get_mut(*key) {
                        *field = Value::String("******".to_string());
                    }
                }
            }
            value.to_string()
        }
        Err(_) => "{}".to_string(),
    }
}
