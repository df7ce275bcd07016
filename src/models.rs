use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidateEmail, ValidateUrl};

// --- Enumerations ---

/// PermissionType
///
/// The kind of a permission node. Stored as SMALLINT and exchanged as the
/// integers `0` (directory), `1` (menu) and `2` (action) on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, sqlx::Type, Serialize, Deserialize)]
#[repr(i16)]
#[serde(try_from = "i16", into = "i16")]
pub enum PermissionType {
    #[default]
    Directory = 0,
    Menu = 1,
    Action = 2,
}

impl TryFrom<i16> for PermissionType {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PermissionType::Directory),
            1 => Ok(PermissionType::Menu),
            2 => Ok(PermissionType::Action),
            other => Err(format!("unknown permission type {}", other)),
        }
    }
}

impl From<PermissionType> for i16 {
    fn from(value: PermissionType) -> Self {
        value as i16
    }
}

impl PermissionType {
    /// Directories and menus are navigable; actions only carry a `perms` identifier.
    pub fn is_navigable(&self) -> bool {
        matches!(self, PermissionType::Directory | PermissionType::Menu)
    }
}

/// AdminStatus
///
/// Binary account state. The console sends `0` to enable and `1` to disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type, Serialize, Deserialize)]
#[repr(i16)]
#[serde(try_from = "i16", into = "i16")]
pub enum AdminStatus {
    #[default]
    Enabled = 0,
    Disabled = 1,
}

impl TryFrom<i16> for AdminStatus {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AdminStatus::Enabled),
            1 => Ok(AdminStatus::Disabled),
            other => Err(format!("unknown admin status {}", other)),
        }
    }
}

impl From<AdminStatus> for i16 {
    fn from(value: AdminStatus) -> Self {
        value as i16
    }
}

// --- Core Schemas (Mapped to Database) ---

/// Admin
///
/// An account of the console, mapped to the `admins` table.
/// The bcrypt hash is loaded for credential checks but never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password: String,
    pub nickname: String,
    pub email: String,
    pub avatar: String,
    #[ts(type = "number")]
    #[schema(value_type = i16)]
    pub status: AdminStatus,
    #[ts(type = "string | null")]
    pub last_login_time: Option<DateTime<Utc>>,
    pub last_login_ip: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Role
///
/// A named bundle of permission grants (`roles` table).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub description: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// The `{id, display_name}` pair offered in the admin role picker.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct RoleOption {
    pub id: i64,
    pub display_name: String,
}

/// PermissionNode
///
/// One row of the `permissions` table: a directory, a menu or a leaf action.
/// `parent_id == 0` marks a root.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct PermissionNode {
    pub id: i64,
    pub parent_id: i64,
    // `type` is a reserved keyword in Rust.
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    #[ts(type = "number")]
    #[schema(value_type = i16)]
    pub kind: PermissionType,
    pub title: String,
    pub path: String,
    pub component: String,
    pub perms: String,
    pub icon: String,
    pub sort: i32,
    pub hidden: bool,
    pub is_frame: bool,
}

/// AdminLog
///
/// One audit record (`admin_log` table). Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct AdminLog {
    pub id: i64,
    pub admin_id: i64,
    pub admin_name: String,
    pub route: String,
    pub param: String,
    pub ip: String,
    pub useragent: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Write Models (Service -> Repository) ---

/// Fields required to insert an admin; `password` is already hashed.
#[derive(Debug, Clone, Default)]
pub struct NewAdmin {
    pub username: String,
    pub password: String,
    pub nickname: String,
    pub email: String,
    pub avatar: String,
}

/// Self-service profile fields editable from the account page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountProfile {
    pub email: String,
    pub avatar: String,
    pub nickname: String,
}

/// Audit entry as produced by the logging middleware.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewAdminLog {
    pub admin_id: i64,
    pub admin_name: String,
    pub route: String,
    pub param: String,
    pub ip: String,
    pub useragent: String,
}

/// Role columns shared by create and edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleInput {
    pub name: String,
    pub display_name: String,
    pub description: String,
}

/// Permission node columns shared by create and edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionInput {
    pub parent_id: i64,
    pub kind: PermissionType,
    pub title: String,
    pub path: String,
    pub component: String,
    pub perms: String,
    pub icon: String,
    pub sort: i32,
    pub hidden: bool,
    pub is_frame: bool,
}

/// Filters and ordering for the admin listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminFilter {
    pub status: Option<AdminStatus>,
    /// Already whitelisted column name.
    pub order_by: Option<&'static str>,
    pub order: crate::response::SortOrder,
}

/// Filters and ordering for the audit log listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminLogFilter {
    pub admin_id: Option<i64>,
    /// Already whitelisted column name.
    pub order_by: Option<&'static str>,
    pub order: crate::response::SortOrder,
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Credentials for `POST /admin/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Paging parameters accepted by the list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: u32,
    #[validate(custom(function = "validate_page_size"))]
    pub page_size: u32,
}

/// Query for `GET /admin/admins/lists`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct AdminListQuery {
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: u32,
    #[serde(rename = "page_size")]
    #[validate(custom(function = "validate_page_size"))]
    pub page_size: u32,
    /// `0` enabled, `1` disabled, `2` (or absent) all.
    #[validate(range(max = 2, message = "status must be one of 0, 1, 2"))]
    pub status: Option<u8>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
}

/// Query for `GET /admin/admins-logs/lists`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct AdminLogQuery {
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: u32,
    #[serde(rename = "page_size")]
    #[validate(custom(function = "validate_page_size"))]
    pub page_size: u32,
    #[serde(rename = "admin_id")]
    pub admin_id: Option<i64>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
}

/// `POST /admin/admins/create`
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateAdminRequest {
    #[validate(length(min = 1, max = 64, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "passwords do not match"))]
    pub password2: String,
}

/// `POST /admin/admins/delete`
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct DeleteAdminRequest {
    #[validate(range(min = 1, message = "admin_id is invalid"))]
    pub admin_id: i64,
}

/// `POST /admin/admins/update-password`
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateAdminPasswordRequest {
    #[validate(range(min = 1, message = "id is invalid"))]
    pub id: i64,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "passwords do not match"))]
    pub password2: String,
}

/// `POST /admin/admins/update-status`
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateAdminStatusRequest {
    #[validate(range(min = 1, message = "admin_id is invalid"))]
    pub admin_id: i64,
    /// `0` enables, `1` disables.
    #[validate(range(max = 1, message = "status must be 0 or 1"))]
    pub status: u8,
}

/// `POST /admin/account/update-password`
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateAccountPasswordRequest {
    #[validate(length(min = 1, message = "old_password is required"))]
    pub old_password: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "passwords do not match"))]
    pub password2: String,
}

/// `POST /admin/account/update-account`
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateAccountRequest {
    #[validate(custom(function = "validate_optional_email"))]
    pub email: String,
    #[validate(custom(function = "validate_optional_url"))]
    pub avatar: String,
    #[validate(length(max = 64, message = "nickname is too long"))]
    pub nickname: String,
}

/// `POST /admin/rbac/create-role`
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 64, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 128, message = "display_name is required"))]
    pub display_name: String,
    #[validate(length(min = 1, max = 255, message = "description is required"))]
    pub description: String,
}

/// `POST /admin/rbac/edit-role`
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct EditRoleRequest {
    #[validate(range(min = 1, message = "role_id is invalid"))]
    pub role_id: i64,
    #[validate(length(min = 1, max = 64, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 128, message = "display_name is required"))]
    pub display_name: String,
    #[validate(length(min = 1, max = 255, message = "description is required"))]
    pub description: String,
}

/// `POST /admin/rbac/delete-role`
///
/// `cascade` (default `true`) detaches admins still holding the role;
/// with `false` the call is rejected while the role is in use.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct DeleteRoleRequest {
    #[validate(range(min = 1, message = "role_id is invalid"))]
    pub role_id: i64,
    #[serde(default = "default_true")]
    pub cascade: bool,
}

/// Body of `create-permission` and `edit-permission`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct PermissionRequest {
    /// Required on edit, ignored on create.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "type")]
    #[ts(type = "number")]
    #[schema(value_type = i16)]
    pub kind: PermissionType,
    #[validate(range(min = 0, message = "parent_id is invalid"))]
    pub parent_id: i64,
    #[validate(length(min = 1, max = 64, message = "title is required"))]
    pub title: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub perms: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    #[validate(range(min = 0, max = 9999, message = "sort must be within 0-9999"))]
    pub sort: i32,
    pub hidden: bool,
    pub is_frame: bool,
}

impl From<PermissionRequest> for PermissionInput {
    fn from(req: PermissionRequest) -> Self {
        PermissionInput {
            parent_id: req.parent_id,
            kind: req.kind,
            title: req.title,
            path: req.path,
            component: req.component,
            perms: req.perms,
            icon: req.icon,
            sort: req.sort,
            hidden: req.hidden,
            is_frame: req.is_frame,
        }
    }
}

/// `POST /admin/rbac/delete-permission`
///
/// Without `cascade` a node that still has children is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct DeletePermissionRequest {
    #[validate(range(min = 1, message = "id is invalid"))]
    pub id: i64,
    #[serde(default)]
    pub cascade: bool,
}

/// `POST /admin/rbac/give-role-permission`
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct GiveRolePermissionRequest {
    #[validate(range(min = 1, message = "role_id is invalid"))]
    pub role_id: i64,
    /// Comma-separated permission ids, e.g. `"1,2,3"`.
    #[serde(default)]
    pub permissions: String,
}

/// `POST /admin/rbac/give-admin-permission`
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct GiveAdminPermissionRequest {
    #[validate(range(min = 1, message = "admin_id is invalid"))]
    pub admin_id: i64,
    /// `0` removes the admin's role.
    #[validate(range(min = 0, message = "role_id is invalid"))]
    pub role_id: i64,
    #[serde(default)]
    pub permissions: String,
}

/// `?role_id=` of `GET /admin/rbac/get-role-permission`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct RoleIdQuery {
    #[validate(range(min = 1, message = "role_id is invalid"))]
    pub role_id: i64,
}

/// `?admin_id=` of `GET /admin/rbac/get-admin-permission`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct AdminIdQuery {
    #[validate(range(min = 1, message = "admin_id is invalid"))]
    pub admin_id: i64,
}

// --- Response Schemas (Output) ---

/// Token block returned by login/refresh.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthToken {
    pub access_token: String,
    pub token_type: String,
    /// `YYYY-MM-DD HH:MM:SS`, UTC.
    pub expires_time: String,
}

/// Public subset of the admin shown after login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminInfo {
    pub username: String,
    pub email: String,
    pub avatar: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    pub auth: AuthToken,
    pub admin_info: AdminInfo,
}

/// `GET /admin/account/detail`
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AccountDetail {
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub avatar: String,
    pub profile: String,
}

/// `GET /admin/auth/menus`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct AuthMenusResponse {
    #[schema(value_type = Vec<Object>)]
    pub menus: Vec<crate::tree::MenuRoute>,
    pub perms: Vec<String>,
}

/// `GET /admin/rbac/get-role-permission`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct RolePermissionsResponse {
    #[schema(value_type = Vec<Object>)]
    pub permissions: Vec<crate::tree::PermissionTree>,
    pub role_perms: Vec<i64>,
}

/// `GET /admin/rbac/get-admin-permission`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct AdminPermissionsResponse {
    pub roles: Vec<RoleOption>,
    #[schema(value_type = Vec<Object>)]
    pub perms: Vec<crate::tree::PermissionTree>,
    pub admin_perms: Vec<i64>,
    /// `0` when the admin has no role.
    pub role_id: i64,
}

// --- Validation helpers ---

// validator hands Copy fields to custom checks by value.
fn validate_page_size(page_size: u32) -> Result<(), validator::ValidationError> {
    match page_size {
        10 | 20 | 30 | 50 | 100 => Ok(()),
        _ => {
            let mut err = validator::ValidationError::new("page_size");
            err.message = Some("page_size must be one of 10, 20, 30, 50, 100".into());
            Err(err)
        }
    }
}

// Both account fields may be cleared, so an empty string is accepted.
fn validate_optional_email(email: &str) -> Result<(), validator::ValidationError> {
    if email.is_empty() || email.validate_email() {
        return Ok(());
    }
    let mut err = validator::ValidationError::new("email");
    err.message = Some("email is invalid".into());
    Err(err)
}

fn validate_optional_url(url: &str) -> Result<(), validator::ValidationError> {
    if url.is_empty() || url.validate_url() {
        return Ok(());
    }
    let mut err = validator::ValidationError::new("avatar");
    err.message = Some("avatar must be a url".into());
    Err(err)
}

fn default_true() -> bool {
    true
}
