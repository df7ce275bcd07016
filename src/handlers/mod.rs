//! HTTP handlers. Each one validates its input through the extractors, calls a
//! single service method and wraps the result in the `ApiResponse` envelope.
//! Errors propagate as `AppError`, which renders the same envelope.

use axum::Json;

use crate::{error::AppResult, response::ApiResponse};

pub mod account;
pub mod admin_logs;
pub mod admins;
pub mod auth;
pub mod rbac;

/// Return type shared by every handler.
pub type ApiResult<T> = AppResult<Json<ApiResponse<T>>>;

/// `data: []` success with a custom message.
pub type Done = ApiResult<serde_json::Value>;

pub(crate) fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

pub(crate) fn done(message: &str) -> Done {
    Ok(Json(ApiResponse::done(message)))
}
