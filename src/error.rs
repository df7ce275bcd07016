use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use validator::ValidationErrors;

use crate::response::ApiResponse;

/// AppError
///
/// The single error taxonomy shared by services, extractors and handlers.
/// Every variant maps onto an envelope `code` and the matching HTTP status, so a
/// handler can simply `?` its way out and the client always receives
/// `{code, message, data}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or malformed input, surfaced verbatim to the caller.
    #[error("{0}")]
    Validation(String),

    /// Missing/invalid/expired token, bad credentials, or a disabled account.
    #[error("{0}")]
    Unauthorized(String),

    /// The authenticated admin lacks the permission guarding a route.
    #[error("{0}")]
    Forbidden(String),

    /// A referenced admin, role or permission id does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Business-rule clash: own-account deletion, role in use, duplicate names.
    #[error("{0}")]
    Conflict(String),

    /// A permission node with children was deleted without `cascade`.
    #[error("{0}")]
    HasChildren(String),

    /// The parent graph contains a cycle (or would after an edit).
    #[error("{0}")]
    MalformedHierarchy(String),

    /// Underlying store failure; never shown to the client in detail.
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

/// Convenience alias used throughout the service layer.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    /// The status code also used as the envelope `code`.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::MalformedHierarchy(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::HasChildren(_) => StatusCode::CONFLICT,
            AppError::Persistence(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Persistence(e) => {
                tracing::error!(error = ?e, "persistence failure");
                "Operation failed, please try again later".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal failure");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ApiResponse::<serde_json::Value> {
            code: status.as_u16(),
            message,
            data: serde_json::json!([]),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        // One message per response; field order in the map is unstable, so pick deterministically.
        let message = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .min()
            .unwrap_or_else(|| "invalid request".to_string());
        AppError::Validation(message)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("password hashing failed: {}", e))
    }
}
