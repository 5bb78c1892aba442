use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    authz::AuthzError,
    db::DbError,
    services::{AccessRuleError, RoleServiceError, UserServiceError},
};

/// Error body: `{"error": {"type", "message", "code"}}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub code: String,
}

impl ErrorResponse {
    /// Create an error response with the `invalid_request_error` type.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_type("invalid_request_error", code, message)
    }

    /// Create an error response with an explicit error type.
    ///
    /// Types in use:
    /// - "invalid_request_error" - Invalid parameters or malformed request
    /// - "authentication_error" - Missing or invalid credentials
    /// - "permission_error" - Authenticated but not allowed
    /// - "not_found_error" - Resource not found
    /// - "server_error" - Internal or store error
    pub fn with_type(
        error_type: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorInfo {
                error_type: error_type.into(),
                message: message.into(),
                code: code.into(),
            },
        }
    }
}

#[derive(Debug)]
pub enum AdminError {
    NotFound(String),
    Conflict(String),
    Validation(String),
    Forbidden(String),
    /// The authorization store could not answer. The check is treated as denied.
    StoreUnavailable,
    Database(DbError),
    Internal(String),
}

impl From<DbError> for AdminError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => AdminError::NotFound("Resource not found".to_string()),
            DbError::Conflict(msg) => AdminError::Conflict(msg),
            DbError::Validation(msg) => AdminError::Validation(msg),
            _ => AdminError::Database(err),
        }
    }
}

impl From<AuthzError> for AdminError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::PermissionDenied { .. } | AuthzError::ResourceAccessDenied { .. } => {
                AdminError::Forbidden(err.to_string())
            }
            AuthzError::InvalidRuleDefinition(e) => AdminError::Validation(e.to_string()),
            AuthzError::StoreUnavailable(_) => AdminError::StoreUnavailable,
        }
    }
}

impl From<UserServiceError> for AdminError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::NotFound => AdminError::NotFound("User not found".to_string()),
            UserServiceError::SelfModification(msg) => AdminError::Validation(msg.to_string()),
            UserServiceError::PasswordHash(e) => AdminError::Internal(e.to_string()),
            UserServiceError::Database(e) => AdminError::from(e),
        }
    }
}

impl From<RoleServiceError> for AdminError {
    fn from(err: RoleServiceError) -> Self {
        match err {
            RoleServiceError::NotFound => AdminError::NotFound("Role not found".to_string()),
            RoleServiceError::SystemRole(_) => AdminError::Forbidden(err.to_string()),
            RoleServiceError::UnknownPermissions(_) => AdminError::Validation(err.to_string()),
            RoleServiceError::Database(e) => AdminError::from(e),
        }
    }
}

impl From<AccessRuleError> for AdminError {
    fn from(err: AccessRuleError) -> Self {
        match err {
            AccessRuleError::NotFound => {
                AdminError::NotFound("Access rule not found".to_string())
            }
            AccessRuleError::SubjectNotFound(_) | AccessRuleError::ConnectionNotFound(_) => {
                AdminError::NotFound(err.to_string())
            }
            AccessRuleError::InvalidDefinition(_) => AdminError::Validation(err.to_string()),
            AccessRuleError::Database(e) => AdminError::from(e),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            AdminError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found_error", "not_found", msg),
            AdminError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "invalid_request_error",
                "conflict",
                msg,
            ),
            AdminError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "validation_error",
                msg,
            ),
            AdminError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, "permission_error", "forbidden", msg)
            }
            AdminError::StoreUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "server_error",
                "store_unavailable",
                "Authorization is temporarily unavailable".to_string(),
            ),
            AdminError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "database_error",
                    "An internal database error occurred".to_string(),
                )
            }
            AdminError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::with_type(error_type, code, message))).into_response()
    }
}
