use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::TokenError;
use crate::routes::admin::ErrorResponse;

/// Authentication failures.
///
/// Every variant that reaches a client renders a generic message so that the
/// response never reveals which part of the credential was wrong.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer credential on a route that requires one
    #[error("missing credentials")]
    MissingCredentials,

    /// Username/password did not match a live, active account
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Access token rejected by the verifier
    #[error("invalid access token: {0}")]
    InvalidToken(#[from] TokenError),

    /// Refresh token unknown, revoked, expired or already rotated
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// Store failure while authenticating
    #[error("authentication store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Short machine-readable reason, used in audit details.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InvalidToken(TokenError::InvalidSignature) => "invalid_signature",
            AuthError::InvalidToken(TokenError::Expired) => "expired",
            AuthError::InvalidToken(_) => "malformed",
            AuthError::InvalidRefreshToken => "invalid_refresh_token",
            AuthError::StoreUnavailable(_) => "store_unavailable",
            AuthError::Internal(_) => "internal_error",
        }
    }
}

impl From<crate::db::DbError> for AuthError {
    fn from(err: crate::db::DbError) -> Self {
        AuthError::StoreUnavailable(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "missing_credentials",
                "Authentication credentials required",
            ),
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid username or password",
            ),
            AuthError::InvalidToken(_) => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid or expired authentication token",
            ),
            AuthError::InvalidRefreshToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_refresh_token",
                "Invalid or expired refresh token",
            ),
            AuthError::StoreUnavailable(msg) => {
                tracing::error!(error = %msg, "Authentication store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "Authentication is temporarily unavailable",
                )
            }
            AuthError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal authentication error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred",
                )
            }
        };

        let body = ErrorResponse::with_type("authentication_error", code, message);
        (status, Json(body)).into_response()
    }
}
