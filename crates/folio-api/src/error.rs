//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use folio_types::api::ErrorResponse;

/// Convenience alias for handler return types.
pub type ApiResult<T> = Result<T, ApiError>;

/// Expected, caller-visible failures plus a catch-all for collaborator
/// failures (database, disk) that abort the request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, malformed, invalid or expired credential.
    #[error("Unauthenticated: {0}")]
    Authentication(String),

    /// Valid identity, insufficient role.
    #[error("Forbidden: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match &self {
            ApiError::Authentication(m) => ("unauthenticated", m.as_str()),
            ApiError::Authorization(m) => ("forbidden", m.as_str()),
            ApiError::NotFound(m) => ("not_found", m.as_str()),
            ApiError::Conflict(m) => ("conflict", m.as_str()),
            ApiError::Validation(m) => ("bad_request", m.as_str()),
            ApiError::Internal(e) => {
                error!("Request failed: {:#}", e);
                ("internal_error", "Internal server error")
            }
        };
        let body = Json(ErrorResponse {
            error: code.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}
