use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::types::{CatalogError, SessionError};

/// Failure classes of the HTTP surface. Every variant renders as
/// `{"error": <message>}` with a matching status code.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing API key")]
    Unauthenticated,

    #[error("Invalid API key")]
    InvalidCredential,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid session")]
    InvalidSession,

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    InternalTransportFailure(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated | ApiError::InvalidCredential => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::InvalidSession => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalTransportFailure(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownPrompt(_) | CatalogError::UnknownTool(_) => {
                ApiError::NotFound(err.to_string())
            }
            CatalogError::InvalidArguments { .. } => ApiError::BadRequest(err.to_string()),
            CatalogError::MissingBody(_) | CatalogError::InvalidBody(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => ApiError::InvalidSession,
            SessionError::CapacityExceeded(_) => ApiError::ServiceUnavailable(err.to_string()),
            SessionError::Transport(_) => ApiError::InternalTransportFailure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidCredential.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(CatalogError::UnknownTool("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(SessionError::NotFound).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SessionError::Transport("gone".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(SessionError::CapacityExceeded(3)).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(ApiError::Unauthenticated.to_string(), "Missing API key");
        assert_eq!(ApiError::InvalidCredential.to_string(), "Invalid API key");
        assert_eq!(
            ApiError::from(CatalogError::UnknownTool("unknown_tool".into())).to_string(),
            "Unknown tool: unknown_tool"
        );
    }
}
