//! Error types for the API

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use pactum_core::CoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service is shutting down")]
    ShuttingDown,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Only admission-time errors surface over HTTP; execution failures are
    /// observable solely through the result-poll endpoint.
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Core(CoreError::ValidationFailed { .. }) => {
                (StatusCode::BAD_REQUEST, "validation_failed")
            }
            Self::Core(CoreError::PolicyRejected(_)) => (StatusCode::FORBIDDEN, "policy_rejected"),
            Self::Core(CoreError::LeaseUnknown(_)) => (StatusCode::NOT_FOUND, "lease_unknown"),
            Self::Core(CoreError::LeaseNotReady(_)) => (StatusCode::CONFLICT, "lease_not_ready"),
            Self::Core(CoreError::Unauthorized) => (StatusCode::FORBIDDEN, "unauthorized"),
            Self::Core(CoreError::PayloadTooLarge { .. }) => {
                (StatusCode::BAD_REQUEST, "payload_too_large")
            }
            Self::Core(CoreError::JobUnknown(_)) => (StatusCode::NOT_FOUND, "computation_unknown"),
            Self::Core(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, "shutting_down"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let body = Json(json!({
            "error": kind,
            "detail": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
