//! API error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use provost_runtime::RuntimeError;
use provost_store::StoreError;

/// Errors surfaced as plain HTTP responses (never on an open stream).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Setup-phase runtime failure.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Store failure on a read endpoint.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Runtime(RuntimeError::SessionBusy(_)) => StatusCode::CONFLICT,
            Self::Runtime(RuntimeError::ServerBusy { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Runtime(RuntimeError::UnknownPersona(_)) => StatusCode::NOT_FOUND,
            Self::Runtime(RuntimeError::Store(StoreError::SessionNotFound(_)))
            | Self::Store(StoreError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({"error": self.to_string()}));
        (status, body).into_response()
    }
}
