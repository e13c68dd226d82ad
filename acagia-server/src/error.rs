//! Error types for acagia-server
//!
//! Every handler returns `Result<_, ApiError>`. Domain errors from
//! acagia-common are mapped onto HTTP status codes here so handlers can use `?`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
///
/// Wraps the domain error; the HTTP status comes from its variant.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] acagia_common::Error);

/// Convenience Result type for handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String) {
        use acagia_common::Error as Common;

        match self.0 {
            Common::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            Common::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            Common::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            err => {
                error!("Request failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    err.to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
