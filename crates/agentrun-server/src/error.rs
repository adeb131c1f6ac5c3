//! Maps [`agentrun_core::error::EngineError`] onto HTTP status codes per the
//! engine's error taxonomy. Grounded in the teacher's `krusty_server::error`
//! (`AppError` → `IntoResponse`), generalized to dispatch on
//! `EngineError::category()` instead of a hand-matched status per variant.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use agentrun_core::error::{ErrorCategory, EngineError};

pub struct AppError(EngineError);

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match self.0.category() {
            ErrorCategory::Validation => (StatusCode::BAD_REQUEST, "validation"),
            ErrorCategory::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ErrorCategory::Conflict => (StatusCode::CONFLICT, "conflict"),
            ErrorCategory::Storage => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
            ErrorCategory::Model => (StatusCode::INTERNAL_SERVER_ERROR, "model"),
            ErrorCategory::ToolExecution => (StatusCode::INTERNAL_SERVER_ERROR, "tool_execution"),
            ErrorCategory::Timeout => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            ErrorCategory::Unknown => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }

        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
                code,
            }),
        )
            .into_response()
    }
}
