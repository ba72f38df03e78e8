//! Maps [`EngineError`] to an HTTP response, status code selected by tag,
//! following the teacher's `IntoResponse` dispatch in `utils/error.rs`. Kept
//! in `controllers` rather than `utils::error` so the core engine and
//! facade stay embeddable without an `axum` dependency.

use crate::utils::error::EngineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    tag: &'static str,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::Config(_) => StatusCode::BAD_REQUEST,
            EngineError::DirectionMismatch { .. } => StatusCode::BAD_REQUEST,
            EngineError::RequiredFieldMissing { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::LookupMiss { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::ValidationFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Expression { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::PathConflict { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::NotBidirectional { .. } => StatusCode::BAD_REQUEST,
            EngineError::Field { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::MappingNotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Json(_) => StatusCode::BAD_REQUEST,
        };
        tracing::warn!(tag = self.tag(), status = status.as_u16(), "{}", self);
        let body = ErrorBody { error: self.to_string(), tag: self.tag() };
        (status, Json(body)).into_response()
    }
}
