//! Errors returned to HTTP clients.
//!
//! Bodies have the shape `{"detail": "..."}`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::pipeline::PipelineError;

/// Seconds suggested to clients when every generation slot is busy.
const BUSY_RETRY_AFTER_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Missing required form field '{0}'")]
    MissingField(String),

    #[error("{message}")]
    Multipart { status: StatusCode, message: String },

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Generation queue is full, retry later")]
    Busy,

    #[error("{0}")]
    Generation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingField(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Multipart { status, .. } => *status,
            ApiError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ModelLoad(_) | ApiError::Generation(_) | ApiError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::LoadFailed(msg) => ApiError::ModelLoad(msg),
            PipelineError::Busy => ApiError::Busy,
            other => ApiError::Generation(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::warn!(status = %status, error = %self, "Request rejected");
        }

        let mut response = (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response();

        if matches!(self, ApiError::Busy) {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(BUSY_RETRY_AFTER_SECS),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pipeline_errors_map_to_statuses() {
        let load: ApiError = PipelineError::LoadFailed("no weights".into()).into();
        assert_eq!(load.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(load.to_string(), "Failed to load model: no weights");

        let busy: ApiError = PipelineError::Busy.into();
        assert_eq!(busy.status(), StatusCode::SERVICE_UNAVAILABLE);

        let timeout: ApiError = PipelineError::Timeout(Duration::from_secs(5)).into();
        assert_eq!(timeout.to_string(), "pipeline timed out after 5s");
    }

    #[test]
    fn busy_response_carries_retry_after() {
        let response = ApiError::Busy.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");
    }

    #[test]
    fn missing_field_is_unprocessable() {
        let response = ApiError::MissingField("image".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
