//! # Web API Errors
//!
//! JSON error bodies of the form `{"error": {"code": ..., "message": ...}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::BatchError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::ExecutionNotFound(id) => Self::not_found(format!("Job execution {id}")),
            BatchError::LaunchConflict { .. } => Self::conflict(err.to_string()),
            other => {
                error!(error = %other, "Request failed");
                Self::Internal {
                    message: other.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            ApiError::NotFound { message } => ("NOT_FOUND", message.as_str()),
            ApiError::BadRequest { message } => ("BAD_REQUEST", message.as_str()),
            ApiError::Conflict { message } => ("CONFLICT", message.as_str()),
            ApiError::Internal { message } => ("INTERNAL_ERROR", message.as_str()),
        };

        let body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });

        (self.status_code(), Json(body)).into_response()
    }
}
