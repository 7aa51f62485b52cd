//! Route-level errors with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::extraction::ExtractionError;

/// Error body shared by every failing route: `{ok: false, error, code}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
    pub code: &'static str,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing LLAMACLOUD_API_KEY")]
    MissingApiKey,
    #[error("No file uploaded or unsupported type")]
    UnsupportedType(Option<String>),
    #[error("Extraction schema not loaded from {0}")]
    SchemaNotLoaded(String),
    #[error("File too large. Maximum {}MB.", .limit_bytes / (1024 * 1024))]
    PayloadTooLarge { limit_bytes: usize },
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingApiKey | ApiError::SchemaNotLoaded(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::UnsupportedType(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Extraction(ExtractionError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Extraction(ExtractionError::LocalFile { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Extraction(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingApiKey => "MISSING_API_KEY",
            ApiError::UnsupportedType(_) => "UNSUPPORTED_TYPE",
            ApiError::SchemaNotLoaded(_) => "SCHEMA_NOT_LOADED",
            ApiError::PayloadTooLarge { .. } => "FILE_TOO_LARGE",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Extraction(e) => e.code(),
            ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::UnsupportedType(Some(mime)) => {
                format!("No file uploaded or unsupported type ({mime})")
            }
            ApiError::Extraction(e) => {
                tracing::warn!(code = e.code(), error = %e, "Extraction failed");
                e.bounded_message()
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            ok: false,
            error: message,
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}
