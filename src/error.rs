//! Service error taxonomy and HTTP mapping.
//!
//! Every error surfaced to a caller is rendered as the JSON error envelope
//! `{success: false, message, error, timestamp}` with the appropriate status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Document not found")]
    NotFound,

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Document content unavailable: {0}")]
    ContentUnavailable(String),

    #[error("OCR processing failed: {0}")]
    Extraction(String),

    #[error("Summary generation failed: {0}")]
    Summarization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error envelope returned for every failed request.
#[derive(Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    pub error: String,
    pub timestamp: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            // Summarization-before-extraction is a caller-order problem, not ours.
            ApiError::BadRequest(_) | ApiError::PreconditionFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::StorageWrite(_)
            | ApiError::ContentUnavailable(_)
            | ApiError::Extraction(_)
            | ApiError::Summarization(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound => "not_found",
            ApiError::PreconditionFailed(_) => "precondition_failed",
            ApiError::StorageWrite(_) => "storage_write_error",
            ApiError::ContentUnavailable(_) => "content_unavailable",
            ApiError::Extraction(_) => "extraction_error",
            ApiError::Summarization(_) => "summarization_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let envelope = ErrorEnvelope {
            success: false,
            message: self.to_string(),
            error: self.error_code().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
