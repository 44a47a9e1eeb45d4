//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("deployment already finished")]
    AlreadyFinished,

    #[error("unprocessable: {0}")]
    Unprocessable(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] hangar_storage::StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] hangar_metadata::MetadataError),
}

impl From<hangar_core::Error> for ApiError {
    fn from(e: hangar_core::Error) -> Self {
        match e {
            // An out-of-table transition is a request that conflicts with
            // the recorded state, not a malformed one.
            hangar_core::Error::StatusTransition { .. } => Self::Conflict(e.to_string()),
            _ => Self::InvalidInput(e.to_string()),
        }
    }
}

impl From<hangar_signer::SignerError> for ApiError {
    fn from(e: hangar_signer::SignerError) -> Self {
        use hangar_signer::SignerError;
        match e {
            SignerError::MissingParameter(_) | SignerError::MalformedParameter(_) => {
                Self::MalformedRequest(e.to_string())
            }
            SignerError::Expired | SignerError::Rejected => Self::Forbidden(e.to_string()),
            SignerError::InvalidLink(msg) => Self::Internal(msg),
        }
    }
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Conflict(_) => "conflict",
            Self::AlreadyFinished => "already_finished",
            Self::Unprocessable(_) => "unprocessable",
            Self::Forbidden(_) => "forbidden",
            Self::MalformedRequest(_) => "malformed_request",
            Self::InvalidArtifact(_) => "invalid_artifact",
            Self::Internal(_) => "internal_error",
            Self::Storage(_) => "storage_error",
            Self::Metadata(_) => "metadata_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::AlreadyFinished => StatusCode::CONFLICT,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidArtifact(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                hangar_storage::StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Metadata(e) => match e {
                hangar_metadata::MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                hangar_metadata::MetadataError::AlreadyExists(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
