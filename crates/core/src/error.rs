//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid deployment definition: {0}")]
    InvalidDeployment(String),

    #[error("unknown status value: {0}")]
    UnknownStatus(String),

    #[error("status transition not allowed: {from} -> {to}")]
    StatusTransition { from: String, to: String },

    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("invalid deployment log: {0}")]
    InvalidLog(String),

    #[error("invalid release notes: {0}")]
    InvalidNotes(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
