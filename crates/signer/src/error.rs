//! Signer error types.

use thiserror::Error;

/// Signed link verification errors.
#[derive(Debug, Error)]
pub enum SignerError {
    /// A required security parameter is absent from the request.
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// A security parameter is present but unreadable.
    #[error("malformed parameter: {0}")]
    MalformedParameter(String),

    /// The link expiry lies in the past.
    #[error("link expired")]
    Expired,

    /// The signature does not cover the presented claims.
    #[error("signature verification failed")]
    Rejected,

    /// The link URL itself could not be constructed.
    #[error("invalid link: {0}")]
    InvalidLink(String),
}

/// Result type for signing operations.
pub type SignerResult<T> = std::result::Result<T, SignerError>;
