//! Error types for core value parsing.

use thiserror::Error;

/// Result type alias for core parsing operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid image digest: {0}")]
    InvalidDigest(String),

    #[error("invalid image reference: {0}")]
    InvalidImage(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("invalid probe policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid traffic split: {0}")]
    InvalidTraffic(String),
}
