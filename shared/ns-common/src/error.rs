//! Shared Error Types

use thiserror::Error;

/// Errors raised while interpreting wire data.
#[derive(Debug, Error)]
pub enum Error {
    /// A payload could not be decoded into its expected shape.
    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// A value was well-formed but not acceptable.
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Result alias for shared helpers.
pub type Result<T> = std::result::Result<T, Error>;
