//! API Error Types

use thiserror::Error;

/// Errors from backend calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// An authenticated endpoint was called without an established session.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The backend could not be reached.
    #[error("Connection failed: {0}")]
    Transport(String),

    /// The backend rejected the session token (401/403).
    #[error("Session rejected by server ({status})")]
    Unauthorized { status: u16 },

    /// The backend refused the operation on this resource.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The response did not have the expected shape.
    #[error("Invalid response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// Input refused before any request was made.
    #[error(transparent)]
    Invalid(#[from] ns_common::Error),
}

impl ApiError {
    /// Whether this error ends the session.
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::NotAuthenticated)
    }

    /// HTTP status carried by the error, if any.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status } | Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;
