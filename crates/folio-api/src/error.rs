//! Error types for the API client.

use std::collections::BTreeMap;

use folio_content::ContentError;
use folio_editor::{RemoteError, SessionError};
use serde::Deserialize;

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // ============================================================
    // Caller errors (no request was made)
    // ============================================================
    /// An authenticated endpoint was called without a session.
    #[error("Not signed in")]
    Unauthenticated,

    #[error("A post needs a title")]
    MissingTitle,

    // ============================================================
    // Server responses
    // ============================================================
    #[error("Not found: {0}")]
    NotFound(String),

    /// 422 with per-field messages.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    // ============================================================
    // Infrastructure
    // ============================================================
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid response from server: {0}")]
    Decode(String),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("Editing session: {0}")]
    Session(#[from] SessionError),
}

/// Body of a non-2xx response, as far as it can be read.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ErrorPayload {
    pub message: Option<String>,
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

impl From<ApiError> for RemoteError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthenticated => RemoteError::Unauthenticated,
            ApiError::UploadRejected(message)
            | ApiError::Validation { message, .. }
            | ApiError::Status { message, .. } => RemoteError::Rejected(message),
            ApiError::Decode(message) => RemoteError::InvalidResponse(message),
            other => RemoteError::Transport(other.to_string()),
        }
    }
}
