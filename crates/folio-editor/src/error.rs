//! Error types for the authoring side.

use folio_content::ContentError;
use thiserror::Error;

use crate::image_tool::ToolState;
use crate::upload::UploadRejection;

/// Failure reported by the remote side (upload endpoint, media library).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("server rejected the request: {0}")]
    Rejected(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by a block tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Client-side validation refused the file before any request was made.
    #[error("file rejected: {0}")]
    Rejected(#[from] UploadRejection),

    #[error("upload failed: {0}")]
    Upload(#[from] RemoteError),

    #[error("cannot {operation} while the block is {state}")]
    InvalidState {
        operation: &'static str,
        state: ToolState,
    },

    #[error("tool is read-only")]
    ReadOnly,

    #[error("selected media has no url")]
    EmptySelection,

    #[error("upload is not in flight")]
    StaleTicket,
}

/// Errors surfaced by an editing session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("block not found: {0}")]
    BlockNotFound(String),

    #[error("block {0} is not an image block")]
    NotAnImage(String),

    #[error("image block {id} has an invalid payload")]
    InvalidBlock { id: String },

    #[error("media picker is not available")]
    PickerClosed,

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Content(#[from] ContentError),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
