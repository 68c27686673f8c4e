use thiserror::Error;

/// Result alias for content operations.
pub type Result<T> = std::result::Result<T, ContentError>;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("content is not a block document: {0}")]
    NotADocument(String),

    #[error("image block #{index} has an invalid payload")]
    InvalidImageBlock { index: usize },
}
