use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("notification failed validation: {0}")]
    Validation(String),
    #[error("notification with id {0} already exists")]
    Duplicate(String),
    #[error("unsupported store uri: {0}")]
    UnsupportedUri(String),
    #[error("stored notification is corrupt: {0}")]
    Corrupt(String),
    #[error("failed to encode notification field: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("store backend error: {0}")]
    Backend(#[from] sqlx::Error),
}
