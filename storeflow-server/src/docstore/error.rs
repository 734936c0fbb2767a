//! Document store errors

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Errors surfaced by a [`DocumentStore`](super::DocumentStore) backend
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The query needs a composite index the backend does not have
    #[error("Missing index for query on {collection}: {fields}")]
    MissingIndex { collection: String, fields: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// A batch precondition no longer holds
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(msg) => AppError::permission_denied(msg),
            StoreError::NotFound(path) => AppError::not_found(path),
            StoreError::Conflict(msg) => AppError::conflict(msg),
            StoreError::MissingIndex { collection, fields } => {
                AppError::new(ErrorCode::MissingIndex)
                    .with_detail("collection", collection)
                    .with_detail("fields", fields)
            }
            StoreError::Unavailable(msg) => AppError::with_message(ErrorCode::NetworkError, msg),
            StoreError::Serialization(msg) => {
                tracing::error!(error = %msg, "Document (de)serialization failed");
                AppError::database(msg)
            }
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
