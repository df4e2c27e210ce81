//! Store error types.

use thiserror::Error;

use stash_core::CodecError;

/// Failures from a cache store or its remote backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("cache backend error: {0}")]
    Backend(String),

    /// A payload could not be serialized for the hybrid store.
    #[error("payload codec error: {0}")]
    Codec(#[from] CodecError),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
