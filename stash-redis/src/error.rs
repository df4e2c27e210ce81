//! Error types for the Redis backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedisError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// An `-ERR`-style reply from the server.
    #[error("server error: {0}")]
    Server(String),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("pool closed")]
    PoolClosed,
}

/// Result alias for Redis operations.
pub type RedisResult<T> = Result<T, RedisError>;

impl From<RedisError> for stash_store::StoreError {
    fn from(e: RedisError) -> Self {
        stash_store::StoreError::Backend(e.to_string())
    }
}
