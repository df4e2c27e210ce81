//! Cache pipeline error type.

use thiserror::Error;

use stash_core::StashError;
use stash_store::StoreError;

/// Failures surfaced by the interception pipeline.
///
/// With `fallback_to_database` enabled, store failures never reach the
/// caller; they become events and the query runs against the database.
/// Driver failures during capture always propagate verbatim.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] StashError),
}

/// Result alias for pipeline operations.
pub type CacheResult<T> = Result<T, CacheError>;
