//! The cache-store contract shared by the local and hybrid variants.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use stash_core::ResultSet;

use crate::error::StoreResult;

/// Key-to-result-set store with TTLs and tag-based invalidation.
///
/// Implementations are safe under arbitrary concurrent interleavings of all
/// five operations. Within one task, a `set` is observed by the task's later
/// `get`, and an `invalidate_tags` hides every overlapping entry from the
/// task's later `get`. `invalidate_all` is globally visible immediately.
#[async_trait]
pub trait QueryCacheStore: Send + Sync {
    /// Look up an entry; expired or superseded entries read as absent.
    async fn get(&self, key: &str) -> StoreResult<Option<Arc<ResultSet>>>;

    /// Insert or replace an entry with its expirations and dependency tags.
    async fn set(
        &self,
        key: &str,
        result: Arc<ResultSet>,
        absolute: Duration,
        sliding: Option<Duration>,
        tags: &[String],
    ) -> StoreResult<()>;

    /// Drop every entry depending on any of `tags`.
    async fn invalidate_tags(&self, tags: &[String]) -> StoreResult<()>;

    /// Drop a single entry.
    async fn invalidate_key(&self, key: &str) -> StoreResult<()>;

    /// Logically drop everything, without enumerating entries.
    async fn invalidate_all(&self) -> StoreResult<()>;
}
