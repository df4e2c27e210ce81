//! Hybrid store: entries serialized through the codec and held by an
//! external multi-tier backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use stash_core::{codec, CacheMetrics, ResultSet};

use crate::backend::RemoteCache;
use crate::error::StoreResult;
use crate::store::QueryCacheStore;

/// Store variant backed by an external cache.
///
/// The backend may not support a global flush, so invalidate-all is the
/// generation trick: every key and tag is written under a `v<gen>:` prefix
/// and a bump makes prior generations unreachable; the backend's own
/// expiration cleans them up. A payload that fails to deserialize reads as
/// a miss and is proactively removed.
pub struct HybridQueryCache {
    backend: Arc<dyn RemoteCache>,
    generation: AtomicU64,
    metrics: Arc<CacheMetrics>,
}

impl HybridQueryCache {
    pub fn new(backend: Arc<dyn RemoteCache>) -> Self {
        Self::with_metrics(backend, Arc::new(CacheMetrics::new()))
    }

    pub fn with_metrics(backend: Arc<dyn RemoteCache>, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            backend,
            generation: AtomicU64::new(0),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    pub fn backend(&self) -> &Arc<dyn RemoteCache> {
        &self.backend
    }

    fn versioned(&self, raw: &str) -> String {
        format!("v{}:{}", self.generation.load(Ordering::SeqCst), raw)
    }
}

#[async_trait]
impl QueryCacheStore for HybridQueryCache {
    async fn get(&self, key: &str) -> StoreResult<Option<Arc<ResultSet>>> {
        let versioned = self.versioned(key);
        let Some(bytes) = self.backend.get(&versioned).await? else {
            return Ok(None);
        };
        match codec::deserialize(&bytes) {
            Ok(set) => Ok(Some(Arc::new(set))),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "dropping corrupt cache payload");
                let _ = self.backend.remove(&versioned).await;
                Ok(None)
            }
        }
    }

    async fn set(
        &self,
        key: &str,
        result: Arc<ResultSet>,
        absolute: Duration,
        sliding: Option<Duration>,
        tags: &[String],
    ) -> StoreResult<()> {
        let bytes = codec::serialize(&result)?;
        let size = bytes.len() as i64;
        let versioned_tags: Vec<String> = tags.iter().map(|t| self.versioned(t)).collect();
        self.backend
            .put(&self.versioned(key), bytes, absolute, sliding, &versioned_tags)
            .await?;
        self.metrics.add_bytes(size);
        Ok(())
    }

    async fn invalidate_tags(&self, tags: &[String]) -> StoreResult<()> {
        for tag in tags {
            self.backend.remove_tag(&self.versioned(tag)).await?;
        }
        Ok(())
    }

    async fn invalidate_key(&self, key: &str) -> StoreResult<()> {
        self.backend.remove(&self.versioned(key)).await
    }

    async fn invalidate_all(&self) -> StoreResult<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("hybrid cache generation bumped");
        Ok(())
    }
}
