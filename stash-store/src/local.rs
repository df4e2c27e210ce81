//! In-process cache store with TTLs, a tag index, and a generation counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use stash_core::{CacheMetrics, ResultSet};

use crate::error::StoreResult;
use crate::store::QueryCacheStore;
use crate::tag_index::TagIndex;

/// Capacity bounds for the local store. Zero disables a bound.
#[derive(Debug, Clone)]
pub struct LocalStoreOptions {
    pub max_entries: usize,
    pub max_total_bytes: u64,
}

impl Default for LocalStoreOptions {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_total_bytes: 0,
        }
    }
}

#[derive(Debug)]
struct StoreEntry {
    result: Arc<ResultSet>,
    generation: u64,
    deadline: Instant,
    sliding: Option<Duration>,
    /// Milliseconds since the store's epoch; touched on every hit.
    last_access_ms: AtomicU64,
    size_bytes: u64,
}

impl StoreEntry {
    fn expired(&self, now: Instant, epoch: Instant) -> bool {
        if now >= self.deadline {
            return true;
        }
        if let Some(window) = self.sliding {
            let last = epoch + Duration::from_millis(self.last_access_ms.load(Ordering::Relaxed));
            if now.saturating_duration_since(last) > window {
                return true;
            }
        }
        false
    }
}

/// The in-process store variant.
///
/// Entries live in a lock-free map; a single critical section keeps the
/// bidirectional tag index and the entry map in agreement on the write
/// paths. Expiry and generation staleness are detected lazily on `get`;
/// that cleanup uses only lock-free index operations and never takes the
/// critical section.
pub struct LocalQueryCache {
    entries: DashMap<String, StoreEntry>,
    tags: TagIndex,
    generation: AtomicU64,
    epoch: Instant,
    total_bytes: AtomicU64,
    options: LocalStoreOptions,
    metrics: Arc<CacheMetrics>,
    write_lock: Mutex<()>,
}

impl LocalQueryCache {
    pub fn new(options: LocalStoreOptions) -> Self {
        Self::with_metrics(options, Arc::new(CacheMetrics::new()))
    }

    pub fn with_metrics(options: LocalStoreOptions, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            entries: DashMap::new(),
            tags: TagIndex::new(),
            generation: AtomicU64::new(0),
            epoch: Instant::now(),
            total_bytes: AtomicU64::new(0),
            options,
            metrics,
            write_lock: Mutex::new(()),
        }
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn elapsed_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Remove one entry and its tag rows. Lock-free; never takes the
    /// critical section, so it is callable while the section is held and
    /// from lazy-expiry paths that do not hold it.
    fn remove_entry(&self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((_, entry)) => {
                self.tags.remove_key(key);
                self.total_bytes
                    .fetch_sub(entry.size_bytes.min(self.total_bytes.load(Ordering::Relaxed)), Ordering::Relaxed);
                self.metrics.add_bytes(-(entry.size_bytes as i64));
                true
            }
            None => false,
        }
    }

    /// Drop expired and superseded entries, then evict the stalest-accessed
    /// live entries until the incoming entry fits the configured bounds.
    /// Caller holds the critical section.
    fn make_room(&self, incoming_bytes: u64) {
        let over = |entries: usize, bytes: u64| {
            (self.options.max_entries > 0 && entries >= self.options.max_entries)
                || (self.options.max_total_bytes > 0
                    && bytes + incoming_bytes > self.options.max_total_bytes)
        };

        if !over(self.entries.len(), self.total_bytes.load(Ordering::Relaxed)) {
            return;
        }

        let now = Instant::now();
        let current = self.generation.load(Ordering::SeqCst);
        let dead: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.generation < current || e.expired(now, self.epoch))
            .map(|e| e.key().clone())
            .collect();
        for key in dead {
            self.remove_entry(&key);
        }

        if !over(self.entries.len(), self.total_bytes.load(Ordering::Relaxed)) {
            return;
        }

        let mut by_staleness: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|e| (e.last_access_ms.load(Ordering::Relaxed), e.key().clone()))
            .collect();
        by_staleness.sort_unstable();
        for (_, key) in by_staleness {
            if !over(self.entries.len(), self.total_bytes.load(Ordering::Relaxed)) {
                break;
            }
            if self.remove_entry(&key) {
                tracing::debug!(key = %key, "evicted cache entry under size pressure");
            }
        }
    }
}

#[async_trait]
impl QueryCacheStore for LocalQueryCache {
    async fn get(&self, key: &str) -> StoreResult<Option<Arc<ResultSet>>> {
        let current = self.generation.load(Ordering::SeqCst);
        let now = Instant::now();

        let outcome = match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) => {
                if entry.generation < current || entry.expired(now, self.epoch) {
                    None
                } else {
                    entry.last_access_ms.store(self.elapsed_ms(), Ordering::Relaxed);
                    Some(Arc::clone(&entry.result))
                }
            }
        };

        match outcome {
            Some(result) => Ok(Some(result)),
            None => {
                self.remove_entry(key);
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
        let size_bytes = result.size_bytes;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.make_room(size_bytes);

        if let Some((_, old)) = self.entries.remove(key) {
            self.total_bytes.fetch_sub(
                old.size_bytes.min(self.total_bytes.load(Ordering::Relaxed)),
                Ordering::Relaxed,
            );
            self.metrics.add_bytes(-(old.size_bytes as i64));
        }

        self.tags.record(key, tags);

        let entry = StoreEntry {
            result,
            generation: self.generation.load(Ordering::SeqCst),
            deadline: Instant::now() + absolute,
            sliding,
            last_access_ms: AtomicU64::new(self.elapsed_ms()),
            size_bytes,
        };
        self.entries.insert(key.to_string(), entry);
        self.total_bytes.fetch_add(size_bytes, Ordering::Relaxed);
        self.metrics.add_bytes(size_bytes as i64);
        Ok(())
    }

    async fn invalidate_tags(&self, tags: &[String]) -> StoreResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let keys = self.tags.take_tags(tags);
        let count = keys.len();
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(&key) {
                self.total_bytes.fetch_sub(
                    entry.size_bytes.min(self.total_bytes.load(Ordering::Relaxed)),
                    Ordering::Relaxed,
                );
                self.metrics.add_bytes(-(entry.size_bytes as i64));
            }
            self.tags.remove_key(&key);
        }
        if count > 0 {
            tracing::debug!(tags = ?tags, entries = count, "invalidated cache entries by tag");
        }
        Ok(())
    }

    async fn invalidate_key(&self, key: &str) -> StoreResult<()> {
        self.remove_entry(key);
        Ok(())
    }

    async fn invalidate_all(&self) -> StoreResult<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.tags.clear();
        tracing::debug!("cache generation bumped; prior entries will be dropped lazily");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stash_core::resultset::Column;
    use stash_core::{CellValue, ValueKind};

    fn result_set(rows: usize) -> Arc<ResultSet> {
        let columns = vec![Column::new(0, "id", "int4", ValueKind::Int32, false)];
        let data = (0..rows).map(|i| vec![CellValue::Int32(i as i32)]).collect();
        Arc::new(ResultSet::from_parts(columns, data, -1, Utc::now()))
    }

    fn store() -> LocalQueryCache {
        LocalQueryCache::new(LocalStoreOptions::default())
    }

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    const ABS: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let store = store();
        let rs = result_set(2);
        store.set("k", Arc::clone(&rs), ABS, None, &tags(&["products"])).await.unwrap();

        let got = store.get("k").await.unwrap().expect("entry");
        assert_eq!(*got, *rs);
    }

    #[tokio::test]
    async fn test_empty_result_set_is_not_a_miss() {
        let store = store();
        store.set("k", result_set(0), ABS, None, &[]).await.unwrap();
        let got = store.get("k").await.unwrap().expect("empty entry");
        assert_eq!(got.row_count(), 0);
    }

    #[tokio::test]
    async fn test_tag_invalidation() {
        let store = store();
        store.set("k1", result_set(1), ABS, None, &tags(&["products"])).await.unwrap();
        store.set("k2", result_set(1), ABS, None, &tags(&["orders"])).await.unwrap();

        store.invalidate_tags(&tags(&["products"])).await.unwrap();
        assert!(store.get("k1").await.unwrap().is_none());
        assert!(store.get("k2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalidate_key() {
        let store = store();
        store.set("k1", result_set(1), ABS, None, &tags(&["products"])).await.unwrap();
        store.invalidate_key("k1").await.unwrap();
        assert!(store.get("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_all_uses_generation() {
        let store = store();
        store.set("k1", result_set(1), ABS, None, &tags(&["products"])).await.unwrap();
        store.set("k2", result_set(1), ABS, None, &[]).await.unwrap();

        store.invalidate_all().await.unwrap();

        // No sweep happened, the entries are discovered stale lazily.
        assert!(store.get("k1").await.unwrap().is_none());
        assert!(store.get("k2").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_entries_set_after_flush_are_visible() {
        let store = store();
        store.invalidate_all().await.unwrap();
        store.set("k", result_set(1), ABS, None, &[]).await.unwrap();
        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_absolute_expiry() {
        let store = store();
        store
            .set("k", result_set(1), Duration::from_millis(20), None, &[])
            .await
            .unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_sliding_expiry_refreshes_on_access() {
        let store = store();
        store
            .set(
                "k",
                result_set(1),
                Duration::from_secs(60),
                Some(Duration::from_millis(60)),
                &[],
            )
            .await
            .unwrap();

        // Keep touching inside the window.
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            assert!(store.get("k").await.unwrap().is_some());
        }

        // Let the window lapse.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_tags() {
        let store = store();
        store.set("k", result_set(1), ABS, None, &tags(&["products"])).await.unwrap();
        store.set("k", result_set(2), ABS, None, &tags(&["orders"])).await.unwrap();

        store.invalidate_tags(&tags(&["products"])).await.unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        store.invalidate_tags(&tags(&["orders"])).await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entry_capacity_evicts_stalest() {
        let store = LocalQueryCache::new(LocalStoreOptions {
            max_entries: 2,
            max_total_bytes: 0,
        });
        store.set("a", result_set(1), ABS, None, &[]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.set("b", result_set(1), ABS, None, &[]).await.unwrap();

        // Touch "a" so "b" is the stalest when room is needed.
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.get("a").await.unwrap();

        store.set("c", result_set(1), ABS, None, &[]).await.unwrap();
        assert!(store.get("a").await.unwrap().is_some());
        assert!(store.get("b").await.unwrap().is_none());
        assert!(store.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_byte_capacity_enforced() {
        let rs = result_set(10);
        let budget = rs.size_bytes + rs.size_bytes / 2;
        let store = LocalQueryCache::new(LocalStoreOptions {
            max_entries: 0,
            max_total_bytes: budget,
        });
        store.set("a", Arc::clone(&rs), ABS, None, &[]).await.unwrap();
        store.set("b", result_set(10), ABS, None, &[]).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_bytes_metric_tracks_admit_and_eviction() {
        let store = store();
        let rs = result_set(4);
        let size = rs.size_bytes;
        store.set("k", rs, ABS, None, &tags(&["products"])).await.unwrap();
        assert_eq!(store.metrics().bytes_cached(), size);

        store.invalidate_tags(&tags(&["products"])).await.unwrap();
        assert_eq!(store.metrics().bytes_cached(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_set_and_get() {
        let store = Arc::new(store());
        let mut handles = Vec::new();
        for worker in 0..8u32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for i in 0..50u32 {
                    let key = format!("k{}", (worker + i) % 16);
                    store
                        .set(&key, result_set(1), ABS, None, &tags(&["products"]))
                        .await
                        .unwrap();
                    store.get(&key).await.unwrap();
                    if i % 10 == 0 {
                        store.invalidate_tags(&tags(&["products"])).await.unwrap();
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
