//! Thread-safe cache counters.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;

/// Monotonic cache counters, shared by the stores and the interceptors.
///
/// Counters only move forward except through `reset`. `bytes_cached` is a
/// running delta: admissions add, evictions and invalidations subtract.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    skips: AtomicU64,
    invalidations: AtomicU64,
    per_table_invalidations: DashMap<String, u64>,
    bytes_cached: AtomicI64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self, tables: &[String]) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        for table in tables {
            *self.per_table_invalidations.entry(table.clone()).or_insert(0) += 1;
        }
    }

    /// Admission adds a positive delta, eviction a negative one.
    pub fn add_bytes(&self, delta: i64) {
        self.bytes_cached.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn skips(&self) -> u64 {
        self.skips.load(Ordering::Relaxed)
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    pub fn invalidations_for(&self, table: &str) -> u64 {
        self.per_table_invalidations
            .get(table)
            .map(|v| *v)
            .unwrap_or(0)
    }

    /// Bytes currently attributed to cached entries; never below zero.
    pub fn bytes_cached(&self) -> u64 {
        self.bytes_cached.load(Ordering::Relaxed).max(0) as u64
    }

    pub fn requests(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Hit rate as a percentage; 0 when nothing has been requested.
    pub fn hit_rate_percent(&self) -> f64 {
        let total = self.requests();
        if total == 0 {
            0.0
        } else {
            (self.hits() as f64 / total as f64) * 100.0
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.skips.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
        self.per_table_invalidations.clear();
        self.bytes_cached.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let m = CacheMetrics::new();
        assert_eq!(m.hit_rate_percent(), 0.0);

        m.record_hit();
        m.record_hit();
        m.record_hit();
        m.record_miss();
        assert_eq!(m.hit_rate_percent(), 75.0);
    }

    #[test]
    fn test_per_table_invalidations() {
        let m = CacheMetrics::new();
        m.record_invalidation(&["products".into(), "orders".into()]);
        m.record_invalidation(&["products".into()]);
        assert_eq!(m.invalidations(), 2);
        assert_eq!(m.invalidations_for("products"), 2);
        assert_eq!(m.invalidations_for("orders"), 1);
        assert_eq!(m.invalidations_for("customers"), 0);
    }

    #[test]
    fn test_bytes_never_negative() {
        let m = CacheMetrics::new();
        m.add_bytes(100);
        m.add_bytes(-250);
        assert_eq!(m.bytes_cached(), 0);
    }

    #[test]
    fn test_reset() {
        let m = CacheMetrics::new();
        m.record_hit();
        m.add_bytes(10);
        m.record_invalidation(&["t".into()]);
        m.reset();
        assert_eq!(m.hits(), 0);
        assert_eq!(m.bytes_cached(), 0);
        assert_eq!(m.invalidations_for("t"), 0);
    }
}
