//! Wires the options, store, interceptors, and telemetry into one unit.

use std::sync::Arc;

use stash_core::CacheMetrics;
use stash_store::{
    HybridQueryCache, LocalQueryCache, LocalStoreOptions, QueryCacheStore, RemoteCache,
};

use crate::config::CacheOptions;
use crate::health::CacheHealth;
use crate::interceptor::QueryCacheInterceptor;
use crate::invalidation::CacheInvalidator;
use crate::save_interceptor::SaveInterceptor;

/// The assembled second-level cache.
///
/// Host adapters route driver callbacks to [`interceptor`], save lifecycle
/// events to [`saves`], and expose [`invalidator`] and [`health`] to
/// application code and operators.
///
/// [`interceptor`]: SecondLevelCache::interceptor
/// [`saves`]: SecondLevelCache::saves
/// [`invalidator`]: SecondLevelCache::invalidator
/// [`health`]: SecondLevelCache::health
pub struct SecondLevelCache {
    options: Arc<CacheOptions>,
    store: Arc<dyn QueryCacheStore>,
    metrics: Arc<CacheMetrics>,
    interceptor: QueryCacheInterceptor,
    saves: SaveInterceptor,
    invalidator: CacheInvalidator,
    health: CacheHealth,
}

impl SecondLevelCache {
    pub fn builder() -> SecondLevelCacheBuilder {
        SecondLevelCacheBuilder::default()
    }

    pub fn interceptor(&self) -> &QueryCacheInterceptor {
        &self.interceptor
    }

    pub fn saves(&self) -> &SaveInterceptor {
        &self.saves
    }

    pub fn invalidator(&self) -> &CacheInvalidator {
        &self.invalidator
    }

    pub fn health(&self) -> &CacheHealth {
        &self.health
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    pub fn options(&self) -> &Arc<CacheOptions> {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn QueryCacheStore> {
        &self.store
    }
}

/// Builder choosing the options and the store variant.
#[derive(Default)]
pub struct SecondLevelCacheBuilder {
    options: CacheOptions,
    local: Option<LocalStoreOptions>,
    backend: Option<Arc<dyn RemoteCache>>,
    store: Option<Arc<dyn QueryCacheStore>>,
}

impl SecondLevelCacheBuilder {
    pub fn options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Use the in-process store with the given capacity bounds. This is the
    /// default with default bounds when nothing else is chosen.
    pub fn local_store(mut self, local: LocalStoreOptions) -> Self {
        self.local = Some(local);
        self
    }

    /// Use the hybrid store over the given remote backend.
    pub fn hybrid_store(mut self, backend: Arc<dyn RemoteCache>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use a custom store implementation.
    pub fn store(mut self, store: Arc<dyn QueryCacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> SecondLevelCache {
        let options = Arc::new(self.options);
        let metrics = Arc::new(CacheMetrics::new());

        let store: Arc<dyn QueryCacheStore> = if let Some(store) = self.store {
            store
        } else if let Some(backend) = self.backend {
            Arc::new(HybridQueryCache::with_metrics(backend, Arc::clone(&metrics)))
        } else {
            Arc::new(LocalQueryCache::with_metrics(
                self.local.unwrap_or_default(),
                Arc::clone(&metrics),
            ))
        };

        tracing::debug!(
            cache_all = options.cache_all_queries,
            max_rows = options.max_rows_per_query,
            "second-level cache assembled"
        );

        let interceptor = QueryCacheInterceptor::new(
            Arc::clone(&store),
            Arc::clone(&options),
            Arc::clone(&metrics),
        );
        let saves = SaveInterceptor::new(
            Arc::clone(&store),
            Arc::clone(&options),
            Arc::clone(&metrics),
        );
        let invalidator = CacheInvalidator::new(
            Arc::clone(&store),
            Arc::clone(&options),
            Arc::clone(&metrics),
        );
        let health = CacheHealth::new(
            Arc::clone(&store),
            Arc::clone(&metrics),
            options.minimum_hit_rate_percent,
        );

        SecondLevelCache {
            options,
            store,
            metrics,
            interceptor,
            saves,
            invalidator,
            health,
        }
    }
}
