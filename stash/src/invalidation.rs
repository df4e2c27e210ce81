//! Manual invalidation surface for application code.

use std::sync::Arc;

use stash_core::{CacheEvent, CacheEventKind, CacheMetrics};
use stash_store::QueryCacheStore;

use crate::config::CacheOptions;
use crate::error::CacheResult;
use crate::orm::EntityModel;

/// Explicit invalidation by table, entity type, key, or wholesale.
pub struct CacheInvalidator {
    store: Arc<dyn QueryCacheStore>,
    options: Arc<CacheOptions>,
    metrics: Arc<CacheMetrics>,
}

impl CacheInvalidator {
    pub fn new(
        store: Arc<dyn QueryCacheStore>,
        options: Arc<CacheOptions>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            store,
            options,
            metrics,
        }
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(sink) = &self.options.on_event {
            sink(&event);
        }
    }

    /// Invalidate every entry depending on any of the given tables.
    pub async fn invalidate_tables<S: AsRef<str>>(&self, tables: &[S]) -> CacheResult<()> {
        let tags: Vec<String> = tables
            .iter()
            .map(|t| t.as_ref().to_ascii_lowercase())
            .collect();
        if tags.is_empty() {
            return Ok(());
        }
        self.store.invalidate_tags(&tags).await?;
        self.metrics.record_invalidation(&tags);
        self.emit(CacheEvent::new(CacheEventKind::Invalidated).tables(tags.clone()));
        tracing::debug!(tables = ?tags, "manual table invalidation");
        Ok(())
    }

    /// Resolve entity types through the model and invalidate their tables.
    /// Types the model does not map are ignored.
    pub async fn invalidate_entities<S: AsRef<str>>(
        &self,
        model: &dyn EntityModel,
        entity_types: &[S],
    ) -> CacheResult<()> {
        let mut tables: Vec<String> = Vec::new();
        for entity_type in entity_types {
            if let Some(table) = model.table_name(entity_type.as_ref()) {
                let table = table.to_ascii_lowercase();
                if !tables.contains(&table) {
                    tables.push(table);
                }
            }
        }
        self.invalidate_tables(&tables).await
    }

    /// Remove one entry by its fingerprint.
    pub async fn invalidate_key(&self, key: &str) -> CacheResult<()> {
        self.store.invalidate_key(key).await?;
        self.metrics.record_invalidation(&[]);
        self.emit(CacheEvent::new(CacheEventKind::Invalidated).key(key));
        tracing::debug!(key = %key, "manual key invalidation");
        Ok(())
    }

    /// Logically drop every cached entry.
    pub async fn invalidate_all(&self) -> CacheResult<()> {
        self.store.invalidate_all().await?;
        self.metrics.record_invalidation(&[]);
        self.emit(CacheEvent::new(CacheEventKind::Invalidated));
        tracing::info!("cache flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::NavigationInfo;
    use chrono::Utc;
    use stash_core::resultset::{Column, ResultSet};
    use stash_core::{CellValue, ValueKind};
    use stash_store::{LocalQueryCache, LocalStoreOptions};
    use std::time::Duration;

    struct TestModel;

    impl EntityModel for TestModel {
        fn table_name(&self, entity_type: &str) -> Option<String> {
            match entity_type {
                "Product" => Some("Products".to_string()),
                _ => None,
            }
        }

        fn navigations(&self, _entity_type: &str) -> Vec<NavigationInfo> {
            Vec::new()
        }
    }

    fn result_set() -> Arc<ResultSet> {
        let columns = vec![Column::new(0, "id", "int4", ValueKind::Int32, false)];
        Arc::new(ResultSet::from_parts(
            columns,
            vec![vec![CellValue::Int32(1)]],
            -1,
            Utc::now(),
        ))
    }

    fn setup() -> (Arc<LocalQueryCache>, CacheInvalidator) {
        let metrics = Arc::new(CacheMetrics::new());
        let store = Arc::new(LocalQueryCache::with_metrics(
            LocalStoreOptions::default(),
            Arc::clone(&metrics),
        ));
        let invalidator = CacheInvalidator::new(
            Arc::clone(&store) as Arc<dyn QueryCacheStore>,
            Arc::new(CacheOptions::default()),
            metrics,
        );
        (store, invalidator)
    }

    const ABS: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_invalidate_tables_is_case_insensitive() {
        let (store, invalidator) = setup();
        store
            .set("k", result_set(), ABS, None, &["products".to_string()])
            .await
            .unwrap();

        invalidator.invalidate_tables(&["PRODUCTS"]).await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_entities_resolves_tables() {
        let (store, invalidator) = setup();
        store
            .set("k", result_set(), ABS, None, &["products".to_string()])
            .await
            .unwrap();

        invalidator
            .invalidate_entities(&TestModel, &["Product", "Unmapped"])
            .await
            .unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_key() {
        let (store, invalidator) = setup();
        store.set("k", result_set(), ABS, None, &[]).await.unwrap();
        invalidator.invalidate_key("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let (store, invalidator) = setup();
        store.set("k1", result_set(), ABS, None, &[]).await.unwrap();
        store.set("k2", result_set(), ABS, None, &[]).await.unwrap();
        invalidator.invalidate_all().await.unwrap();
        assert!(store.get("k1").await.unwrap().is_none());
        assert!(store.get("k2").await.unwrap().is_none());
    }
}
