//! The save interceptor: capture modified tables before a save, invalidate
//! after it commits, discard if it fails.
//!
//! Capture has to happen pre-save because the tracker's states collapse
//! once the commit lands (Added becomes Unchanged); invalidation has to
//! happen post-save so a concurrent reader cannot re-cache rows the commit
//! is about to overwrite.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;

use stash_core::{CacheEvent, CacheEventKind, CacheMetrics};
use stash_store::QueryCacheStore;

use crate::config::CacheOptions;
use crate::error::CacheResult;
use crate::orm::OrmSession;

/// The write-side interceptor.
pub struct SaveInterceptor {
    store: Arc<dyn QueryCacheStore>,
    options: Arc<CacheOptions>,
    metrics: Arc<CacheMetrics>,
    /// Pending-invalidation slots, keyed by session id, consumed once at
    /// the save's terminal event.
    pending: DashMap<u64, Vec<String>>,
}

impl SaveInterceptor {
    pub fn new(
        store: Arc<dyn QueryCacheStore>,
        options: Arc<CacheOptions>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            store,
            options,
            metrics,
            pending: DashMap::new(),
        }
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(sink) = &self.options.on_event {
            sink(&event);
        }
    }

    /// Pre-save: snapshot the tables this save will touch.
    ///
    /// Walks the tracked changes, resolves each writing entity's table and
    /// the tables of its owned navigations, lowercases and dedupes. Nothing
    /// is stored when the change set touches no mapped table.
    pub fn saving(&self, session: &dyn OrmSession) {
        let model = session.model();
        let mut tables = BTreeSet::new();
        for entry in session.changes() {
            if !entry.state.writes() {
                continue;
            }
            if let Some(table) = model.table_name(&entry.entity_type) {
                tables.insert(table.to_ascii_lowercase());
            }
            for navigation in model.navigations(&entry.entity_type) {
                if !navigation.target_is_owned {
                    continue;
                }
                if let Some(table) = navigation.table_name {
                    tables.insert(table.to_ascii_lowercase());
                }
            }
        }
        if tables.is_empty() {
            return;
        }
        let tables: Vec<String> = tables.into_iter().collect();
        tracing::debug!(session = session.session_id(), tables = ?tables, "captured tables pending save");
        self.pending.insert(session.session_id(), tables);
    }

    /// Post-save success: consume the slot and invalidate its tables.
    pub async fn saved(&self, session: &dyn OrmSession) -> CacheResult<()> {
        let Some((_, tables)) = self.pending.remove(&session.session_id()) else {
            return Ok(());
        };
        match self.store.invalidate_tags(&tables).await {
            Ok(()) => {
                self.metrics.record_invalidation(&tables);
                self.emit(CacheEvent::new(CacheEventKind::Invalidated).tables(tables.clone()));
                tracing::debug!(tables = ?tables, "cache invalidated after save");
                Ok(())
            }
            Err(e) if self.options.fallback_to_database => {
                self.metrics.record_error();
                self.emit(
                    CacheEvent::new(CacheEventKind::Error)
                        .tables(tables)
                        .error(e.to_string()),
                );
                tracing::warn!(error = %e, "post-save invalidation failed");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Post-save failure: discard the slot without touching the cache.
    pub fn save_failed(&self, session: &dyn OrmSession) {
        self.pending.remove(&session.session_id());
    }

    /// Whether a capture is waiting for the session's save to finish.
    pub fn has_pending(&self, session: &dyn OrmSession) -> bool {
        self.pending.contains_key(&session.session_id())
    }
}
