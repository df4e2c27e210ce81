//! The command interceptor: decides per command whether to serve, store,
//! or skip, and replays cached rows through the driver's reader contract.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use stash_core::{
    directive, sql, CacheEvent, CacheEventKind, CacheMetrics, Captured, CellValue, Command,
    KeyGenerator, ResultSet, ResultSetReader, RowReader,
};
use stash_store::QueryCacheStore;

use crate::config::CacheOptions;
use crate::error::CacheResult;

/// Outcome of the pre-execution callback.
pub enum Intercept {
    /// The command was served from the cache; do not hit the database.
    Hit(ResultSetReader),
    /// Execute against the database, then hand the reader to `executed`.
    Continue,
}

/// Outcome of the post-execution callback.
pub enum ExecutedResult<R> {
    /// Rows were drained and are replayed from memory; the live reader is
    /// already closed.
    Cached(ResultSetReader),
    /// The command was not part of a caching flow; the live reader is
    /// returned untouched.
    Uncached(R),
}

/// Outcome of the pre-execution callback for scalar commands.
pub enum ScalarIntercept {
    Hit(CellValue),
    Continue,
}

#[derive(Debug, Clone)]
struct PendingQuery {
    key: String,
    absolute: Duration,
    sliding: Option<Duration>,
    tags: Vec<String>,
    started_at: Instant,
}

enum Plan {
    Skip,
    Cache {
        tags: Vec<String>,
        absolute: Duration,
        sliding: Option<Duration>,
    },
}

/// The read-side interceptor.
///
/// `executing` and `executed` are two callbacks on the same command; the
/// fingerprint computed in the first is carried to the second through a
/// read-once map keyed by the command's process-unique id. A host that
/// aborts a command between the callbacks calls `abandon` to release the
/// slot.
pub struct QueryCacheInterceptor {
    store: Arc<dyn QueryCacheStore>,
    options: Arc<CacheOptions>,
    metrics: Arc<CacheMetrics>,
    keys: KeyGenerator,
    pending: DashMap<u64, PendingQuery>,
}

impl QueryCacheInterceptor {
    pub fn new(
        store: Arc<dyn QueryCacheStore>,
        options: Arc<CacheOptions>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        let keys = KeyGenerator::new(options.key_prefix.clone());
        Self {
            store,
            options,
            metrics,
            keys,
            pending: DashMap::new(),
        }
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// The cache key this command would be stored under.
    pub fn key_for(&self, command: &Command) -> String {
        self.keys.key_for(command)
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(sink) = &self.options.on_event {
            sink(&event);
        }
    }

    /// The eligibility decision, in normative order: an upstream result,
    /// an opt-out directive, or a non-query statement each stop caching; an
    /// opt-in directive forces it; otherwise cache-all mode decides, minus
    /// excluded tables.
    fn plan(&self, command: &Command, has_upstream_result: bool) -> Plan {
        if has_upstream_result {
            return Plan::Skip;
        }
        let directives = directive::parse(&command.text);
        if directives.no_cache {
            return Plan::Skip;
        }
        if !sql::is_query_statement(&command.text) {
            return Plan::Skip;
        }

        let (absolute, sliding) = self.options.resolve_ttl(&directives);
        let tags: Vec<String> = sql::extract_tables(&command.text).into_iter().collect();

        if directives.opt_in {
            return Plan::Cache {
                tags,
                absolute,
                sliding,
            };
        }
        if self.options.cache_all_queries {
            if let Some(excluded) = tags.iter().find(|t| self.options.is_excluded(t)) {
                self.metrics.record_skip();
                self.emit(
                    CacheEvent::new(CacheEventKind::SkippedExcludedTable)
                        .tables(vec![excluded.clone()]),
                );
                return Plan::Skip;
            }
            return Plan::Cache {
                tags,
                absolute,
                sliding,
            };
        }
        Plan::Skip
    }

    /// Pre-execution callback for reader commands.
    pub async fn executing(
        &self,
        command: &Command,
        has_upstream_result: bool,
    ) -> CacheResult<Intercept> {
        let Plan::Cache {
            tags,
            absolute,
            sliding,
        } = self.plan(command, has_upstream_result)
        else {
            return Ok(Intercept::Continue);
        };

        let key = self.keys.key_for(command);
        let started_at = Instant::now();
        let pending = PendingQuery {
            key: key.clone(),
            absolute,
            sliding,
            tags,
            started_at,
        };

        match self.store.get(&key).await {
            Ok(Some(result)) => {
                self.metrics.record_hit();
                self.emit(
                    CacheEvent::new(CacheEventKind::Hit)
                        .key(&key)
                        .row_count(result.row_count())
                        .size_bytes(result.size_bytes)
                        .duration(started_at.elapsed()),
                );
                tracing::debug!(key = %key, rows = result.row_count(), "cache hit");
                Ok(Intercept::Hit(ResultSetReader::new(result)))
            }
            Ok(None) => {
                self.metrics.record_miss();
                self.emit(
                    CacheEvent::new(CacheEventKind::Miss)
                        .key(&key)
                        .duration(started_at.elapsed()),
                );
                self.pending.insert(command.id(), pending);
                Ok(Intercept::Continue)
            }
            Err(e) if self.options.fallback_to_database => {
                self.metrics.record_error();
                self.emit(
                    CacheEvent::new(CacheEventKind::Error)
                        .key(&key)
                        .error(e.to_string()),
                );
                self.emit(CacheEvent::new(CacheEventKind::FallbackToDatabase).key(&key));
                tracing::warn!(key = %key, error = %e, "cache read failed; falling back to database");
                self.pending.insert(command.id(), pending);
                Ok(Intercept::Continue)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Post-execution callback for reader commands.
    ///
    /// Drains the live reader, applies admission, and replays the drained
    /// rows from memory. A row set over the row limit is replayed but never
    /// stored; partial captures are never admitted.
    pub async fn executed<R: RowReader>(
        &self,
        command: &Command,
        mut reader: R,
    ) -> CacheResult<ExecutedResult<R>> {
        let Some((_, pending)) = self.pending.remove(&command.id()) else {
            return Ok(ExecutedResult::Uncached(reader));
        };

        let captured =
            ResultSet::capture(&mut reader, self.options.max_rows_per_query).await?;

        let result = match captured {
            Captured::RowLimitExceeded(partial) => {
                self.metrics.record_skip();
                self.emit(
                    CacheEvent::new(CacheEventKind::SkippedTooManyRows)
                        .key(&pending.key)
                        .row_count(partial.row_count()),
                );
                tracing::debug!(
                    key = %pending.key,
                    limit = self.options.max_rows_per_query,
                    "row limit exceeded; result not cached"
                );
                Arc::new(partial)
            }
            Captured::Complete(set) => {
                let set = Arc::new(set);
                self.admit(&pending, &set).await?;
                set
            }
        };

        Ok(ExecutedResult::Cached(ResultSetReader::new(result)))
    }

    /// Pre-execution callback for scalar commands. A scalar is a
    /// one-column, one-row result set on the same pipeline.
    pub async fn scalar_executing(
        &self,
        command: &Command,
        has_upstream_result: bool,
    ) -> CacheResult<ScalarIntercept> {
        match self.executing(command, has_upstream_result).await? {
            Intercept::Hit(mut reader) => {
                let value = if reader.read() {
                    reader.value(0)?
                } else {
                    CellValue::Null
                };
                Ok(ScalarIntercept::Hit(value))
            }
            Intercept::Continue => Ok(ScalarIntercept::Continue),
        }
    }

    /// Post-execution callback for scalar commands.
    pub async fn scalar_executed(
        &self,
        command: &Command,
        value: CellValue,
    ) -> CacheResult<CellValue> {
        let Some((_, pending)) = self.pending.remove(&command.id()) else {
            return Ok(value);
        };
        let set = Arc::new(ResultSet::single_value(value.clone()));
        self.admit(&pending, &set).await?;
        Ok(value)
    }

    /// Release the pending slot of a command that failed between the
    /// callbacks.
    pub fn abandon(&self, command: &Command) {
        self.pending.remove(&command.id());
    }

    async fn admit(&self, pending: &PendingQuery, set: &Arc<ResultSet>) -> CacheResult<()> {
        let limit = self.options.max_cache_entry_size;
        if limit > 0 && set.size_bytes > limit {
            self.metrics.record_skip();
            self.emit(
                CacheEvent::new(CacheEventKind::SkippedTooLarge)
                    .key(&pending.key)
                    .size_bytes(set.size_bytes),
            );
            tracing::debug!(
                key = %pending.key,
                size = set.size_bytes,
                limit,
                "entry over size limit; not cached"
            );
            return Ok(());
        }

        match self
            .store
            .set(
                &pending.key,
                Arc::clone(set),
                pending.absolute,
                pending.sliding,
                &pending.tags,
            )
            .await
        {
            Ok(()) => {
                self.emit(
                    CacheEvent::new(CacheEventKind::ResultCached)
                        .key(&pending.key)
                        .tables(pending.tags.clone())
                        .row_count(set.row_count())
                        .size_bytes(set.size_bytes)
                        .ttl(pending.absolute)
                        .duration(pending.started_at.elapsed()),
                );
                tracing::debug!(
                    key = %pending.key,
                    rows = set.row_count(),
                    tags = ?pending.tags,
                    "query result cached"
                );
                Ok(())
            }
            Err(e) if self.options.fallback_to_database => {
                self.metrics.record_error();
                self.emit(
                    CacheEvent::new(CacheEventKind::Error)
                        .key(&pending.key)
                        .error(e.to_string()),
                );
                self.emit(CacheEvent::new(CacheEventKind::FallbackToDatabase).key(&pending.key));
                tracing::warn!(key = %pending.key, error = %e, "cache write failed; result served live");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
