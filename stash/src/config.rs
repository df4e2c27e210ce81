//! Cache configuration and TTL profiles.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use stash_core::directive::Directives;
use stash_core::EventSink;

/// Named TTL preset referenced by `Profile=` directives.
#[derive(Debug, Clone, Default)]
pub struct CacheProfile {
    pub absolute: Option<Duration>,
    pub sliding: Option<Duration>,
}

/// Behavior switches for the whole pipeline.
#[derive(Clone)]
pub struct CacheOptions {
    /// TTL for entries without an explicit or profile TTL.
    pub default_absolute_expiration: Duration,
    /// Sliding timeout applied when nothing more specific is set.
    pub default_sliding_expiration: Option<Duration>,
    /// Prefix prepended to every cache key.
    pub key_prefix: String,
    /// Cache every SELECT/WITH statement, not only opted-in ones.
    pub cache_all_queries: bool,
    /// Tables skipped under `cache_all_queries`; stored lowercased.
    pub excluded_tables: HashSet<String>,
    /// Upper bound on admitted row count.
    pub max_rows_per_query: usize,
    /// Upper bound on entry size in bytes; 0 disables the bound.
    pub max_cache_entry_size: u64,
    /// Swallow store failures and let the query run against the database.
    pub fallback_to_database: bool,
    pub profiles: HashMap<String, CacheProfile>,
    pub on_event: Option<EventSink>,
    /// Health-check degradation threshold.
    pub minimum_hit_rate_percent: f64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            default_absolute_expiration: Duration::from_secs(30 * 60),
            default_sliding_expiration: None,
            key_prefix: "stash:".to_string(),
            cache_all_queries: false,
            excluded_tables: HashSet::new(),
            max_rows_per_query: 10_000,
            max_cache_entry_size: 0,
            fallback_to_database: true,
            profiles: HashMap::new(),
            on_event: None,
            minimum_hit_rate_percent: 0.0,
        }
    }
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("default_absolute_expiration", &self.default_absolute_expiration)
            .field("default_sliding_expiration", &self.default_sliding_expiration)
            .field("key_prefix", &self.key_prefix)
            .field("cache_all_queries", &self.cache_all_queries)
            .field("excluded_tables", &self.excluded_tables)
            .field("max_rows_per_query", &self.max_rows_per_query)
            .field("max_cache_entry_size", &self.max_cache_entry_size)
            .field("fallback_to_database", &self.fallback_to_database)
            .field("profiles", &self.profiles)
            .field("on_event", &self.on_event.is_some())
            .field("minimum_hit_rate_percent", &self.minimum_hit_rate_percent)
            .finish()
    }
}

impl CacheOptions {
    pub fn builder() -> CacheOptionsBuilder {
        CacheOptionsBuilder::default()
    }

    pub fn is_excluded(&self, table: &str) -> bool {
        self.excluded_tables.contains(&table.to_ascii_lowercase())
    }

    /// Resolve the expirations for a query from its directives.
    ///
    /// A registered profile wins over inline TTLs; anything unspecified
    /// falls back to the configured defaults.
    pub fn resolve_ttl(&self, directives: &Directives) -> (Duration, Option<Duration>) {
        if let Some(name) = &directives.profile {
            if let Some(profile) = self.profiles.get(name) {
                return (
                    profile.absolute.unwrap_or(self.default_absolute_expiration),
                    profile.sliding.or(self.default_sliding_expiration),
                );
            }
        }
        (
            directives.ttl.unwrap_or(self.default_absolute_expiration),
            directives.sliding.or(self.default_sliding_expiration),
        )
    }
}

/// Builder for [`CacheOptions`].
#[derive(Debug, Default)]
pub struct CacheOptionsBuilder {
    options: CacheOptions,
}

impl CacheOptionsBuilder {
    pub fn absolute_expiration(mut self, ttl: Duration) -> Self {
        self.options.default_absolute_expiration = ttl;
        self
    }

    pub fn sliding_expiration(mut self, window: Duration) -> Self {
        self.options.default_sliding_expiration = Some(window);
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.key_prefix = prefix.into();
        self
    }

    pub fn cache_all_queries(mut self, enabled: bool) -> Self {
        self.options.cache_all_queries = enabled;
        self
    }

    pub fn exclude_table(mut self, table: impl AsRef<str>) -> Self {
        self.options
            .excluded_tables
            .insert(table.as_ref().to_ascii_lowercase());
        self
    }

    pub fn max_rows_per_query(mut self, rows: usize) -> Self {
        self.options.max_rows_per_query = rows;
        self
    }

    pub fn max_cache_entry_size(mut self, bytes: u64) -> Self {
        self.options.max_cache_entry_size = bytes;
        self
    }

    pub fn fallback_to_database(mut self, enabled: bool) -> Self {
        self.options.fallback_to_database = enabled;
        self
    }

    pub fn profile(mut self, name: impl Into<String>, profile: CacheProfile) -> Self {
        self.options.profiles.insert(name.into(), profile);
        self
    }

    pub fn on_event(mut self, sink: EventSink) -> Self {
        self.options.on_event = Some(sink);
        self
    }

    pub fn minimum_hit_rate_percent(mut self, percent: f64) -> Self {
        self.options.minimum_hit_rate_percent = percent;
        self
    }

    pub fn build(self) -> CacheOptions {
        self.options
    }
}
