//! Cache events surfaced to operators through a configurable sink.

use std::sync::Arc;
use std::time::Duration;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    Hit,
    Miss,
    ResultCached,
    Invalidated,
    Error,
    SkippedTooManyRows,
    SkippedTooLarge,
    SkippedExcludedTable,
    FallbackToDatabase,
}

/// One cache event. Fields that do not apply to a given kind stay `None`.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub kind: CacheEventKind,
    pub key: Option<String>,
    pub tables: Option<Vec<String>>,
    pub row_count: Option<usize>,
    pub size_bytes: Option<u64>,
    pub ttl: Option<Duration>,
    pub duration: Option<Duration>,
    pub error: Option<String>,
}

impl CacheEvent {
    pub fn new(kind: CacheEventKind) -> Self {
        Self {
            kind,
            key: None,
            tables: None,
            row_count: None,
            size_bytes: None,
            ttl: None,
            duration: None,
            error: None,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn tables(mut self, tables: Vec<String>) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn row_count(mut self, rows: usize) -> Self {
        self.row_count = Some(rows);
        self
    }

    pub fn size_bytes(mut self, bytes: u64) -> Self {
        self.size_bytes = Some(bytes);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn duration(mut self, elapsed: Duration) -> Self {
        self.duration = Some(elapsed);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Callback receiving every emitted event.
pub type EventSink = Arc<dyn Fn(&CacheEvent) + Send + Sync>;
