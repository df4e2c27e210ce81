//! In-memory remote backend, for development and tests.
//!
//! Emulates the backend contract the hybrid store expects: byte payloads,
//! absolute and sliding expiration, and native tag sets.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use crate::backend::RemoteCache;
use crate::error::StoreResult;

#[derive(Debug)]
struct MemoryEntry {
    bytes: Vec<u8>,
    deadline: Instant,
    sliding: Option<Duration>,
    last_access_ms: AtomicU64,
}

#[derive(Debug)]
pub struct InMemoryBackend {
    entries: DashMap<String, MemoryEntry>,
    tags: DashMap<String, DashSet<String>>,
    epoch: Instant,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            tags: DashMap::new(),
            epoch: Instant::now(),
        }
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

    fn expired(&self, entry: &MemoryEntry, now: Instant) -> bool {
        if now >= entry.deadline {
            return true;
        }
        if let Some(window) = entry.sliding {
            let last =
                self.epoch + Duration::from_millis(entry.last_access_ms.load(Ordering::Relaxed));
            if now.saturating_duration_since(last) > window {
                return true;
            }
        }
        false
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteCache for InMemoryBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let outcome = match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) => {
                if self.expired(&entry, now) {
                    None
                } else {
                    entry.last_access_ms.store(self.elapsed_ms(), Ordering::Relaxed);
                    Some(entry.bytes.clone())
                }
            }
        };
        if outcome.is_none() {
            self.entries.remove(key);
        }
        Ok(outcome)
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        absolute: Duration,
        sliding: Option<Duration>,
        tags: &[String],
    ) -> StoreResult<()> {
        let entry = MemoryEntry {
            bytes,
            deadline: Instant::now() + absolute,
            sliding,
            last_access_ms: AtomicU64::new(self.elapsed_ms()),
        };
        self.entries.insert(key.to_string(), entry);
        for tag in tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn remove_tag(&self, tag: &str) -> StoreResult<()> {
        if let Some((_, keys)) = self.tags.remove(tag) {
            for key in keys {
                self.entries.remove(&key);
            }
        }
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
