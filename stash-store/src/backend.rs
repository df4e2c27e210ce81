//! Remote-backend contract consumed by the hybrid store.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// A multi-tier external cache holding opaque entry bytes.
///
/// The backend owns stampede protection and tag-based removal; the hybrid
/// store only hands it serialized payloads, expirations, and tag names. A
/// `get` on a missing or expired key returns `None` and must not create or
/// write anything.
#[async_trait]
pub trait RemoteCache: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        absolute: Duration,
        sliding: Option<Duration>,
        tags: &[String],
    ) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Drop every key registered under `tag`, then the tag itself.
    async fn remove_tag(&self, tag: &str) -> StoreResult<()>;

    /// Cheap liveness probe.
    async fn ping(&self) -> StoreResult<()>;
}
