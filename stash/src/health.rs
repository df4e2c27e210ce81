//! Health probe over the cache store and its observed hit rate.

use std::sync::Arc;

use uuid::Uuid;

use stash_core::CacheMetrics;
use stash_store::QueryCacheStore;

/// Probe verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy { note: Option<String> },
    Degraded {
        hit_rate_percent: f64,
        minimum_percent: f64,
    },
    Unhealthy { reason: String },
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

/// Probes the store with a key that cannot exist, then grades the hit rate
/// against the configured threshold.
pub struct CacheHealth {
    store: Arc<dyn QueryCacheStore>,
    metrics: Arc<CacheMetrics>,
    minimum_hit_rate_percent: f64,
}

impl CacheHealth {
    pub fn new(
        store: Arc<dyn QueryCacheStore>,
        metrics: Arc<CacheMetrics>,
        minimum_hit_rate_percent: f64,
    ) -> Self {
        Self {
            store,
            metrics,
            minimum_hit_rate_percent,
        }
    }

    pub async fn check(&self) -> HealthStatus {
        let probe_key = format!("stash:health:{}", Uuid::new_v4());
        if let Err(e) = self.store.get(&probe_key).await {
            return HealthStatus::Unhealthy {
                reason: e.to_string(),
            };
        }

        if self.metrics.requests() == 0 {
            return HealthStatus::Healthy {
                note: Some("no queries observed yet".to_string()),
            };
        }

        let rate = self.metrics.hit_rate_percent();
        if rate >= self.minimum_hit_rate_percent {
            HealthStatus::Healthy { note: None }
        } else {
            HealthStatus::Degraded {
                hit_rate_percent: rate,
                minimum_percent: self.minimum_hit_rate_percent,
            }
        }
    }
}
