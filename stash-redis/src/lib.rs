//! Redis backend for the stash hybrid cache store.
//!
//! A minimal RESP client sized to what the cache needs: GET/SET with
//! expiry, DEL, native tag sets, and PING, behind a bounded connection
//! pool. Plug it into `HybridQueryCache` to get an L2 shared across
//! processes:
//!
//! ```rust,ignore
//! use stash_redis::{RedisBackend, RedisConfig};
//! use stash_store::HybridQueryCache;
//! use std::sync::Arc;
//!
//! let backend = RedisBackend::new(RedisConfig::new("127.0.0.1:6379"));
//! let store = HybridQueryCache::new(Arc::new(backend));
//! ```

pub mod backend;
pub mod error;
pub mod pool;
pub mod reply;
pub mod resp;
pub mod transport;

pub use backend::RedisBackend;
pub use error::{RedisError, RedisResult};
pub use pool::{RedisConfig, RedisPool};
pub use reply::Reply;
pub use transport::Connection;
