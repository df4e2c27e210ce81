//! # Stash
//!
//! A transparent second-level query-result cache for ORMs that issue
//! parameterized SQL through an interceptable command pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ORM ──commands──► QueryCacheInterceptor ──► cache store ──► (local | hybrid L2)
//!  │                        │
//!  └──saves──► SaveInterceptor ──invalidate by table tag──┘
//! ```
//!
//! Reads opt in through `-- Stash:` directives (or cache-all mode); writes
//! invalidate every cached entry depending on the tables they touch. The
//! ORM only ever sees its usual streaming reader contract.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use stash::{CacheOptions, Intercept, SecondLevelCache};
//! use stash_core::Command;
//!
//! let cache = SecondLevelCache::builder()
//!     .options(CacheOptions::builder().cache_all_queries(true).build())
//!     .build();
//!
//! let cmd = Command::new("SELECT * FROM Products");
//! match cache.interceptor().executing(&cmd, false).await? {
//!     Intercept::Hit(reader) => { /* replay cached rows */ }
//!     Intercept::Continue => {
//!         let live = run_against_database(&cmd).await?;
//!         let rows = cache.interceptor().executed(&cmd, live).await?;
//!     }
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod interceptor;
pub mod invalidation;
pub mod orm;
pub mod save_interceptor;

pub use cache::{SecondLevelCache, SecondLevelCacheBuilder};
pub use config::{CacheOptions, CacheOptionsBuilder, CacheProfile};
pub use error::{CacheError, CacheResult};
pub use health::{CacheHealth, HealthStatus};
pub use interceptor::{ExecutedResult, Intercept, QueryCacheInterceptor, ScalarIntercept};
pub use invalidation::CacheInvalidator;
pub use orm::{ChangeEntry, EntityModel, EntityState, NavigationInfo, OrmSession};
pub use save_interceptor::SaveInterceptor;
