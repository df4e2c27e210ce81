//! Core model for the stash second-level query cache.
//!
//! This crate holds everything the cache pipeline reasons about that is not
//! a store or an interceptor: the whitelisted scalar cell model, the
//! immutable result-set with its capture and size estimation, the replay
//! reader, the deterministic key generator, the shallow SQL table extractor,
//! the directive parser, and the shared metrics and event types.
//!
//! ```text
//! driver reader ──capture──► ResultSet ──codec──► bytes
//!                               │
//!                               └──► ResultSetReader (replay, per-cursor)
//! ```

pub mod codec;
pub mod command;
pub mod directive;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod metrics;
pub mod reader;
pub mod resultset;
pub mod sql;
pub mod value;

pub use command::{Command, CommandParameter};
pub use error::{CodecError, StashError, StashResult};
pub use events::{CacheEvent, CacheEventKind, EventSink};
pub use fingerprint::KeyGenerator;
pub use metrics::CacheMetrics;
pub use reader::{ResultSetReader, RowReader, VecRowReader};
pub use resultset::{Captured, Column, ResultSet};
pub use value::{CellValue, FromCell, ValueKind};
