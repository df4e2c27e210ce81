//! Walk the caching pipeline by hand with an in-memory "driver".
//!
//! Run: `cargo run -p stash --example quickstart`

use std::sync::Arc;
use std::time::Duration;

use stash::{CacheOptions, ExecutedResult, Intercept, SecondLevelCache};
use stash_core::resultset::Column;
use stash_core::{CellValue, Command, ValueKind, VecRowReader};

fn products_reader() -> VecRowReader {
    let columns = vec![
        Column::new(0, "Id", "int4", ValueKind::Int32, false),
        Column::new(1, "Name", "text", ValueKind::String, true),
    ];
    let rows = vec![
        vec![CellValue::Int32(1), CellValue::Str("keyboard".into())],
        vec![CellValue::Int32(2), CellValue::Str("mouse".into())],
        vec![CellValue::Int32(3), CellValue::Null],
    ];
    VecRowReader::new(columns, rows)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cache = SecondLevelCache::builder()
        .options(
            CacheOptions::builder()
                .cache_all_queries(true)
                .absolute_expiration(Duration::from_secs(300))
                .on_event(Arc::new(|event: &stash_core::CacheEvent| {
                    println!("event: {event:?}");
                }))
                .build(),
        )
        .build();

    for attempt in 1..=2 {
        let cmd = Command::new("SELECT * FROM Products");
        let mut reader = match cache.interceptor().executing(&cmd, false).await? {
            Intercept::Hit(reader) => reader,
            Intercept::Continue => {
                // The "database" round trip.
                let live = products_reader();
                match cache.interceptor().executed(&cmd, live).await? {
                    ExecutedResult::Cached(reader) => reader,
                    ExecutedResult::Uncached(_) => unreachable!("query is cacheable"),
                }
            }
        };

        println!("attempt {attempt}:");
        while reader.read() {
            let id: i32 = reader.get(0)?;
            let name = if reader.is_null(1)? {
                "<null>".to_string()
            } else {
                reader.get::<String>(1)?
            };
            println!("  {id} {name}");
        }
    }

    println!(
        "hits={} misses={} bytes={}",
        cache.metrics().hits(),
        cache.metrics().misses(),
        cache.metrics().bytes_cached(),
    );
    Ok(())
}
