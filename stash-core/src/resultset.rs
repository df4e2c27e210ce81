//! In-memory result-set model: column schema, row matrix, and capture from a
//! live reader.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StashResult;
use crate::reader::RowReader;
use crate::value::{CellValue, ValueKind};

const COLUMN_OVERHEAD: u64 = 40;
const ROW_OVERHEAD: u64 = 8;
const CELL_REF_OVERHEAD: u64 = 8;

/// One column of a captured result set. `ordinal` always equals the
/// column's position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub ordinal: usize,
    pub name: String,
    /// Driver-reported type name, kept verbatim for replay.
    pub type_name: String,
    pub kind: ValueKind,
    pub nullable: bool,
}

impl Column {
    pub fn new(
        ordinal: usize,
        name: impl Into<String>,
        type_name: impl Into<String>,
        kind: ValueKind,
        nullable: bool,
    ) -> Self {
        Self {
            ordinal,
            name: name.into(),
            type_name: type_name.into(),
            kind,
            nullable,
        }
    }

    fn estimated_size(&self) -> u64 {
        COLUMN_OVERHEAD + 2 * (self.name.len() as u64 + self.type_name.len() as u64)
    }
}

/// An immutable, materialized row set.
///
/// Rows are filled exactly once during capture; afterwards the set is shared
/// between the store and any number of replay readers. `size_bytes` is a
/// conservative estimate used only for admission decisions, never for exact
/// memory accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<CellValue>>,
    /// Driver-reported affected-row count; -1 when unknown.
    pub records_affected: i32,
    pub size_bytes: u64,
    pub captured_at: DateTime<Utc>,
}

/// Outcome of draining a live reader.
#[derive(Debug)]
pub enum Captured {
    Complete(ResultSet),
    /// The row limit was hit. The carried set holds the rows drained before
    /// the drain stopped; it is replayed to the caller but never cached.
    RowLimitExceeded(ResultSet),
}

impl ResultSet {
    /// Build a set from already-materialized parts, computing the size
    /// estimate.
    pub fn from_parts(
        columns: Vec<Column>,
        rows: Vec<Vec<CellValue>>,
        records_affected: i32,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let mut size: u64 = columns.iter().map(Column::estimated_size).sum();
        for row in &rows {
            size += ROW_OVERHEAD + CELL_REF_OVERHEAD * row.len() as u64;
            size += row.iter().map(CellValue::estimated_size).sum::<u64>();
        }
        Self {
            columns,
            rows,
            records_affected,
            size_bytes: size,
            captured_at,
        }
    }

    /// An empty set with no columns.
    pub fn empty() -> Self {
        Self::from_parts(Vec::new(), Vec::new(), -1, Utc::now())
    }

    /// Model a scalar result as a one-column, one-row set.
    pub fn single_value(value: CellValue) -> Self {
        let kind = if value.is_null() {
            ValueKind::String
        } else {
            value.kind()
        };
        let column = Column::new(0, "value", kind.identifier(), kind, true);
        Self::from_parts(vec![column], vec![vec![value]], -1, Utc::now())
    }

    /// Drain a live reader into a result set, stopping once more than
    /// `max_rows` rows have been read.
    ///
    /// The schema comes from the reader's rich metadata when available and
    /// from the per-field accessors otherwise. The reader is closed on every
    /// exit path, including read errors.
    pub async fn capture<R: RowReader + ?Sized>(
        reader: &mut R,
        max_rows: usize,
    ) -> StashResult<Captured> {
        let columns = match reader.column_schema() {
            Some(schema) => schema,
            None => (0..reader.field_count())
                .map(|i| {
                    Column::new(
                        i,
                        reader.name(i),
                        reader.data_type_name(i),
                        reader.kind(i),
                        reader.nullable(i),
                    )
                })
                .collect(),
        };
        let field_count = columns.len();

        let mut rows: Vec<Vec<CellValue>> = Vec::new();
        let mut overflowed = false;
        loop {
            let advanced = match reader.read().await {
                Ok(advanced) => advanced,
                Err(e) => {
                    let _ = reader.close().await;
                    return Err(e);
                }
            };
            if !advanced {
                break;
            }
            let mut row = Vec::with_capacity(field_count);
            for i in 0..field_count {
                if reader.is_null(i) {
                    row.push(CellValue::Null);
                } else {
                    row.push(reader.value(i));
                }
            }
            rows.push(row);
            if rows.len() > max_rows {
                overflowed = true;
                break;
            }
        }

        let records_affected = reader.records_affected().unwrap_or(-1);
        reader.close().await?;

        let set = Self::from_parts(columns, rows, records_affected, Utc::now());
        if overflowed {
            Ok(Captured::RowLimitExceeded(set))
        } else {
            Ok(Captured::Complete(set))
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::VecRowReader;

    fn columns() -> Vec<Column> {
        vec![
            Column::new(0, "id", "int4", ValueKind::Int32, false),
            Column::new(1, "name", "text", ValueKind::String, true),
        ]
    }

    fn rows(n: usize) -> Vec<Vec<CellValue>> {
        (0..n)
            .map(|i| {
                vec![
                    CellValue::Int32(i as i32),
                    CellValue::Str(format!("row-{i}")),
                ]
            })
            .collect()
    }

    #[tokio::test]
    async fn test_capture_complete() {
        let mut reader = VecRowReader::new(columns(), rows(3)).with_records_affected(3);
        let captured = ResultSet::capture(&mut reader, 100).await.unwrap();
        let set = match captured {
            Captured::Complete(set) => set,
            Captured::RowLimitExceeded(_) => panic!("unexpected overflow"),
        };
        assert_eq!(set.row_count(), 3);
        assert_eq!(set.records_affected, 3);
        assert!(reader.closed);
    }

    #[tokio::test]
    async fn test_capture_empty_set() {
        let mut reader = VecRowReader::new(columns(), Vec::new());
        let captured = ResultSet::capture(&mut reader, 10).await.unwrap();
        match captured {
            Captured::Complete(set) => {
                assert_eq!(set.row_count(), 0);
                assert_eq!(set.records_affected, -1);
                assert_eq!(set.column_count(), 2);
            }
            Captured::RowLimitExceeded(_) => panic!("unexpected overflow"),
        }
    }

    #[tokio::test]
    async fn test_capture_row_limit() {
        let mut reader = VecRowReader::new(columns(), rows(5));
        let captured = ResultSet::capture(&mut reader, 2).await.unwrap();
        match captured {
            Captured::RowLimitExceeded(partial) => {
                assert_eq!(partial.row_count(), 3);
            }
            Captured::Complete(_) => panic!("expected overflow"),
        }
        assert!(reader.closed);
    }

    #[tokio::test]
    async fn test_capture_stores_neutral_null() {
        let cols = columns();
        let mut reader = VecRowReader::new(
            cols,
            vec![vec![CellValue::Int32(1), CellValue::Null]],
        );
        let captured = ResultSet::capture(&mut reader, 10).await.unwrap();
        if let Captured::Complete(set) = captured {
            assert_eq!(set.rows[0][1], CellValue::Null);
        } else {
            panic!("expected complete capture");
        }
    }

    /// Reader without the rich schema API; capture must fall back to the
    /// per-field accessors.
    struct BareReader {
        inner: VecRowReader,
    }

    #[async_trait::async_trait]
    impl RowReader for BareReader {
        fn field_count(&self) -> usize {
            RowReader::field_count(&self.inner)
        }

        fn name(&self, ordinal: usize) -> &str {
            RowReader::name(&self.inner, ordinal)
        }

        fn data_type_name(&self, ordinal: usize) -> &str {
            RowReader::data_type_name(&self.inner, ordinal)
        }

        fn kind(&self, ordinal: usize) -> ValueKind {
            RowReader::kind(&self.inner, ordinal)
        }

        fn nullable(&self, ordinal: usize) -> bool {
            RowReader::nullable(&self.inner, ordinal)
        }

        async fn read(&mut self) -> crate::error::StashResult<bool> {
            self.inner.read().await
        }

        fn is_null(&self, ordinal: usize) -> bool {
            RowReader::is_null(&self.inner, ordinal)
        }

        fn value(&self, ordinal: usize) -> CellValue {
            RowReader::value(&self.inner, ordinal)
        }

        async fn close(&mut self) -> crate::error::StashResult<()> {
            self.inner.close().await
        }
    }

    #[tokio::test]
    async fn test_capture_without_rich_schema() {
        let mut reader = BareReader {
            inner: VecRowReader::new(columns(), rows(2)),
        };
        let captured = ResultSet::capture(&mut reader, 10).await.unwrap();
        match captured {
            Captured::Complete(set) => {
                assert_eq!(set.columns, columns());
                assert_eq!(set.row_count(), 2);
            }
            Captured::RowLimitExceeded(_) => panic!("unexpected overflow"),
        }
    }

    #[test]
    fn test_size_estimate_grows_with_rows() {
        let small = ResultSet::from_parts(columns(), rows(1), -1, Utc::now());
        let large = ResultSet::from_parts(columns(), rows(10), -1, Utc::now());
        assert!(large.size_bytes > small.size_bytes);

        // Schema overhead alone for two columns.
        let empty = ResultSet::from_parts(columns(), Vec::new(), -1, Utc::now());
        assert_eq!(empty.size_bytes, 40 + 2 * (2 + 4) + 40 + 2 * (4 + 4));
    }

    #[test]
    fn test_single_value_shape() {
        let set = ResultSet::single_value(CellValue::Int64(9));
        assert_eq!(set.column_count(), 1);
        assert_eq!(set.row_count(), 1);
        assert_eq!(set.rows[0][0], CellValue::Int64(9));

        let null = ResultSet::single_value(CellValue::Null);
        assert!(null.rows[0][0].is_null());
    }
}
