//! Row reader contracts: the driver-side streaming trait and the replay
//! reader that serves cached result sets through the same surface.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{StashError, StashResult};
use crate::resultset::{Column, ResultSet};
use crate::value::{CellValue, FromCell, ValueKind};

/// Forward-only row stream, as exposed by a database driver.
///
/// `read` advances to the next row and reports whether one is available;
/// the per-ordinal accessors address the current row. `column_schema` is the
/// rich metadata path; readers that cannot provide it fall back to the
/// per-field accessors.
#[async_trait]
pub trait RowReader: Send {
    fn field_count(&self) -> usize;

    fn name(&self, ordinal: usize) -> &str;

    fn data_type_name(&self, ordinal: usize) -> &str;

    fn kind(&self, ordinal: usize) -> ValueKind;

    fn nullable(&self, ordinal: usize) -> bool {
        let _ = ordinal;
        true
    }

    /// Rich column metadata, when the driver offers it.
    fn column_schema(&self) -> Option<Vec<Column>> {
        None
    }

    /// Advance to the next row.
    async fn read(&mut self) -> StashResult<bool>;

    fn is_null(&self, ordinal: usize) -> bool;

    /// Value of the current row at `ordinal`; `CellValue::Null` for nulls.
    fn value(&self, ordinal: usize) -> CellValue;

    /// Rows affected, when the driver reports it.
    fn records_affected(&self) -> Option<i32> {
        None
    }

    async fn close(&mut self) -> StashResult<()> {
        Ok(())
    }
}

/// Replay reader over an immutable, shared result set.
///
/// Each instance owns its cursor, so any number of readers can iterate the
/// same result set concurrently without locks and without affecting one
/// another.
#[derive(Debug, Clone)]
pub struct ResultSetReader {
    result: Arc<ResultSet>,
    /// Index of the current row; `None` before the first `read`.
    cursor: Option<usize>,
    exhausted: bool,
    closed: bool,
}

impl ResultSetReader {
    pub fn new(result: Arc<ResultSet>) -> Self {
        Self {
            result,
            cursor: None,
            exhausted: false,
            closed: false,
        }
    }

    /// Advance the cursor; returns whether a row is available.
    pub fn read(&mut self) -> bool {
        if self.closed || self.exhausted {
            return false;
        }
        let next = self.cursor.map_or(0, |c| c + 1);
        if next < self.result.rows.len() {
            self.cursor = Some(next);
            true
        } else {
            self.exhausted = true;
            false
        }
    }

    /// There is never a second result set behind a cached entry.
    pub fn next_result(&mut self) -> bool {
        false
    }

    pub fn field_count(&self) -> usize {
        self.result.columns.len()
    }

    pub fn has_rows(&self) -> bool {
        !self.result.rows.is_empty()
    }

    pub fn records_affected(&self) -> i32 {
        self.result.records_affected
    }

    /// Case-insensitive column lookup.
    pub fn ordinal(&self, name: &str) -> StashResult<usize> {
        self.result
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| StashError::UnknownColumn(name.to_string()))
    }

    pub fn column(&self, ordinal: usize) -> StashResult<&Column> {
        self.result
            .columns
            .get(ordinal)
            .ok_or(StashError::OrdinalOutOfRange(ordinal))
    }

    fn current_row(&self) -> StashResult<&[CellValue]> {
        if self.closed {
            return Err(StashError::NoCurrentRow);
        }
        let index = self.cursor.filter(|_| !self.exhausted);
        index
            .and_then(|i| self.result.rows.get(i))
            .map(Vec::as_slice)
            .ok_or(StashError::NoCurrentRow)
    }

    fn cell(&self, ordinal: usize) -> StashResult<&CellValue> {
        let row = self.current_row()?;
        row.get(ordinal).ok_or(StashError::OrdinalOutOfRange(ordinal))
    }

    /// Current cell value; `CellValue::Null` for stored nulls.
    pub fn value(&self, ordinal: usize) -> StashResult<CellValue> {
        self.cell(ordinal).cloned()
    }

    pub fn is_null(&self, ordinal: usize) -> StashResult<bool> {
        Ok(self.cell(ordinal)?.is_null())
    }

    /// Typed read of the current cell; exact when the stored element is
    /// already `T`, otherwise a checked numeric conversion. Null cells fail
    /// with a null-cast error.
    pub fn get<T: FromCell>(&self, ordinal: usize) -> StashResult<T> {
        T::from_cell(self.cell(ordinal)?)
    }

    /// Copy bytes of a byte-array cell starting at `data_offset` into `buf`;
    /// returns how many bytes were copied.
    pub fn get_bytes(
        &self,
        ordinal: usize,
        data_offset: usize,
        buf: &mut [u8],
    ) -> StashResult<usize> {
        let bytes: Vec<u8> = self.get(ordinal)?;
        let available = bytes.len().saturating_sub(data_offset);
        let n = available.min(buf.len());
        if n > 0 {
            buf[..n].copy_from_slice(&bytes[data_offset..data_offset + n]);
        }
        Ok(n)
    }

    /// Copy characters of a string cell starting at `data_offset` into
    /// `buf`; returns how many characters were copied.
    pub fn get_chars(
        &self,
        ordinal: usize,
        data_offset: usize,
        buf: &mut [char],
    ) -> StashResult<usize> {
        let text: String = self.get(ordinal)?;
        let mut n = 0;
        for (slot, ch) in buf.iter_mut().zip(text.chars().skip(data_offset)) {
            *slot = ch;
            n += 1;
        }
        Ok(n)
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// The shared result set behind this reader.
    pub fn result_set(&self) -> &Arc<ResultSet> {
        &self.result
    }
}

#[async_trait]
impl RowReader for ResultSetReader {
    fn field_count(&self) -> usize {
        ResultSetReader::field_count(self)
    }

    fn name(&self, ordinal: usize) -> &str {
        &self.result.columns[ordinal].name
    }

    fn data_type_name(&self, ordinal: usize) -> &str {
        &self.result.columns[ordinal].type_name
    }

    fn kind(&self, ordinal: usize) -> ValueKind {
        self.result.columns[ordinal].kind
    }

    fn nullable(&self, ordinal: usize) -> bool {
        self.result.columns[ordinal].nullable
    }

    fn column_schema(&self) -> Option<Vec<Column>> {
        Some(self.result.columns.clone())
    }

    async fn read(&mut self) -> StashResult<bool> {
        Ok(ResultSetReader::read(self))
    }

    fn is_null(&self, ordinal: usize) -> bool {
        self.cell(ordinal).map(CellValue::is_null).unwrap_or(true)
    }

    fn value(&self, ordinal: usize) -> CellValue {
        self.cell(ordinal).cloned().unwrap_or(CellValue::Null)
    }

    fn records_affected(&self) -> Option<i32> {
        Some(self.result.records_affected)
    }

    async fn close(&mut self) -> StashResult<()> {
        ResultSetReader::close(self);
        Ok(())
    }
}

/// In-memory reader over literal columns and rows. Useful for adapters that
/// already hold materialized rows, and for tests.
#[derive(Debug, Clone)]
pub struct VecRowReader {
    columns: Vec<Column>,
    rows: Vec<Vec<CellValue>>,
    cursor: Option<usize>,
    records_affected: Option<i32>,
    pub closed: bool,
}

impl VecRowReader {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            columns,
            rows,
            cursor: None,
            records_affected: None,
            closed: false,
        }
    }

    pub fn with_records_affected(mut self, n: i32) -> Self {
        self.records_affected = Some(n);
        self
    }

    fn current(&self) -> Option<&Vec<CellValue>> {
        self.cursor.and_then(|i| self.rows.get(i))
    }
}

#[async_trait]
impl RowReader for VecRowReader {
    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn name(&self, ordinal: usize) -> &str {
        &self.columns[ordinal].name
    }

    fn data_type_name(&self, ordinal: usize) -> &str {
        &self.columns[ordinal].type_name
    }

    fn kind(&self, ordinal: usize) -> ValueKind {
        self.columns[ordinal].kind
    }

    fn nullable(&self, ordinal: usize) -> bool {
        self.columns[ordinal].nullable
    }

    fn column_schema(&self) -> Option<Vec<Column>> {
        Some(self.columns.clone())
    }

    async fn read(&mut self) -> StashResult<bool> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next < self.rows.len() {
            self.cursor = Some(next);
            Ok(true)
        } else {
            self.cursor = Some(self.rows.len());
            Ok(false)
        }
    }

    fn is_null(&self, ordinal: usize) -> bool {
        self.current()
            .and_then(|r| r.get(ordinal))
            .map(CellValue::is_null)
            .unwrap_or(true)
    }

    fn value(&self, ordinal: usize) -> CellValue {
        self.current()
            .and_then(|r| r.get(ordinal))
            .cloned()
            .unwrap_or(CellValue::Null)
    }

    fn records_affected(&self) -> Option<i32> {
        self.records_affected
    }

    async fn close(&mut self) -> StashResult<()> {
        self.closed = true;
        Ok(())
    }
}
