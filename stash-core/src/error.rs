//! Error types shared by the cache core.

use thiserror::Error;

use crate::value::ValueKind;

/// Core error type for capture, replay, and driver interop.
#[derive(Debug, Error)]
pub enum StashError {
    /// The underlying driver reported a failure while rows were being read.
    #[error("driver error: {0}")]
    Driver(String),

    /// A typed read was attempted against a null cell.
    #[error("cannot cast null cell to {target}")]
    NullCast { target: &'static str },

    /// A typed read could not convert the stored cell to the requested type.
    #[error("cannot cast {from} cell to {target}")]
    CellCast { from: ValueKind, target: &'static str },

    /// A numeric conversion would not fit the requested type.
    #[error("value of {from} cell does not fit in {target}")]
    NumericOverflow { from: ValueKind, target: &'static str },

    #[error("column ordinal {0} out of range")]
    OrdinalOutOfRange(usize),

    #[error("no column named '{0}'")]
    UnknownColumn(String),

    /// The reader has no current row (before first `read`, after the last
    /// row, or after `close`).
    #[error("no current row")]
    NoCurrentRow,
}

impl StashError {
    /// Wrap a driver-side failure.
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }
}

/// Errors produced by the result-set codec.
///
/// Callers treat any deserialization failure as a cache miss; nothing in the
/// codec panics on untrusted input.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The document could not be parsed at all, or carried an element type
    /// outside the whitelist.
    #[error("malformed result-set document: {0}")]
    Malformed(String),

    /// A row's cell count disagrees with the column schema.
    #[error("row {row} has {got} cells but the schema has {want} columns")]
    RowArity { row: usize, got: usize, want: usize },

    /// A column's recorded ordinal disagrees with its position.
    #[error("column '{name}' has ordinal {ordinal} but sits at position {position}")]
    ColumnOrdinal {
        name: String,
        ordinal: usize,
        position: usize,
    },

    /// A non-null cell's element type disagrees with its declared column.
    #[error("row {row}, column {column}: cell of {cell} does not match declared {declared}")]
    KindMismatch {
        row: usize,
        column: usize,
        cell: ValueKind,
        declared: ValueKind,
    },
}

/// Result alias for core operations.
pub type StashResult<T> = Result<T, StashError>;
