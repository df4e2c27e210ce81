//! Scalar cell values and the element-type whitelist.
//!
//! Every cell a cached result set may hold is one of the variants below.
//! The serde tag of each variant is its canonical identifier in the
//! persisted document, so deserializing an element type outside this
//! whitelist fails by construction.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StashError;

/// Canonical element kinds a cached cell may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    #[serde(rename = "boolean")]
    Bool,
    #[serde(rename = "int8")]
    Int8,
    #[serde(rename = "int16")]
    Int16,
    #[serde(rename = "int32")]
    Int32,
    #[serde(rename = "int64")]
    Int64,
    #[serde(rename = "uint8")]
    UInt8,
    #[serde(rename = "uint16")]
    UInt16,
    #[serde(rename = "uint32")]
    UInt32,
    #[serde(rename = "uint64")]
    UInt64,
    #[serde(rename = "float32")]
    Float32,
    #[serde(rename = "float64")]
    Float64,
    #[serde(rename = "decimal")]
    Decimal,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "char")]
    Char,
    #[serde(rename = "byte-array")]
    Bytes,
    #[serde(rename = "uuid")]
    Uuid,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "time")]
    Time,
    #[serde(rename = "date-time")]
    DateTime,
    #[serde(rename = "date-time-offset")]
    DateTimeOffset,
    #[serde(rename = "time-span")]
    TimeSpan,
}

impl ValueKind {
    /// Canonical identifier used in the persisted document.
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::Bool => "boolean",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Decimal => "decimal",
            Self::String => "string",
            Self::Char => "char",
            Self::Bytes => "byte-array",
            Self::Uuid => "uuid",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "date-time",
            Self::DateTimeOffset => "date-time-offset",
            Self::TimeSpan => "time-span",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// A single cell of a cached row.
///
/// `Null` is the language-neutral absent value; driver null sentinels are
/// never stored. `Decimal` keeps the driver's canonical text so arbitrary
/// precision survives a round trip. `TimeSpan` is signed microseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum CellValue {
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "boolean")]
    Bool(bool),
    #[serde(rename = "int8")]
    Int8(i8),
    #[serde(rename = "int16")]
    Int16(i16),
    #[serde(rename = "int32")]
    Int32(i32),
    #[serde(rename = "int64")]
    Int64(i64),
    #[serde(rename = "uint8")]
    UInt8(u8),
    #[serde(rename = "uint16")]
    UInt16(u16),
    #[serde(rename = "uint32")]
    UInt32(u32),
    #[serde(rename = "uint64")]
    UInt64(u64),
    #[serde(rename = "float32")]
    Float32(f32),
    #[serde(rename = "float64")]
    Float64(f64),
    #[serde(rename = "decimal")]
    Decimal(String),
    #[serde(rename = "string")]
    Str(String),
    #[serde(rename = "char")]
    Char(char),
    #[serde(rename = "byte-array")]
    Bytes(Vec<u8>),
    #[serde(rename = "uuid")]
    Uuid(Uuid),
    #[serde(rename = "date")]
    Date(NaiveDate),
    #[serde(rename = "time")]
    Time(NaiveTime),
    #[serde(rename = "date-time")]
    DateTime(NaiveDateTime),
    #[serde(rename = "date-time-offset")]
    DateTimeOffset(DateTime<FixedOffset>),
    #[serde(rename = "time-span")]
    TimeSpan(i64),
}

impl CellValue {
    /// Check if this cell is the absent value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Element kind of this cell. `Null` reports as `String`; callers that
    /// care about nullness check `is_null` first.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null | Self::Str(_) => ValueKind::String,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int8(_) => ValueKind::Int8,
            Self::Int16(_) => ValueKind::Int16,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::UInt8(_) => ValueKind::UInt8,
            Self::UInt16(_) => ValueKind::UInt16,
            Self::UInt32(_) => ValueKind::UInt32,
            Self::UInt64(_) => ValueKind::UInt64,
            Self::Float32(_) => ValueKind::Float32,
            Self::Float64(_) => ValueKind::Float64,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::Char(_) => ValueKind::Char,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Uuid(_) => ValueKind::Uuid,
            Self::Date(_) => ValueKind::Date,
            Self::Time(_) => ValueKind::Time,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::DateTimeOffset(_) => ValueKind::DateTimeOffset,
            Self::TimeSpan(_) => ValueKind::TimeSpan,
        }
    }

    /// Conservative per-cell byte estimate used for admission accounting.
    pub fn estimated_size(&self) -> u64 {
        match self {
            Self::Null => 0,
            Self::Bool(_) | Self::Int8(_) | Self::UInt8(_) => 1,
            Self::Int16(_) | Self::UInt16(_) | Self::Char(_) => 2,
            Self::Int32(_) | Self::UInt32(_) | Self::Float32(_) => 4,
            Self::Int64(_) | Self::UInt64(_) | Self::Float64(_) | Self::TimeSpan(_) => 8,
            Self::Date(_) | Self::Time(_) | Self::DateTime(_) => 12,
            Self::DateTimeOffset(_) | Self::Uuid(_) => 16,
            Self::Decimal(s) => 16 + s.len() as u64,
            Self::Str(s) => 2 * s.len() as u64 + 40,
            Self::Bytes(b) => b.len() as u64 + 24,
        }
    }

    /// Deterministic textual rendering used by the key generator.
    ///
    /// Null renders as the literal `NULL`; floats use the shortest
    /// round-trip form; temporals render RFC 3339; bytes render as hex.
    pub fn render(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Int8(v) => v.to_string(),
            Self::Int16(v) => v.to_string(),
            Self::Int32(v) => v.to_string(),
            Self::Int64(v) => v.to_string(),
            Self::UInt8(v) => v.to_string(),
            Self::UInt16(v) => v.to_string(),
            Self::UInt32(v) => v.to_string(),
            Self::UInt64(v) => v.to_string(),
            Self::Float32(v) => v.to_string(),
            Self::Float64(v) => v.to_string(),
            Self::Decimal(v) => v.clone(),
            Self::Str(v) => v.clone(),
            Self::Char(v) => v.to_string(),
            Self::Bytes(v) => hex::encode(v),
            Self::Uuid(v) => v.to_string(),
            Self::Date(v) => v.to_string(),
            Self::Time(v) => v.to_string(),
            Self::DateTime(v) => v.and_utc().to_rfc3339(),
            Self::DateTimeOffset(v) => v.to_rfc3339(),
            Self::TimeSpan(v) => format!("{v}us"),
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::Int8(v) => Some(v.into()),
            Self::Int16(v) => Some(v.into()),
            Self::Int32(v) => Some(v.into()),
            Self::Int64(v) => Some(v.into()),
            Self::UInt8(v) => Some(v.into()),
            Self::UInt16(v) => Some(v.into()),
            Self::UInt32(v) => Some(v.into()),
            Self::UInt64(v) => Some(v.into()),
            _ => None,
        }
    }
}

/// Typed extraction from a cell, with lossless integer widening and
/// range-checked narrowing between numeric kinds.
pub trait FromCell: Sized {
    fn from_cell(cell: &CellValue) -> Result<Self, StashError>;

    /// Name reported in cast errors.
    fn type_name() -> &'static str;
}

macro_rules! int_from_cell {
    ($ty:ty, $name:literal) => {
        impl FromCell for $ty {
            fn from_cell(cell: &CellValue) -> Result<Self, StashError> {
                if cell.is_null() {
                    return Err(StashError::NullCast { target: $name });
                }
                let wide = cell.as_i128().ok_or(StashError::CellCast {
                    from: cell.kind(),
                    target: $name,
                })?;
                <$ty>::try_from(wide).map_err(|_| StashError::NumericOverflow {
                    from: cell.kind(),
                    target: $name,
                })
            }

            fn type_name() -> &'static str {
                $name
            }
        }
    };
}

int_from_cell!(i8, "i8");
int_from_cell!(i16, "i16");
int_from_cell!(i32, "i32");
int_from_cell!(i64, "i64");
int_from_cell!(u8, "u8");
int_from_cell!(u16, "u16");
int_from_cell!(u32, "u32");
int_from_cell!(u64, "u64");

macro_rules! exact_from_cell {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl FromCell for $ty {
            fn from_cell(cell: &CellValue) -> Result<Self, StashError> {
                match cell {
                    CellValue::$variant(v) => Ok(v.clone()),
                    CellValue::Null => Err(StashError::NullCast { target: $name }),
                    other => Err(StashError::CellCast {
                        from: other.kind(),
                        target: $name,
                    }),
                }
            }

            fn type_name() -> &'static str {
                $name
            }
        }
    };
}

exact_from_cell!(bool, Bool, "bool");
exact_from_cell!(String, Str, "String");
exact_from_cell!(char, Char, "char");
exact_from_cell!(Vec<u8>, Bytes, "Vec<u8>");
exact_from_cell!(Uuid, Uuid, "Uuid");
exact_from_cell!(NaiveDate, Date, "NaiveDate");
exact_from_cell!(NaiveTime, Time, "NaiveTime");
exact_from_cell!(NaiveDateTime, DateTime, "NaiveDateTime");
exact_from_cell!(DateTime<FixedOffset>, DateTimeOffset, "DateTime<FixedOffset>");

impl FromCell for f64 {
    fn from_cell(cell: &CellValue) -> Result<Self, StashError> {
        match *cell {
            CellValue::Float64(v) => Ok(v),
            CellValue::Float32(v) => Ok(v.into()),
            CellValue::Null => Err(StashError::NullCast { target: "f64" }),
            ref other => match other.as_i128() {
                Some(wide) => Ok(wide as f64),
                None => Err(StashError::CellCast {
                    from: other.kind(),
                    target: "f64",
                }),
            },
        }
    }

    fn type_name() -> &'static str {
        "f64"
    }
}

impl FromCell for f32 {
    fn from_cell(cell: &CellValue) -> Result<Self, StashError> {
        match *cell {
            CellValue::Float32(v) => Ok(v),
            CellValue::Null => Err(StashError::NullCast { target: "f32" }),
            ref other => Err(StashError::CellCast {
                from: other.kind(),
                target: "f32",
            }),
        }
    }

    fn type_name() -> &'static str {
        "f32"
    }
}
