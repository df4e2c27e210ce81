//! Result-set codec: a self-describing document for the hybrid store.
//!
//! The document carries the column schema, the row matrix as tagged scalars,
//! and the capture metadata. Deserialization is strict: any element type
//! outside the whitelist, any truncated or malformed payload, and any
//! schema/row disagreement is reported as corruption, which callers treat as
//! a cache miss.

use crate::error::CodecError;
use crate::resultset::ResultSet;

/// Serialize a result set to document bytes.
///
/// For a set built from whitelisted scalars this cannot fail in practice;
/// an error here escapes to the caller rather than being swallowed.
pub fn serialize(set: &ResultSet) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(set).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Deserialize document bytes back into a result set.
pub fn deserialize(bytes: &[u8]) -> Result<ResultSet, CodecError> {
    let set: ResultSet =
        serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?;
    validate(&set)?;
    Ok(set)
}

/// Structural checks beyond what the type system already enforces.
fn validate(set: &ResultSet) -> Result<(), CodecError> {
    for (position, column) in set.columns.iter().enumerate() {
        if column.ordinal != position {
            return Err(CodecError::ColumnOrdinal {
                name: column.name.clone(),
                ordinal: column.ordinal,
                position,
            });
        }
    }
    let want = set.columns.len();
    for (row_index, row) in set.rows.iter().enumerate() {
        if row.len() != want {
            return Err(CodecError::RowArity {
                row: row_index,
                got: row.len(),
                want,
            });
        }
        for (column_index, cell) in row.iter().enumerate() {
            if cell.is_null() {
                continue;
            }
            let declared = set.columns[column_index].kind;
            if cell.kind() != declared {
                return Err(CodecError::KindMismatch {
                    row: row_index,
                    column: column_index,
                    cell: cell.kind(),
                    declared,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resultset::Column;
    use crate::value::{CellValue, ValueKind};
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
    use uuid::Uuid;

    fn every_kind_set() -> ResultSet {
        let specs: Vec<(ValueKind, CellValue)> = vec![
            (ValueKind::Bool, CellValue::Bool(true)),
            (ValueKind::Int8, CellValue::Int8(-8)),
            (ValueKind::Int16, CellValue::Int16(-16)),
            (ValueKind::Int32, CellValue::Int32(-32)),
            (ValueKind::Int64, CellValue::Int64(-64)),
            (ValueKind::UInt8, CellValue::UInt8(8)),
            (ValueKind::UInt16, CellValue::UInt16(16)),
            (ValueKind::UInt32, CellValue::UInt32(32)),
            (ValueKind::UInt64, CellValue::UInt64(64)),
            (ValueKind::Float32, CellValue::Float32(1.25)),
            (ValueKind::Float64, CellValue::Float64(-2.5)),
            (
                ValueKind::Decimal,
                CellValue::Decimal("79228162514264337593543950335".into()),
            ),
            (ValueKind::String, CellValue::Str("text".into())),
            (ValueKind::Char, CellValue::Char('q')),
            (ValueKind::Bytes, CellValue::Bytes(vec![0, 1, 254, 255])),
            (
                ValueKind::Uuid,
                CellValue::Uuid(Uuid::parse_str("6d1cf3d5-6ba6-4a5c-9c34-2d5163ab3a57").unwrap()),
            ),
            (
                ValueKind::Date,
                CellValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
            ),
            (
                ValueKind::Time,
                CellValue::Time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap()),
            ),
            (
                ValueKind::DateTime,
                CellValue::DateTime(
                    NaiveDate::from_ymd_opt(2020, 1, 2)
                        .unwrap()
                        .and_hms_opt(3, 4, 5)
                        .unwrap(),
                ),
            ),
            (
                ValueKind::DateTimeOffset,
                CellValue::DateTimeOffset(
                    DateTime::<FixedOffset>::parse_from_rfc3339("2021-06-01T10:00:00+05:30")
                        .unwrap(),
                ),
            ),
            (ValueKind::TimeSpan, CellValue::TimeSpan(-12_345_678)),
        ];

        let columns: Vec<Column> = specs
            .iter()
            .enumerate()
            .map(|(i, (kind, _))| {
                Column::new(i, format!("c{i}"), kind.identifier(), *kind, true)
            })
            .collect();
        let full_row: Vec<CellValue> = specs.into_iter().map(|(_, cell)| cell).collect();
        let null_row: Vec<CellValue> = full_row.iter().map(|_| CellValue::Null).collect();

        ResultSet::from_parts(columns, vec![full_row, null_row], 2, Utc::now())
    }

    #[test]
    fn test_round_trip_every_kind() {
        let set = every_kind_set();
        let bytes = serialize(&set).unwrap();
        let back = deserialize(&bytes).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_round_trip_empty_set() {
        let set = ResultSet::empty();
        let back = deserialize(&serialize(&set).unwrap()).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_null_cells_stay_null() {
        let set = ResultSet::single_value(CellValue::Null);
        let back = deserialize(&serialize(&set).unwrap()).unwrap();
        assert!(back.rows[0][0].is_null());
    }

    #[test]
    fn test_truncated_payload_is_corrupt() {
        let bytes = serialize(&every_kind_set()).unwrap();
        let err = deserialize(&bytes[..bytes.len() / 2]);
        assert!(matches!(err, Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_garbage_payload_is_corrupt() {
        assert!(deserialize(b"not a document").is_err());
        assert!(deserialize(b"").is_err());
    }

    #[test]
    fn test_unknown_element_type_is_corrupt() {
        let bytes = serialize(&every_kind_set()).unwrap();
        let poisoned = String::from_utf8(bytes)
            .unwrap()
            .replace("\"int32\"", "\"object-graph\"");
        assert!(deserialize(poisoned.as_bytes()).is_err());
    }

    #[test]
    fn test_row_arity_mismatch_is_corrupt() {
        let mut set = every_kind_set();
        set.rows[0].pop();
        let bytes = serde_json::to_vec(&set).unwrap();
        assert!(matches!(
            deserialize(&bytes),
            Err(CodecError::RowArity { row: 0, .. })
        ));
    }

    #[test]
    fn test_kind_mismatch_is_corrupt() {
        let mut set = every_kind_set();
        set.rows[0][0] = CellValue::Str("not a bool".into());
        let bytes = serde_json::to_vec(&set).unwrap();
        assert!(matches!(
            deserialize(&bytes),
            Err(CodecError::KindMismatch { row: 0, column: 0, .. })
        ));
    }

    #[test]
    fn test_column_ordinal_mismatch_is_corrupt() {
        let mut set = every_kind_set();
        set.columns[3].ordinal = 9;
        let bytes = serde_json::to_vec(&set).unwrap();
        assert!(matches!(
            deserialize(&bytes),
            Err(CodecError::ColumnOrdinal { .. })
        ));
    }
}
