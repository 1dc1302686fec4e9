// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Driver row normalization
//!
//! Every live backend turns its driver rows into the same [`Row`] shape. Cells
//! are classified by the runtime type name the driver reports, then decoded
//! without a compile-time type check; anything unrecognized falls back to text.

use serde_json::{Number, Value};
use sqlx::{Column, Decode, Row as _, TypeInfo, ValueRef};
use sqlgate_ir::Row;

/// Coarse storage class of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellKind {
    Bool,
    Integer,
    Float,
    Bytes,
    Text,
}

impl CellKind {
    /// Classify a driver type name such as `INT8`, `BIGINT UNSIGNED` or `REAL`
    pub(crate) fn from_type_name(name: &str) -> Self {
        let upper = name.to_ascii_uppercase();
        let base = upper.split(['(', ' ']).next().unwrap_or_default();

        match base {
            "BOOL" | "BOOLEAN" => CellKind::Bool,
            "INTEGER" | "INT" | "INT2" | "INT4" | "INT8" | "SMALLINT" | "BIGINT" | "TINYINT"
            | "MEDIUMINT" | "SERIAL" | "BIGSERIAL" => CellKind::Integer,
            "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" => CellKind::Float,
            "BLOB" | "BYTEA" | "BINARY" | "VARBINARY" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                CellKind::Bytes
            }
            _ => CellKind::Text,
        }
    }
}

/// Normalize one driver row
pub(crate) fn normalize_row<R>(row: &R) -> Row
where
    R: sqlx::Row,
    usize: sqlx::ColumnIndex<R>,
    for<'r> bool: Decode<'r, R::Database>,
    for<'r> i64: Decode<'r, R::Database>,
    for<'r> f64: Decode<'r, R::Database>,
    for<'r> String: Decode<'r, R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database>,
{
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| (column.name().to_string(), decode_cell(row, idx)))
        .collect()
}

fn decode_cell<R>(row: &R, idx: usize) -> Value
where
    R: sqlx::Row,
    usize: sqlx::ColumnIndex<R>,
    for<'r> bool: Decode<'r, R::Database>,
    for<'r> i64: Decode<'r, R::Database>,
    for<'r> f64: Decode<'r, R::Database>,
    for<'r> String: Decode<'r, R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database>,
{
    let kind = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => CellKind::from_type_name(raw.type_info().name()),
        Err(_) => return Value::Null,
    };

    let decoded = match kind {
        CellKind::Bool => row.try_get_unchecked::<bool, _>(idx).ok().map(Value::Bool),
        CellKind::Integer => row.try_get_unchecked::<i64, _>(idx).ok().map(Value::from),
        CellKind::Float => row
            .try_get_unchecked::<f64, _>(idx)
            .ok()
            .map(|f| Number::from_f64(f).map_or(Value::Null, Value::Number)),
        CellKind::Bytes => row
            .try_get_unchecked::<Vec<u8>, _>(idx)
            .ok()
            .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
        CellKind::Text => None,
    };

    decoded
        .or_else(|| row.try_get_unchecked::<String, _>(idx).ok().map(Value::String))
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_type_names() {
        assert_eq!(CellKind::from_type_name("INTEGER"), CellKind::Integer);
        assert_eq!(CellKind::from_type_name("int8"), CellKind::Integer);
        assert_eq!(CellKind::from_type_name("BIGINT UNSIGNED"), CellKind::Integer);
        assert_eq!(CellKind::from_type_name("FLOAT8"), CellKind::Float);
        assert_eq!(CellKind::from_type_name("BOOLEAN"), CellKind::Bool);
        assert_eq!(CellKind::from_type_name("BYTEA"), CellKind::Bytes);
        assert_eq!(CellKind::from_type_name("NUMERIC"), CellKind::Text);
        assert_eq!(CellKind::from_type_name("INTERVAL"), CellKind::Text);
        assert_eq!(CellKind::from_type_name("VARCHAR(20)"), CellKind::Text);
    }
}
