use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Statement;
use rusqlite::types::ValueRef;

use crate::backend::{BackendRow, BoundStatement, BufferedRows, GenericColumnValue, RawValue, TypeCode};
use crate::error::{DriverError, ErrorCode};

use super::map_sqlite_error;
use super::params::bind_named;

/// Map a declared column type to a type tag, matched by substring like `SQLite` type affinity.
#[must_use]
pub fn declared_type_code(decl: &str) -> Option<TypeCode> {
    let upper = decl.to_ascii_uppercase();
    let has = |needle: &str| upper.contains(needle);
    let code = if has("BOOL") {
        TypeCode::Bool
    } else if has("TIMESTAMP") || has("DATETIME") {
        TypeCode::Timestamp
    } else if has("DATE") {
        TypeCode::Date
    } else if has("STRING") || has("TEXT") || has("CHAR") || has("CLOB") {
        TypeCode::String
    } else if has("INT") {
        TypeCode::Int64
    } else if has("FLOA") || has("REAL") || has("DOUB") {
        TypeCode::Float64
    } else if has("BYTES") || has("BLOB") {
        TypeCode::Bytes
    } else if has("NUMERIC") || has("DECIMAL") {
        TypeCode::Numeric
    } else if has("JSON") {
        TypeCode::Json
    } else {
        return None;
    };
    Some(code)
}

fn inferred_type_code(value: ValueRef<'_>) -> TypeCode {
    match value {
        ValueRef::Null | ValueRef::Text(_) => TypeCode::String,
        ValueRef::Integer(_) => TypeCode::Int64,
        ValueRef::Real(_) => TypeCode::Float64,
        ValueRef::Blob(_) => TypeCode::Bytes,
    }
}

fn text(bytes: &[u8]) -> Result<String, DriverError> {
    String::from_utf8(bytes.to_vec()).map_err(|err| {
        DriverError::backend(ErrorCode::FailedPrecondition, format!("invalid UTF-8 text: {err}"))
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Convert a stored value into a typed column value.
///
/// # Errors
/// `FailedPrecondition` when the stored value cannot represent the column's type.
pub fn column_value(
    declared: Option<TypeCode>,
    value: ValueRef<'_>,
) -> Result<GenericColumnValue, DriverError> {
    let code = declared.unwrap_or_else(|| inferred_type_code(value));
    let raw = match (code, value) {
        (_, ValueRef::Null) => RawValue::Null,
        (TypeCode::Bool, ValueRef::Integer(i)) => RawValue::Bool(i != 0),
        (TypeCode::Int64, ValueRef::Integer(i)) => RawValue::Int64(i),
        (TypeCode::Float64, ValueRef::Real(f)) => RawValue::Float64(f),
        #[allow(clippy::cast_precision_loss)]
        (TypeCode::Float64, ValueRef::Integer(i)) => RawValue::Float64(i as f64),
        (TypeCode::String | TypeCode::Json, ValueRef::Text(t)) => RawValue::String(text(t)?),
        (TypeCode::String | TypeCode::Numeric, ValueRef::Integer(i)) => {
            RawValue::String(i.to_string())
        }
        (TypeCode::String | TypeCode::Numeric, ValueRef::Real(f)) => RawValue::String(f.to_string()),
        (TypeCode::Numeric, ValueRef::Text(t)) => RawValue::String(text(t)?),
        (TypeCode::Bytes, ValueRef::Blob(b)) => RawValue::Bytes(b.to_vec()),
        (TypeCode::Bytes, ValueRef::Text(t)) => RawValue::Bytes(t.to_vec()),
        (TypeCode::Timestamp, ValueRef::Text(t)) => {
            let raw = text(t)?;
            RawValue::Timestamp(parse_timestamp(&raw).ok_or_else(|| mismatch(code, &raw))?)
        }
        (TypeCode::Timestamp, ValueRef::Integer(secs)) => RawValue::Timestamp(
            DateTime::from_timestamp(secs, 0).ok_or_else(|| mismatch(code, &secs.to_string()))?,
        ),
        (TypeCode::Date, ValueRef::Text(t)) => {
            let raw = text(t)?;
            // Dates bound as timestamps are stored as midnight RFC 3339 text.
            let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .ok()
                .or_else(|| parse_timestamp(&raw).map(|ts| ts.date_naive()));
            RawValue::Date(date.ok_or_else(|| mismatch(code, &raw))?)
        }
        (code, other) => return Err(mismatch(code, &format!("{:?}", other.data_type()))),
    };
    Ok(GenericColumnValue::new(code, raw))
}

fn mismatch(code: TypeCode, stored: &str) -> DriverError {
    DriverError::backend(
        ErrorCode::FailedPrecondition,
        format!("stored value {stored} cannot be read as {code}"),
    )
}

/// Bind `bound` to `stmt`, run it and buffer every row.
///
/// # Errors
/// Binding, stepping and conversion failures.
pub fn build_rows(
    stmt: &mut Statement<'_>,
    bound: &BoundStatement,
) -> Result<BufferedRows, DriverError> {
    let declared: Vec<Option<TypeCode>> = stmt
        .columns()
        .iter()
        .map(|col| col.decl_type().and_then(declared_type_code))
        .collect();
    let names: Arc<Vec<String>> = Arc::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    );

    bind_named(stmt, bound)?;
    let mut rows = stmt.raw_query();
    let mut buffered = Vec::new();
    while let Some(row) = rows.next().map_err(map_sqlite_error)? {
        let mut values = Vec::with_capacity(declared.len());
        for (idx, decl) in declared.iter().enumerate() {
            let value = row.get_ref(idx).map_err(map_sqlite_error)?;
            values.push(column_value(*decl, value)?);
        }
        buffered.push(BackendRow::new(Arc::clone(&names), values));
    }
    Ok(BufferedRows::new(buffered))
}

/// Bind `bound` to `stmt` and execute it, returning the affected row count.
///
/// # Errors
/// Binding and execution failures, including statements that return rows.
pub fn execute_update(
    stmt: &mut Statement<'_>,
    bound: &BoundStatement,
) -> Result<i64, DriverError> {
    bind_named(stmt, bound)?;
    let changed = stmt.raw_execute().map_err(map_sqlite_error)?;
    i64::try_from(changed).map_err(|_| {
        DriverError::backend(ErrorCode::Internal, format!("row count {changed} out of range"))
    })
}
