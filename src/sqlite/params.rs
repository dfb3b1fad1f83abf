use chrono::SecondsFormat;
use rusqlite::types::Value as SqlValue;

use crate::backend::BoundStatement;
use crate::error::{DriverError, ErrorCode};
use crate::types::Value;

use super::map_sqlite_error;

/// Convert a driver value into the `SQLite` value stored for it.
///
/// Booleans are stored as 0/1, timestamps as RFC 3339 text with nanoseconds in UTC.
///
/// # Errors
/// [`DriverError::Unsupported`] for nested row sequences, which cannot be bound.
pub fn value_to_sqlite(value: &Value) -> Result<SqlValue, DriverError> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Bytes(bytes) => SqlValue::Blob(bytes.clone()),
        Value::Timestamp(ts) => SqlValue::Text(ts.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        Value::Rows(_) => return Err(DriverError::Unsupported),
    })
}

/// Bind the named parameters of `bound` to `stmt`.
///
/// Parameter names are matched without their `@`/`:`/`$` prefix.
///
/// # Errors
/// `InvalidArgument` when the statement references a parameter `bound` has no value for.
pub fn bind_named(
    stmt: &mut rusqlite::Statement<'_>,
    bound: &BoundStatement,
) -> Result<(), DriverError> {
    for idx in 1..=stmt.parameter_count() {
        let name = stmt
            .parameter_name(idx)
            .map(|name| name.trim_start_matches(['@', ':', '$']).to_string());
        let value = name
            .as_deref()
            .and_then(|name| bound.params.get(name))
            .ok_or_else(|| {
                DriverError::backend(
                    ErrorCode::InvalidArgument,
                    format!(
                        "no value supplied for SQL parameter {}",
                        name.as_deref().map_or_else(|| format!("?{idx}"), |n| format!("@{n}"))
                    ),
                )
            })?;
        stmt.raw_bind_parameter(idx, value_to_sqlite(value)?)
            .map_err(map_sqlite_error)?;
    }
    Ok(())
}
