use chrono::{NaiveTime, TimeZone, Utc};

use crate::backend::{BackendRow, GenericColumnValue, RawValue, TypeCode};
use crate::error::{DriverError, ErrorCode};
use crate::types::Value;

use super::SubRows;

/// Convert a typed backend column into a caller-facing [`Value`].
///
/// NULL decodes to [`Value::Null`] for every supported type. A nested row sequence
/// decodes to a lazily iterated [`SubRows`] (an empty sequence is NULL).
///
/// # Errors
/// [`DriverError::Unsupported`] for type tags outside the supported set; a
/// `FailedPrecondition` backend error when the payload does not match its tag.
pub fn decode_value(col: &GenericColumnValue) -> Result<Value, DriverError> {
    if !is_supported(col.type_code) {
        return Err(DriverError::Unsupported);
    }
    if matches!(col.value, RawValue::Null) {
        return Ok(Value::Null);
    }
    match (col.type_code, &col.value) {
        (TypeCode::Bool, RawValue::Bool(b)) => Ok(Value::Bool(*b)),
        (TypeCode::Int64, RawValue::Int64(i)) => Ok(Value::Int(*i)),
        (TypeCode::Float64, RawValue::Float64(f)) => Ok(Value::Float(*f)),
        (TypeCode::Timestamp, RawValue::Timestamp(ts)) => Ok(Value::Timestamp(*ts)),
        (TypeCode::Date, RawValue::Date(date)) => Ok(Value::Timestamp(
            Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)),
        )),
        (TypeCode::String, RawValue::String(s)) => Ok(Value::Text(s.clone())),
        (TypeCode::Bytes, RawValue::Bytes(b)) => Ok(Value::Bytes(b.clone())),
        (TypeCode::Struct, RawValue::Rows(rows)) => {
            if rows.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Rows(SubRows::new(rows.clone())))
            }
        }
        (code, raw) => Err(DriverError::backend(
            ErrorCode::FailedPrecondition,
            format!("cannot decode {} payload as {code}", raw.kind()),
        )),
    }
}

/// Decode the first `dest.len()` columns of `row` into `dest`.
///
/// # Errors
/// Propagates out-of-range column and [`decode_value`] failures.
pub fn decode_row(row: &BackendRow, dest: &mut [Value]) -> Result<(), DriverError> {
    for (idx, slot) in dest.iter_mut().enumerate() {
        *slot = decode_value(row.column(idx)?)?;
    }
    Ok(())
}

fn is_supported(code: TypeCode) -> bool {
    matches!(
        code,
        TypeCode::Bool
            | TypeCode::Int64
            | TypeCode::Float64
            | TypeCode::Timestamp
            | TypeCode::Date
            | TypeCode::String
            | TypeCode::Bytes
            | TypeCode::Struct
    )
}
