use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use super::RowIterator;
use crate::error::{DriverError, ErrorCode};

/// Declared type of a backend column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Bool,
    Int64,
    Float64,
    Timestamp,
    Date,
    String,
    Bytes,
    /// Sequence of nested rows
    Struct,
    Array,
    Numeric,
    Json,
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeCode::Bool => "BOOL",
            TypeCode::Int64 => "INT64",
            TypeCode::Float64 => "FLOAT64",
            TypeCode::Timestamp => "TIMESTAMP",
            TypeCode::Date => "DATE",
            TypeCode::String => "STRING",
            TypeCode::Bytes => "BYTES",
            TypeCode::Struct => "STRUCT",
            TypeCode::Array => "ARRAY",
            TypeCode::Numeric => "NUMERIC",
            TypeCode::Json => "JSON",
        };
        f.write_str(name)
    }
}

/// Payload of a backend column value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    String(String),
    Bytes(Vec<u8>),
    Rows(Vec<NullRow>),
}

impl RawValue {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            RawValue::Null => "NULL",
            RawValue::Bool(_) => "BOOL",
            RawValue::Int64(_) => "INT64",
            RawValue::Float64(_) => "FLOAT64",
            RawValue::Timestamp(_) => "TIMESTAMP",
            RawValue::Date(_) => "DATE",
            RawValue::String(_) => "STRING",
            RawValue::Bytes(_) => "BYTES",
            RawValue::Rows(_) => "ROWS",
        }
    }
}

/// A column value together with its declared type tag.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericColumnValue {
    pub type_code: TypeCode,
    pub value: RawValue,
}

impl GenericColumnValue {
    #[must_use]
    pub fn new(type_code: TypeCode, value: RawValue) -> Self {
        Self { type_code, value }
    }

    #[must_use]
    pub fn null(type_code: TypeCode) -> Self {
        Self::new(type_code, RawValue::Null)
    }
}

/// A row of typed columns as produced by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRow {
    columns: Arc<Vec<String>>,
    values: Vec<GenericColumnValue>,
}

impl BackendRow {
    #[must_use]
    pub fn new(columns: Arc<Vec<String>>, values: Vec<GenericColumnValue>) -> Self {
        Self { columns, values }
    }

    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Typed column by position.
    ///
    /// # Errors
    /// `InvalidArgument` when `idx` is out of range.
    pub fn column(&self, idx: usize) -> Result<&GenericColumnValue, DriverError> {
        self.values.get(idx).ok_or_else(|| {
            DriverError::backend(
                ErrorCode::InvalidArgument,
                format!("column index {idx} out of range [0, {})", self.values.len()),
            )
        })
    }
}

/// Entry of a nested row sequence; invalid entries are placeholders that carry no data.
#[derive(Debug, Clone, PartialEq)]
pub struct NullRow {
    pub valid: bool,
    pub row: BackendRow,
}

impl NullRow {
    #[must_use]
    pub fn valid(row: BackendRow) -> Self {
        Self { valid: true, row }
    }

    #[must_use]
    pub fn invalid() -> Self {
        Self {
            valid: false,
            row: BackendRow::new(Arc::new(Vec::new()), Vec::new()),
        }
    }
}

/// Row iterator over rows fetched up front.
#[derive(Debug, Default)]
pub struct BufferedRows {
    rows: VecDeque<BackendRow>,
    stopped: bool,
}

impl BufferedRows {
    #[must_use]
    pub fn new(rows: Vec<BackendRow>) -> Self {
        Self {
            rows: rows.into(),
            stopped: false,
        }
    }
}

impl RowIterator for BufferedRows {
    fn next_row(&mut self) -> Result<Option<BackendRow>, DriverError> {
        if self.stopped {
            return Ok(None);
        }
        Ok(self.rows.pop_front())
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: i64) -> BackendRow {
        BackendRow::new(
            Arc::new(vec!["v".to_string()]),
            vec![GenericColumnValue::new(TypeCode::Int64, RawValue::Int64(v))],
        )
    }

    #[test]
    fn column_out_of_range_is_invalid_argument() {
        let r = row(1);
        assert!(r.column(0).is_ok());
        let err = r.column(1).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn buffered_rows_yield_in_order_until_stopped() {
        let mut it = BufferedRows::new(vec![row(1), row(2), row(3)]);
        assert_eq!(it.next_row().unwrap(), Some(row(1)));
        it.stop();
        assert_eq!(it.next_row().unwrap(), None);
    }
}
