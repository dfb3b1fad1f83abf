use std::fmt;
use std::sync::Arc;

use crate::backend::{BackendRow, NullRow, RowIterator};
use crate::error::DriverError;
use crate::types::Value;

use super::ResultRows;
use super::codec::decode_row;

/// Cursor returned by a query.
///
/// Holds either the lookahead row fetched while opening the cursor or the live backend
/// iterator; both empty means the cursor is exhausted.
pub struct Rows {
    columns: Arc<Vec<String>>,
    lookahead: Option<BackendRow>,
    iter: Option<Box<dyn RowIterator>>,
}

impl Rows {
    /// A cursor with no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            columns: Arc::new(Vec::new()),
            lookahead: None,
            iter: None,
        }
    }

    pub(crate) fn with_lookahead(first: BackendRow, iter: Box<dyn RowIterator>) -> Self {
        Self {
            columns: Arc::clone(first.column_names()),
            lookahead: Some(first),
            iter: Some(iter),
        }
    }

    /// Open a cursor over `iter`, fetching one row up front so an empty result and a failing
    /// query are told apart before the cursor is handed out.
    ///
    /// # Errors
    /// The backend error raised while fetching the first row; the iterator is stopped.
    pub fn open(mut iter: Box<dyn RowIterator>) -> Result<Self, DriverError> {
        match iter.next_row() {
            Ok(Some(first)) => Ok(Self::with_lookahead(first, iter)),
            Ok(None) => {
                iter.stop();
                Ok(Self::empty())
            }
            Err(err) => {
                iter.stop();
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col == column_name)
    }

    fn fetch(&mut self) -> Result<Option<BackendRow>, DriverError> {
        if let Some(row) = self.lookahead.take() {
            return Ok(Some(row));
        }
        let Some(iter) = self.iter.as_mut() else {
            return Ok(None);
        };
        match iter.next_row() {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.release();
                Ok(None)
            }
            Err(err) => {
                self.release();
                Err(err)
            }
        }
    }

    fn release(&mut self) {
        self.lookahead = None;
        if let Some(mut iter) = self.iter.take() {
            iter.stop();
        }
    }
}

impl ResultRows for Rows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_into(&mut self, dest: &mut [Value]) -> Result<bool, DriverError> {
        match self.fetch()? {
            Some(row) => {
                decode_row(&row, dest)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.release();
        Ok(())
    }
}

impl Iterator for Rows {
    type Item = Result<Vec<Value>, DriverError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

impl Drop for Rows {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Rows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("columns", &self.columns)
            .field("has_lookahead", &self.lookahead.is_some())
            .field("live", &self.iter.is_some())
            .finish()
    }
}

/// Cursor over a nested row sequence. Placeholder (invalid) entries are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct SubRows {
    columns: Arc<Vec<String>>,
    index: usize,
    rows: Vec<NullRow>,
}

impl SubRows {
    pub(crate) fn new(rows: Vec<NullRow>) -> Self {
        let columns = rows
            .iter()
            .find(|entry| entry.valid)
            .or_else(|| rows.first())
            .map(|entry| Arc::clone(entry.row.column_names()))
            .unwrap_or_default();
        Self {
            columns,
            index: 0,
            rows,
        }
    }
}

impl ResultRows for SubRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_into(&mut self, dest: &mut [Value]) -> Result<bool, DriverError> {
        while let Some(entry) = self.rows.get(self.index) {
            self.index += 1;
            if entry.valid {
                decode_row(&entry.row, dest)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.index = self.rows.len();
        Ok(())
    }
}

impl Iterator for SubRows {
    type Item = Result<Vec<Value>, DriverError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BufferedRows, GenericColumnValue, RawValue, TypeCode};
    use crate::error::ErrorCode;

    fn row(v: i64) -> BackendRow {
        BackendRow::new(
            Arc::new(vec!["f1".to_string()]),
            vec![GenericColumnValue::new(TypeCode::Int64, RawValue::Int64(v))],
        )
    }

    struct FailingAfterFirst {
        sent: bool,
    }

    impl RowIterator for FailingAfterFirst {
        fn next_row(&mut self) -> Result<Option<BackendRow>, DriverError> {
            if self.sent {
                return Err(DriverError::backend(ErrorCode::Internal, "stream broke"));
            }
            self.sent = true;
            Ok(Some(row(1)))
        }
    }

    #[test]
    fn open_on_empty_iterator_yields_exhausted_cursor() {
        let mut rows = Rows::open(Box::new(BufferedRows::new(vec![]))).unwrap();
        assert!(rows.columns().is_empty());
        assert!(rows.next_row().unwrap().is_none());
    }

    #[test]
    fn lookahead_row_comes_first() {
        let rows = Rows::open(Box::new(BufferedRows::new(vec![row(1), row(2)]))).unwrap();
        assert_eq!(rows.columns(), ["f1"]);
        assert_eq!(rows.column_index("f1"), Some(0));
        let all: Vec<Vec<Value>> = rows.collect::<Result<_, _>>().unwrap();
        assert_eq!(all, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
    }

    #[test]
    fn close_before_done_leaves_cursor_exhausted() {
        let mut rows = Rows::open(Box::new(BufferedRows::new(vec![row(1), row(2)]))).unwrap();
        rows.close().unwrap();
        let mut dest = vec![Value::Null];
        assert!(!rows.next_into(&mut dest).unwrap());
        assert!(!rows.next_into(&mut dest).unwrap());
        rows.close().unwrap();
    }

    #[test]
    fn stream_errors_surface_and_exhaust() {
        let mut rows = Rows::open(Box::new(FailingAfterFirst { sent: false })).unwrap();
        assert_eq!(rows.next_row().unwrap(), Some(vec![Value::Int(1)]));
        assert_eq!(rows.next_row().unwrap_err().code(), ErrorCode::Internal);
        assert!(rows.next_row().unwrap().is_none());
    }

    #[test]
    fn sub_rows_take_columns_from_first_valid_row() {
        let sub = SubRows::new(vec![NullRow::invalid(), NullRow::valid(row(5))]);
        assert_eq!(sub.columns(), ["f1"]);
        let values: Vec<Vec<Value>> = sub.collect::<Result<_, _>>().unwrap();
        assert_eq!(values, vec![vec![Value::Int(5)]]);
    }
}
