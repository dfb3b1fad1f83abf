//! Query results: row cursors, nested row sequences, exec outcomes and the value codec.

mod codec;
mod exec;
mod rows;

pub use codec::{decode_row, decode_value};
pub use exec::ExecResult;
pub use rows::{Rows, SubRows};

use crate::error::DriverError;
use crate::types::Value;

/// Common cursor surface shared by top-level query results and nested row sequences.
pub trait ResultRows {
    /// Column names, in order. Empty when the cursor has no rows.
    fn columns(&self) -> &[String];

    /// Decode the next row into `dest`, returning `false` once the cursor is exhausted.
    ///
    /// # Errors
    /// Backend stream failures and decode errors.
    fn next_into(&mut self, dest: &mut [Value]) -> Result<bool, DriverError>;

    /// Release the cursor; later calls to `next_into` report exhaustion.
    ///
    /// # Errors
    /// Reserved for backends whose release can fail.
    fn close(&mut self) -> Result<(), DriverError>;

    /// Next row decoded into a fresh vector sized to [`ResultRows::columns`].
    ///
    /// # Errors
    /// See [`ResultRows::next_into`].
    fn next_row(&mut self) -> Result<Option<Vec<Value>>, DriverError> {
        let mut dest = vec![Value::Null; self.columns().len()];
        if self.next_into(&mut dest)? {
            Ok(Some(dest))
        } else {
            Ok(None)
        }
    }
}
