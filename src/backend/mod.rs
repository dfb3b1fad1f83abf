//! Backend collaborator interface.
//!
//! The driver wraps a client whose read-write transactions are expressed as a callback run
//! by the client's own retry loop. Implementations live outside the bridge; the crate ships
//! one on top of SQLite (feature `sqlite`).

mod row;

use std::collections::HashMap;

use crate::error::DriverError;
use crate::types::Value;

pub use row::{BackendRow, BufferedRows, GenericColumnValue, NullRow, RawValue, TypeCode};

/// SQL text plus named parameter values, in the backend's native `@name` syntax.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub params: HashMap<String, Value>,
}

impl BoundStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// Callback body handed to [`Client::read_write_transaction`].
pub type ReadWriteCallback<'a> =
    dyn FnMut(&mut dyn ReadWriteTransaction) -> Result<(), DriverError> + 'a;

/// A client of the transactional backend.
pub trait Client: Send + Sync {
    /// Run a query against a single-use read snapshot.
    ///
    /// # Errors
    /// Backend failures while opening the snapshot or running the query.
    fn single_query(&self, stmt: &BoundStatement) -> Result<Box<dyn RowIterator>, DriverError>;

    /// Run `callback` inside a read-write transaction, committing when it returns `Ok`.
    ///
    /// The client may invoke the callback again when it decides the attempt must be retried.
    ///
    /// # Errors
    /// The callback's error, or the backend's begin/commit failure.
    fn read_write_transaction(&self, callback: &mut ReadWriteCallback<'_>)
    -> Result<(), DriverError>;

    /// Open a read-only transaction; all reads observe one snapshot.
    ///
    /// # Errors
    /// Backend failures while opening the transaction.
    fn read_only_transaction(&self) -> Result<Box<dyn ReadOnlyTransaction>, DriverError>;

    /// Release client resources.
    fn close(&self) {}
}

pub trait ReadWriteTransaction {
    /// Execute a DML statement, returning the affected row count.
    ///
    /// # Errors
    /// Backend failures executing the statement.
    fn update(&mut self, stmt: &BoundStatement) -> Result<i64, DriverError>;

    /// # Errors
    /// Backend failures running the query.
    fn query(&mut self, stmt: &BoundStatement) -> Result<Box<dyn RowIterator>, DriverError>;
}

pub trait ReadOnlyTransaction {
    /// # Errors
    /// Backend failures running the query.
    fn query(&mut self, stmt: &BoundStatement) -> Result<Box<dyn RowIterator>, DriverError>;

    fn close(&mut self) {}
}

/// Cursor over typed backend rows.
pub trait RowIterator: Send {
    /// Fetch the next row; `Ok(None)` signals end of data.
    ///
    /// # Errors
    /// Backend failures while streaming rows.
    fn next_row(&mut self) -> Result<Option<BackendRow>, DriverError>;

    /// Stop the iterator, releasing whatever it holds. Idempotent.
    fn stop(&mut self) {}
}
