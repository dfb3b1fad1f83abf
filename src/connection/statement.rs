use std::fmt;
use std::sync::Arc;

use crate::compiler::CompiledStatement;
use crate::error::DriverError;
use crate::results::{ExecResult, Rows};
use crate::types::Value;

use super::{Connection, run_blocking};

/// A compiled statement bound to the connection that prepared it.
///
/// Runs through the connection's active transaction when there is one, otherwise directly
/// against the backend.
#[derive(Clone)]
pub struct Statement {
    conn: Connection,
    compiled: Arc<CompiledStatement>,
}

impl Statement {
    pub(crate) fn new(conn: Connection, compiled: CompiledStatement) -> Self {
        Self {
            conn,
            compiled: Arc::new(compiled),
        }
    }

    /// Rewritten SQL as sent to the backend.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.compiled.sql()
    }

    #[must_use]
    pub fn param_names(&self) -> &[String] {
        self.compiled.params()
    }

    /// Number of positional arguments `exec`/`query` expect.
    #[must_use]
    pub fn num_input(&self) -> usize {
        self.compiled.num_input()
    }

    /// Execute the statement, returning the affected row count.
    ///
    /// # Errors
    /// [`DriverError::ParameterCount`] before reaching the backend when `args` has the wrong
    /// length; transaction conditions when routed through a transaction; backend errors
    /// verbatim otherwise.
    pub fn exec(&self, args: &[Value]) -> Result<ExecResult, DriverError> {
        self.conn.exec_compiled(&self.compiled, args)
    }

    /// Run the statement as a query. An empty result is an exhausted cursor, not an error.
    ///
    /// # Errors
    /// As for [`Statement::exec`], plus failures fetching the first row.
    pub fn query(&self, args: &[Value]) -> Result<Rows, DriverError> {
        self.conn.query_compiled(&self.compiled, args)
    }

    /// [`Statement::exec`] on tokio's blocking pool.
    ///
    /// # Errors
    /// As for [`Statement::exec`], plus a `ConnectionError` if the blocking task panics.
    pub async fn exec_async(&self, args: Vec<Value>) -> Result<ExecResult, DriverError> {
        let stmt = self.clone();
        run_blocking(move || stmt.exec(&args)).await
    }

    /// [`Statement::query`] on tokio's blocking pool.
    ///
    /// # Errors
    /// As for [`Statement::query`], plus a `ConnectionError` if the blocking task panics.
    pub async fn query_async(&self, args: Vec<Value>) -> Result<Rows, DriverError> {
        let stmt = self.clone();
        run_blocking(move || stmt.query(&args)).await
    }

    /// Statements hold no backend resources.
    ///
    /// # Errors
    /// Never fails.
    pub fn close(self) -> Result<(), DriverError> {
        Ok(())
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.compiled.sql())
            .field("params", &self.compiled.params())
            .finish_non_exhaustive()
    }
}
