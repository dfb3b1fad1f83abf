//! Transaction bridge.
//!
//! The backend only runs a read-write transaction as a callback driven by its own retry
//! loop. The bridge runs that callback on a dedicated worker thread whose body is a command
//! loop, and hands the caller a blocking submit/commit/rollback protocol over channels.

mod bridge;
mod channel;

pub(crate) use bridge::TransactionBridge;

use crate::backend::{BoundStatement, ReadOnlyTransaction, ReadWriteTransaction, RowIterator};
use crate::error::DriverError;

/// Live backend transaction handle, as seen by a command running inside the loop.
pub enum TxHandle<'a> {
    ReadOnly(&'a mut dyn ReadOnlyTransaction),
    ReadWrite(&'a mut dyn ReadWriteTransaction),
}

impl TxHandle<'_> {
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        matches!(self, TxHandle::ReadOnly(_))
    }

    /// Run a query against whichever handle is live.
    ///
    /// # Errors
    /// Backend failures running the query.
    pub fn query(&mut self, stmt: &BoundStatement) -> Result<Box<dyn RowIterator>, DriverError> {
        match self {
            TxHandle::ReadOnly(tx) => tx.query(stmt),
            TxHandle::ReadWrite(tx) => tx.query(stmt),
        }
    }

    /// Execute a DML statement, returning the affected row count.
    ///
    /// # Errors
    /// [`DriverError::TxnReadOnly`] on a read-only handle; backend failures otherwise.
    pub fn update(&mut self, stmt: &BoundStatement) -> Result<i64, DriverError> {
        match self {
            TxHandle::ReadOnly(_) => Err(DriverError::TxnReadOnly),
            TxHandle::ReadWrite(tx) => tx.update(stmt),
        }
    }
}
