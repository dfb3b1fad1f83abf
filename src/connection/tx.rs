use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::compiler::compile;
use crate::error::DriverError;
use crate::results::{ExecResult, Rows};
use crate::transaction::TransactionBridge;
use crate::types::Value;

use super::{Connection, exec_in, query_in, run_blocking};

/// An open transaction.
///
/// Finish it with [`Transaction::commit`] or [`Transaction::rollback`]; dropping it unfinished
/// rolls back.
pub struct Transaction {
    conn: Connection,
    bridge: Arc<TransactionBridge>,
    finished: bool,
}

impl Transaction {
    pub(crate) fn new(conn: Connection, bridge: Arc<TransactionBridge>) -> Self {
        Self {
            conn,
            bridge,
            finished: false,
        }
    }

    #[must_use]
    pub fn read_only(&self) -> bool {
        self.bridge.read_only()
    }

    /// True once a command inside this transaction has failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.bridge.failed()
    }

    /// Execute `query` inside this transaction.
    ///
    /// # Errors
    /// [`DriverError::ParameterCount`], [`DriverError::TxnFailed`] after an earlier failure,
    /// [`DriverError::TxnReadOnly`] on a read-only transaction, or the backend error.
    pub fn exec(&self, query: &str, args: &[Value]) -> Result<ExecResult, DriverError> {
        let bound = compile(query).bind(args)?;
        exec_in(&self.bridge, bound)
    }

    /// Run `query` inside this transaction.
    ///
    /// # Errors
    /// As for [`Transaction::exec`], except that queries are allowed on read-only
    /// transactions.
    pub fn query(&self, query: &str, args: &[Value]) -> Result<Rows, DriverError> {
        let bound = compile(query).bind(args)?;
        query_in(&self.bridge, bound)
    }

    /// # Errors
    /// [`DriverError::TxnFailed`] if any command failed or the backend refused the commit.
    pub fn commit(mut self) -> Result<(), DriverError> {
        self.finished = true;
        let result = self.bridge.commit();
        self.conn.release(&self.bridge);
        result
    }

    /// # Errors
    /// A command failure that raced with the rollback.
    pub fn rollback(mut self) -> Result<(), DriverError> {
        self.finished = true;
        let result = self.bridge.rollback();
        self.conn.release(&self.bridge);
        result
    }

    /// [`Transaction::commit`] on tokio's blocking pool.
    ///
    /// # Errors
    /// As for [`Transaction::commit`].
    pub async fn commit_async(self) -> Result<(), DriverError> {
        run_blocking(move || self.commit()).await
    }

    /// [`Transaction::rollback`] on tokio's blocking pool.
    ///
    /// # Errors
    /// As for [`Transaction::rollback`].
    pub async fn rollback_async(self) -> Result<(), DriverError> {
        run_blocking(move || self.rollback()).await
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        debug!(txn = self.bridge.id(), "transaction dropped unfinished; rolling back");
        let _ = self.bridge.rollback();
        self.conn.release(&self.bridge);
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.bridge.id())
            .field("read_only", &self.bridge.read_only())
            .field("running", &self.bridge.running())
            .field("failed", &self.bridge.failed())
            .finish()
    }
}
