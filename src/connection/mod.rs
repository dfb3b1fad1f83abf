//! Caller-facing connection handle.
//!
//! A [`Connection`] routes every operation either straight to the backend client (no open
//! transaction) or through the active transaction bridge.

mod statement;
mod tx;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::trace;

pub use statement::Statement;
pub use tx::Transaction;

use crate::backend::{BoundStatement, Client, ReadWriteTransaction};
use crate::compiler::{CompiledStatement, compile};
use crate::dsn::Dsn;
use crate::error::DriverError;
use crate::results::{ExecResult, Rows};
use crate::transaction::TransactionBridge;
use crate::types::Value;

/// Options for [`Connection::begin_tx`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Run on a read-only backend transaction; writes fail with `TxnReadOnly`.
    pub read_only: bool,
}

impl TxOptions {
    #[must_use]
    pub fn read_only() -> Self {
        Self { read_only: true }
    }
}

struct ConnectionInner {
    dsn: Dsn,
    client: Arc<dyn Client>,
    active: RwLock<Option<Arc<TransactionBridge>>>,
    next_txn_id: AtomicU64,
    closed: AtomicBool,
}

/// An open connection to one database. Cheap to clone; clones share the client and the
/// active transaction slot.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub fn new(dsn: Dsn, client: Arc<dyn Client>) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                dsn,
                client,
                active: RwLock::new(None),
                next_txn_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn dsn(&self) -> &Dsn {
        &self.inner.dsn
    }

    /// Compile `query` into a reusable statement.
    ///
    /// # Errors
    /// Returns [`DriverError::ConnectionError`] if the connection is closed.
    pub fn prepare(&self, query: &str) -> Result<Statement, DriverError> {
        self.ensure_open()?;
        Ok(Statement::new(self.clone(), compile(query)))
    }

    /// Prepare and execute `query` in one call.
    ///
    /// # Errors
    /// See [`Statement::exec`].
    pub fn exec(&self, query: &str, args: &[Value]) -> Result<ExecResult, DriverError> {
        self.prepare(query)?.exec(args)
    }

    /// Prepare and run `query` in one call.
    ///
    /// # Errors
    /// See [`Statement::query`].
    pub fn query(&self, query: &str, args: &[Value]) -> Result<Rows, DriverError> {
        self.prepare(query)?.query(args)
    }

    /// Begin a read-write transaction.
    ///
    /// # Errors
    /// See [`Connection::begin_tx`].
    pub fn begin(&self) -> Result<Transaction, DriverError> {
        self.begin_tx(TxOptions::default())
    }

    /// Begin a transaction. Returns as soon as the backend callback has been started on its
    /// worker thread.
    ///
    /// # Errors
    /// [`DriverError::TxnStarted`] while a previous transaction is still running, even one
    /// that already failed; [`DriverError::ConnectionError`] if the worker cannot be spawned.
    pub fn begin_tx(&self, opts: TxOptions) -> Result<Transaction, DriverError> {
        self.ensure_open()?;
        let mut slot = self.inner.active.write().map_err(|_| poisoned())?;
        if slot.as_ref().is_some_and(|bridge| bridge.running()) {
            return Err(DriverError::TxnStarted);
        }
        let id = self.inner.next_txn_id.fetch_add(1, Ordering::Relaxed);
        let bridge = Arc::new(TransactionBridge::start(
            Arc::clone(&self.inner.client),
            id,
            opts.read_only,
        )?);
        *slot = Some(Arc::clone(&bridge));
        Ok(Transaction::new(self.clone(), bridge))
    }

    /// True while a transaction begun on this connection is running.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.active_bridge().ok().flatten().is_some()
    }

    /// Release the backend client. A running transaction is not resolved here; roll it back
    /// first.
    ///
    /// # Errors
    /// Reserved for backends whose release can fail.
    pub fn close(&self) -> Result<(), DriverError> {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            self.inner.client.close();
        }
        Ok(())
    }

    pub(crate) fn exec_compiled(
        &self,
        compiled: &CompiledStatement,
        args: &[Value],
    ) -> Result<ExecResult, DriverError> {
        let bound = compiled.bind(args)?;
        self.ensure_open()?;
        if let Some(bridge) = self.active_bridge()? {
            return exec_in(&bridge, bound);
        }
        trace!(sql = %bound.sql, "exec outside transaction");
        let mut count = 0;
        self.inner
            .client
            .read_write_transaction(&mut |tx: &mut dyn ReadWriteTransaction| {
                count = tx.update(&bound)?;
                Ok(())
            })?;
        Ok(ExecResult::new(count))
    }

    pub(crate) fn query_compiled(
        &self,
        compiled: &CompiledStatement,
        args: &[Value],
    ) -> Result<Rows, DriverError> {
        let bound = compiled.bind(args)?;
        self.ensure_open()?;
        if let Some(bridge) = self.active_bridge()? {
            return query_in(&bridge, bound);
        }
        trace!(sql = %bound.sql, "query on single-use snapshot");
        Rows::open(self.inner.client.single_query(&bound)?)
    }

    fn active_bridge(&self) -> Result<Option<Arc<TransactionBridge>>, DriverError> {
        let slot = self.inner.active.read().map_err(|_| poisoned())?;
        Ok(slot.as_ref().filter(|bridge| bridge.running()).cloned())
    }

    /// Clear the active slot if it still holds `bridge`.
    fn release(&self, bridge: &Arc<TransactionBridge>) {
        if let Ok(mut slot) = self.inner.active.write() {
            if slot.as_ref().is_some_and(|held| Arc::ptr_eq(held, bridge)) {
                *slot = None;
            }
        }
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            Err(DriverError::ConnectionError("connection is closed".into()))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("dsn", &self.inner.dsn.to_string())
            .field("in_transaction", &self.in_transaction())
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish()
    }
}

fn exec_in(bridge: &TransactionBridge, bound: BoundStatement) -> Result<ExecResult, DriverError> {
    bridge
        .submit(true, move |handle| handle.update(&bound))
        .map(ExecResult::new)
}

fn query_in(bridge: &TransactionBridge, bound: BoundStatement) -> Result<Rows, DriverError> {
    bridge.submit(false, move |handle| Rows::open(handle.query(&bound)?))
}

fn poisoned() -> DriverError {
    DriverError::ConnectionError("connection state lock poisoned".into())
}

/// Run a blocking driver call on tokio's blocking pool.
pub(crate) async fn run_blocking<F, R>(func: F) -> Result<R, DriverError>
where
    F: FnOnce() -> Result<R, DriverError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(func)
        .await
        .map_err(|e| DriverError::ConnectionError(format!("spawn_blocking join error: {e}")))?
}
