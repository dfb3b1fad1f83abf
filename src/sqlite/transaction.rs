use std::thread;
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::backend::{BoundStatement, ReadOnlyTransaction, ReadWriteTransaction, RowIterator};
use crate::error::{DriverError, ErrorCode};

use super::{ddl, map_sqlite_error};
use super::query::{build_rows, execute_update};

const ROLLBACK_BUSY_RETRIES: &[Duration] = &[
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
];

fn run_query(conn: &Connection, stmt: &BoundStatement) -> Result<Box<dyn RowIterator>, DriverError> {
    let mut prepared = conn.prepare(&stmt.sql).map_err(map_sqlite_error)?;
    Ok(Box::new(build_rows(&mut prepared, stmt)?))
}

/// Read-write handle over a connection with an open `BEGIN IMMEDIATE` transaction.
pub(super) struct SqliteReadWrite<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteReadWrite<'c> {
    pub(super) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl ReadWriteTransaction for SqliteReadWrite<'_> {
    fn update(&mut self, stmt: &BoundStatement) -> Result<i64, DriverError> {
        let sql = ddl::translate(&stmt.sql)?;
        let mut prepared = self.conn.prepare(&sql).map_err(map_sqlite_error)?;
        execute_update(&mut prepared, stmt)
    }

    fn query(&mut self, stmt: &BoundStatement) -> Result<Box<dyn RowIterator>, DriverError> {
        run_query(self.conn, stmt)
    }
}

/// Read-only handle owning its connection; the snapshot is fixed by the first read.
pub(super) struct SqliteReadOnly {
    conn: Connection,
    open: bool,
}

impl SqliteReadOnly {
    pub(super) fn begin(conn: Connection) -> Result<Self, DriverError> {
        conn.pragma_update(None, "query_only", true)
            .map_err(map_sqlite_error)?;
        conn.execute_batch("BEGIN DEFERRED")
            .map_err(map_sqlite_error)?;
        Ok(Self { conn, open: true })
    }
}

impl ReadOnlyTransaction for SqliteReadOnly {
    fn query(&mut self, stmt: &BoundStatement) -> Result<Box<dyn RowIterator>, DriverError> {
        run_query(&self.conn, stmt)
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            let _ = rollback_with_busy_retries(&self.conn);
        }
    }
}

impl Drop for SqliteReadOnly {
    fn drop(&mut self) {
        ReadOnlyTransaction::close(self);
    }
}

pub(super) fn rollback_with_busy_retries(conn: &Connection) -> Result<(), DriverError> {
    for (idx, delay) in ROLLBACK_BUSY_RETRIES.iter().copied().enumerate() {
        match conn.execute_batch("ROLLBACK").map_err(map_sqlite_error) {
            Ok(()) => return Ok(()),
            Err(err)
                if err.code() == ErrorCode::Aborted && idx + 1 < ROLLBACK_BUSY_RETRIES.len() =>
            {
                thread::sleep(delay);
            }
            Err(err) => return Err(err),
        }
    }

    Err(DriverError::backend(
        ErrorCode::Aborted,
        "rollback retries exhausted",
    ))
}

/// One attempt: begin, run `body`, then commit or roll back.
pub(super) fn attempt<F>(conn: &Connection, body: F) -> Result<(), DriverError>
where
    F: FnOnce(&mut SqliteReadWrite<'_>) -> Result<(), DriverError>,
{
    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(map_sqlite_error)?;
    let mut tx = SqliteReadWrite::new(conn);
    let result = body(&mut tx).and_then(|()| conn.execute_batch("COMMIT").map_err(map_sqlite_error));
    if let Err(err) = result {
        if !conn.is_autocommit() {
            if let Err(rollback_err) = rollback_with_busy_retries(conn) {
                debug!(error = %rollback_err, "rollback after failed attempt");
            }
        }
        return Err(err);
    }
    Ok(())
}
