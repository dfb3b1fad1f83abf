//! Embedded backend on `SQLite` files.
//!
//! Implements the callback-shaped client interface: every operation opens its own connection,
//! read-write transactions run their callback under `BEGIN IMMEDIATE` inside a retry loop,
//! and reads run with `query_only` set.

pub mod config;
pub mod ddl;
pub mod params;
pub mod query;
mod transaction;

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use rusqlite::{Connection, ErrorCode as SqliteCode, ffi};
use tracing::debug;

pub use config::{SqliteConnector, SqliteOptions, SqliteOptionsBuilder};

use crate::backend::{
    BoundStatement, Client, ReadOnlyTransaction, ReadWriteCallback, ReadWriteTransaction,
    RowIterator,
};
use crate::dsn::Dsn;
use crate::error::{DriverError, ErrorCode};

use transaction::{SqliteReadOnly, attempt};

/// Map a `rusqlite` error onto the backend status codes.
#[must_use]
pub fn map_sqlite_error(err: rusqlite::Error) -> DriverError {
    // Prepare errors carrying a source offset arrive as `SqlInputError`.
    let failure = match &err {
        rusqlite::Error::SqliteFailure(failure, _)
        | rusqlite::Error::SqlInputError { error: failure, .. } => Some(failure),
        _ => None,
    };
    let code = if let Some(failure) = failure {
        match failure.code {
            SqliteCode::ConstraintViolation
                if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                ErrorCode::AlreadyExists
            }
            SqliteCode::ConstraintViolation | SqliteCode::ReadOnly => {
                ErrorCode::FailedPrecondition
            }
            SqliteCode::DatabaseBusy | SqliteCode::DatabaseLocked => ErrorCode::Aborted,
            SqliteCode::OperationInterrupted => ErrorCode::Canceled,
            SqliteCode::PermissionDenied => ErrorCode::PermissionDenied,
            SqliteCode::CannotOpen | SqliteCode::NotADatabase => ErrorCode::Unavailable,
            // SQLITE_ERROR: syntax errors, unknown tables and columns
            SqliteCode::Unknown => ErrorCode::InvalidArgument,
            _ => ErrorCode::Unknown,
        }
    } else {
        match &err {
            rusqlite::Error::ExecuteReturnedResults
            | rusqlite::Error::InvalidParameterName(_)
            | rusqlite::Error::InvalidParameterCount(_, _)
            | rusqlite::Error::InvalidColumnIndex(_)
            | rusqlite::Error::MultipleStatement => ErrorCode::InvalidArgument,
            _ => ErrorCode::Unknown,
        }
    };
    DriverError::backend(code, err.to_string())
}

/// Client over one database file.
#[derive(Debug, Clone)]
pub struct SqliteClient {
    path: PathBuf,
    opts: SqliteOptions,
}

impl SqliteClient {
    /// Open (creating if needed) the database `dsn` names under the options' root directory.
    ///
    /// # Errors
    /// [`DriverError::ConnectionError`] if the directory cannot be created; backend errors
    /// from the initial connection.
    pub fn open(dsn: &Dsn, opts: SqliteOptions) -> Result<Self, DriverError> {
        let path = opts.database_path(dsn);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DriverError::ConnectionError(format!(
                    "failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let client = Self { path, opts };
        let conn = client.connect()?;
        if client.opts.wal {
            let mode: String = conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                .map_err(map_sqlite_error)?;
            debug!(path = %client.path.display(), journal_mode = %mode, "opened SQLite database");
        }
        Ok(client)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.opts
    }

    fn connect(&self) -> Result<Connection, DriverError> {
        let conn = Connection::open(&self.path).map_err(map_sqlite_error)?;
        conn.busy_timeout(self.opts.busy_timeout())
            .map_err(map_sqlite_error)?;
        Ok(conn)
    }
}

impl Client for SqliteClient {
    fn single_query(&self, stmt: &BoundStatement) -> Result<Box<dyn RowIterator>, DriverError> {
        let conn = self.connect()?;
        conn.pragma_update(None, "query_only", true)
            .map_err(map_sqlite_error)?;
        let mut prepared = conn.prepare(&stmt.sql).map_err(map_sqlite_error)?;
        Ok(Box::new(query::build_rows(&mut prepared, stmt)?))
    }

    fn read_write_transaction(
        &self,
        callback: &mut ReadWriteCallback<'_>,
    ) -> Result<(), DriverError> {
        let conn = self.connect()?;
        let mut delays = self.opts.retry_delays();
        let mut attempt_no = 1;
        loop {
            let result = attempt(&conn, |tx| callback(tx as &mut dyn ReadWriteTransaction));
            match result {
                Err(err) if err.is_retryable() => {
                    let Some(delay) = delays.next() else {
                        return Err(err);
                    };
                    debug!(attempt = attempt_no, error = %err, ?delay, "retrying transaction");
                    thread::sleep(delay);
                    attempt_no += 1;
                }
                other => return other,
            }
        }
    }

    fn read_only_transaction(&self) -> Result<Box<dyn ReadOnlyTransaction>, DriverError> {
        Ok(Box::new(SqliteReadOnly::begin(self.connect()?)?))
    }
}
