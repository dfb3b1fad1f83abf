#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use spanner_bridge::prelude::*;
use tempfile::TempDir;

pub const URI: &str = "spanner:///projects/test-project/instances/test-instance/databases/testdb";

/// Throwaway SQLite-backed database; removed when dropped.
pub struct TestDb {
    _dir: TempDir,
    pub registry: DriverRegistry,
}

impl TestDb {
    /// Fresh database with `ddl` applied, one statement per entry.
    pub fn new(ddl: &[&str]) -> Result<Self, DriverError> {
        let dir = tempfile::tempdir()
            .map_err(|e| DriverError::ConnectionError(format!("tempdir: {e}")))?;
        let connector = SqliteOptionsBuilder::new(dir.path())
            .busy_timeout(Duration::from_secs(2))
            .retry_delays(&[Duration::from_millis(5)])
            .connector();
        let registry = DriverRegistry::new()
            .with_driver(DRIVER_NAME, Arc::new(SpannerDriver::new(Arc::new(connector))))?;
        let db = Self {
            _dir: dir,
            registry,
        };
        let conn = db.open()?;
        for stmt in ddl {
            conn.exec(stmt, &[])?;
        }
        Ok(db)
    }

    pub fn open(&self) -> Result<Connection, DriverError> {
        self.registry.open(DRIVER_NAME, URI)
    }
}

/// Drain `rows`, returning every decoded row.
pub fn collect(rows: Rows) -> Result<Vec<Vec<Value>>, DriverError> {
    rows.collect()
}

pub fn count_rows(conn: &Connection, query: &str) -> Result<usize, DriverError> {
    Ok(collect(conn.query(query, &[])?)?.len())
}
