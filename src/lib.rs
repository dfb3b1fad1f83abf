//! Drive a callback-shaped transactional backend through an explicit
//! begin / exec / query / commit / rollback protocol.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use spanner_bridge::prelude::*;
//!
//! # fn main() -> Result<(), DriverError> {
//! let registry = DriverRegistry::new().with_driver(
//!     DRIVER_NAME,
//!     Arc::new(SpannerDriver::new(Arc::new(
//!         SqliteOptionsBuilder::new("/var/lib/app").connector(),
//!     ))),
//! )?;
//! let conn = registry.open(DRIVER_NAME, "spanner:///projects/p/instances/i/databases/d")?;
//!
//! let tx = conn.begin()?;
//! tx.exec("UPDATE accounts SET balance = balance - $2 WHERE id = $1", &[7.into(), 10.into()])?;
//! let mut rows = tx.query("SELECT balance FROM accounts WHERE id = ?", &[7.into()])?;
//! while let Some(row) = rows.next_row()? {
//!     println!("{:?}", row[0]);
//! }
//! tx.commit()?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod compiler;
pub mod connection;
pub mod dsn;
pub mod error;
pub mod prelude;
pub mod registry;
pub mod results;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod transaction;
pub mod types;

pub use connection::{Connection, Statement, Transaction, TxOptions};
pub use error::{BackendError, DriverError, ErrorCode};
pub use results::{ExecResult, ResultRows, Rows, SubRows};
pub use types::Value;
