//! Convenient imports for common functionality.

pub use crate::backend::Client;
pub use crate::connection::{Connection, Statement, Transaction, TxOptions};
pub use crate::dsn::{Dsn, parse_connection_uri};
pub use crate::error::{BackendError, DriverError, ErrorCode};
pub use crate::registry::{Connector, DRIVER_NAME, Driver, DriverRegistry, SpannerDriver};
pub use crate::results::{ExecResult, ResultRows, Rows, SubRows};
pub use crate::types::Value;

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteClient, SqliteConnector, SqliteOptions, SqliteOptionsBuilder};
