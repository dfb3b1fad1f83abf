//! Explicit driver registry.
//!
//! Built once at startup and passed by reference to whatever opens connections.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::backend::Client;
use crate::connection::Connection;
use crate::dsn::{Dsn, parse_connection_uri};
use crate::error::DriverError;

/// Name the bridging driver is conventionally registered under.
pub const DRIVER_NAME: &str = "google-spanner";

/// Opens connections from connection strings.
pub trait Driver: Send + Sync {
    /// # Errors
    /// Connection-string and backend connect failures.
    fn open(&self, connection_string: &str) -> Result<Connection, DriverError>;
}

/// Produces backend clients for a parsed connection string.
pub trait Connector: Send + Sync {
    /// # Errors
    /// Backend-specific connect failures.
    fn connect(
        &self,
        dsn: &Dsn,
        params: &HashMap<String, String>,
    ) -> Result<Arc<dyn Client>, DriverError>;
}

/// Driver that parses `spanner:///projects/P/instances/I/databases/D` strings and
/// connects through a [`Connector`].
#[derive(Clone)]
pub struct SpannerDriver {
    connector: Arc<dyn Connector>,
}

impl SpannerDriver {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }
}

impl Driver for SpannerDriver {
    fn open(&self, connection_string: &str) -> Result<Connection, DriverError> {
        let (dsn, params) = parse_connection_uri(connection_string)?;
        let client = self.connector.connect(&dsn, &params)?;
        debug!(dsn = %dsn, "opened connection");
        Ok(Connection::new(dsn, client))
    }
}

impl fmt::Debug for SpannerDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpannerDriver").finish_non_exhaustive()
    }
}

/// Name → driver map.
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`DriverRegistry::register`].
    ///
    /// # Errors
    /// [`DriverError::ConfigError`] if `name` is already taken.
    pub fn with_driver(
        mut self,
        name: impl Into<String>,
        driver: Arc<dyn Driver>,
    ) -> Result<Self, DriverError> {
        self.register(name, driver)?;
        Ok(self)
    }

    /// # Errors
    /// [`DriverError::ConfigError`] if `name` is already taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        driver: Arc<dyn Driver>,
    ) -> Result<(), DriverError> {
        let name = name.into();
        if self.drivers.contains_key(&name) {
            return Err(DriverError::ConfigError(format!(
                "driver '{name}' is already registered"
            )));
        }
        self.drivers.insert(name, driver);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Open a connection through the driver registered as `driver_name`.
    ///
    /// # Errors
    /// [`DriverError::ConfigError`] for unknown drivers, otherwise the driver's error.
    pub fn open(&self, driver_name: &str, connection_string: &str) -> Result<Connection, DriverError> {
        let driver = self.drivers.get(driver_name).ok_or_else(|| {
            DriverError::ConfigError(format!("unknown driver '{driver_name}'"))
        })?;
        driver.open(connection_string)
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.drivers.keys().collect();
        names.sort();
        f.debug_struct("DriverRegistry").field("drivers", &names).finish()
    }
}
