use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::backend::Client;
use crate::dsn::Dsn;
use crate::error::DriverError;
use crate::registry::Connector;

use super::SqliteClient;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_RETRY_DELAYS_MS: [u64; 3] = [10, 25, 50];

/// Options for the embedded `SQLite` backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SqliteOptions {
    /// Databases live at `<root_dir>/<project>/<instance>/<database>.db`.
    pub root_dir: PathBuf,
    pub busy_timeout_ms: u64,
    /// Backoff schedule for retrying a read-write transaction after a retryable failure;
    /// one retry per entry.
    pub retry_delays_ms: Vec<u64>,
    pub wal: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            retry_delays_ms: DEFAULT_RETRY_DELAYS_MS.to_vec(),
            wal: true,
        }
    }
}

impl SqliteOptions {
    #[must_use]
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Load options from a JSON document; absent fields take their defaults.
    ///
    /// # Errors
    /// [`DriverError::ConfigError`] for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, DriverError> {
        serde_json::from_str(json)
            .map_err(|e| DriverError::ConfigError(format!("invalid SQLite options: {e}")))
    }

    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn retry_delays(&self) -> impl Iterator<Item = Duration> + '_ {
        self.retry_delays_ms.iter().copied().map(Duration::from_millis)
    }

    #[must_use]
    pub fn database_path(&self, dsn: &Dsn) -> PathBuf {
        self.root_dir
            .join(&dsn.project)
            .join(&dsn.instance)
            .join(format!("{}.db", dsn.database))
    }

    /// Apply connection-string overrides: `busy_timeout_ms`, `max_retries`, `wal`.
    /// Unknown parameters are ignored.
    ///
    /// # Errors
    /// [`DriverError::ConfigError`] when a known parameter has an unparsable value.
    pub fn apply_params(&mut self, params: &HashMap<String, String>) -> Result<(), DriverError> {
        if let Some(raw) = params.get("busy_timeout_ms") {
            self.busy_timeout_ms = parse_param("busy_timeout_ms", raw)?;
        }
        if let Some(raw) = params.get("max_retries") {
            let max: usize = parse_param("max_retries", raw)?;
            let last = self
                .retry_delays_ms
                .last()
                .copied()
                .unwrap_or(DEFAULT_RETRY_DELAYS_MS[DEFAULT_RETRY_DELAYS_MS.len() - 1]);
            self.retry_delays_ms.resize(max, last);
        }
        if let Some(raw) = params.get("wal") {
            self.wal = parse_param("wal", raw)?;
        }
        Ok(())
    }
}

fn parse_param<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, DriverError> {
    raw.parse()
        .map_err(|_| DriverError::ConfigError(format!("invalid value '{raw}' for {name}")))
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            opts: SqliteOptions::new(root_dir.as_ref()),
        }
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn retry_delays(mut self, delays: &[Duration]) -> Self {
        self.opts.retry_delays_ms = delays
            .iter()
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .collect();
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// A connector opening databases with these options.
    #[must_use]
    pub fn connector(self) -> SqliteConnector {
        SqliteConnector::new(self.finish())
    }
}

/// [`Connector`] for the embedded backend.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    opts: SqliteOptions,
}

impl SqliteConnector {
    #[must_use]
    pub fn new(opts: SqliteOptions) -> Self {
        Self { opts }
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.opts
    }
}

impl Connector for SqliteConnector {
    fn connect(
        &self,
        dsn: &Dsn,
        params: &HashMap<String, String>,
    ) -> Result<Arc<dyn Client>, DriverError> {
        let mut opts = self.opts.clone();
        opts.apply_params(params)?;
        Ok(Arc::new(SqliteClient::open(dsn, opts)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let opts = SqliteOptions::from_json(r#"{"root_dir": "/tmp/db", "wal": false}"#).unwrap();
        assert_eq!(opts.root_dir, PathBuf::from("/tmp/db"));
        assert!(!opts.wal);
        assert_eq!(opts.busy_timeout(), Duration::from_secs(5));
        assert_eq!(opts.retry_delays_ms, vec![10, 25, 50]);
        assert!(SqliteOptions::from_json("{not json").is_err());
    }

    #[test]
    fn params_override_options() {
        let mut opts = SqliteOptionsBuilder::new("/data")
            .retry_delays(&[Duration::from_millis(5)])
            .finish();
        let params = HashMap::from([
            ("busy_timeout_ms".to_string(), "250".to_string()),
            ("max_retries".to_string(), "3".to_string()),
            ("wal".to_string(), "false".to_string()),
            ("unrelated".to_string(), "x".to_string()),
        ]);
        opts.apply_params(&params).unwrap();
        assert_eq!(opts.busy_timeout_ms, 250);
        assert_eq!(opts.retry_delays_ms, vec![5, 5, 5]);
        assert!(!opts.wal);

        let bad = HashMap::from([("max_retries".to_string(), "many".to_string())]);
        assert!(matches!(
            opts.apply_params(&bad),
            Err(DriverError::ConfigError(_))
        ));
    }

    #[test]
    fn database_path_nests_by_instance() {
        let opts = SqliteOptions::new("/data");
        assert_eq!(
            opts.database_path(&Dsn::new("p", "i", "d")),
            PathBuf::from("/data/p/i/d.db")
        );
    }
}
