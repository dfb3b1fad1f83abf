use crate::error::DriverError;

/// Outcome of a data-modifying statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    count: i64,
}

impl ExecResult {
    #[must_use]
    pub fn new(count: i64) -> Self {
        Self { count }
    }

    /// Number of rows the statement modified.
    ///
    /// # Errors
    /// Never fails today; the `Result` keeps the signature uniform with [`Self::last_insert_id`].
    pub fn rows_affected(&self) -> Result<i64, DriverError> {
        Ok(self.count)
    }

    /// The backend has no auto-increment keys.
    ///
    /// # Errors
    /// Always [`DriverError::Unsupported`].
    pub fn last_insert_id(&self) -> Result<i64, DriverError> {
        Err(DriverError::Unsupported)
    }
}
