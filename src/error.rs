use std::fmt;

use thiserror::Error;

/// Status codes reported by the backend.
///
/// The taxonomy belongs to the backend; the driver only passes it through and uses it to
/// classify retryable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Unknown,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    Aborted,
    DeadlineExceeded,
    Canceled,
    PermissionDenied,
    ResourceExhausted,
    Internal,
    Unavailable,
    Unimplemented,
}

impl ErrorCode {
    /// Codes that signal a transient condition worth retrying the whole transaction for.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCode::Aborted | ErrorCode::DeadlineExceeded | ErrorCode::Canceled
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An error reported by the backend, surfaced to callers unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("spanner: code = {code:?}, desc = {message:?}")]
pub struct BackendError {
    pub code: ErrorCode,
    pub message: String,
}

impl BackendError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    #[error("spanner: transaction already started")]
    TxnStarted,

    #[error("spanner: transaction failed")]
    TxnFailed,

    #[error("spanner: transaction is read-only")]
    TxnReadOnly,

    /// Terminal outcome of a rolled back transaction; `Rollback` swallows it.
    #[error("spanner: transaction rolled back")]
    RolledBack,

    #[error("spanner: transaction needs to be retried")]
    RetryUnsupported,

    #[error("spanner: operation unsupported")]
    Unsupported,

    #[error(
        "spanner/statement: number of arguments in statement do not match (expected {expected}, got {got})"
    )]
    ParameterCount { expected: usize, got: usize },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl DriverError {
    /// Shorthand for a backend-reported failure.
    pub fn backend(code: ErrorCode, message: impl Into<String>) -> Self {
        DriverError::Backend(BackendError::new(code, message))
    }

    /// Backend status code, or [`ErrorCode::Unknown`] for driver-local conditions.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            DriverError::Backend(err) => err.code,
            _ => ErrorCode::Unknown,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}
