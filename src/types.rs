use chrono::{DateTime, Utc};

use crate::results::SubRows;

/// Generic values handed to callers as column data and accepted as statement arguments.
///
/// ```rust
/// use spanner_bridge::prelude::*;
///
/// let args: Vec<Value> = vec![1_i64.into(), "alice".into(), true.into(), Value::Null];
/// # let _ = args;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value; what a NULL column of any type decodes to
    Null,
    Bool(bool),
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Timestamp value; DATE columns decode to midnight UTC
    Timestamp(DateTime<Utc>),
    /// Nested row sequence, iterated lazily
    Rows(SubRows),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let Value::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let Value::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let Value::Bytes(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        if let Value::Timestamp(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    /// Take the nested row sequence out of this value, leaving `Null` behind.
    pub fn take_rows(&mut self) -> Option<SubRows> {
        match std::mem::replace(self, Value::Null) {
            Value::Rows(rows) => Some(rows),
            other => {
                *self = other;
                None
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
