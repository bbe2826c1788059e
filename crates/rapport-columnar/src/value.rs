use serde::{Deserialize, Serialize};

use crate::schema::LogicalType;

/// A single cell on the write path and in predicate literals.
///
/// The derived ordering (`Null` first, then by value) is what sort keys use.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    Null,
    Int64(i64),
    Utf8(String),
}

/// One row, cells in schema column order.
pub type Row = Vec<Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this cell can be stored in a column of `ty`. Null fits anywhere.
    pub fn fits(&self, ty: LogicalType) -> bool {
        matches!(
            (self, ty),
            (Value::Null, _) | (Value::Int64(_), LogicalType::Int64) | (Value::Utf8(_), LogicalType::Utf8)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Utf8(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Utf8(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
