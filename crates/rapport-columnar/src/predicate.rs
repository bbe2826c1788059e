//! Scan predicates.
//!
//! Only column equality is supported; it is all the interaction queries need.

use std::fmt;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Matches rows whose `column` equals `value`. Null cells never match.
    Eq { column: String, value: Value },
}

impl Predicate {
    pub fn column(&self) -> &str {
        match self {
            Predicate::Eq { column, .. } => column,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Eq { column, value } => write!(f, "{} = {:?}", column, value),
        }
    }
}

/// Column reference used to build predicates: `col("actorId").eq("u1")`.
#[derive(Debug, Clone)]
pub struct ColumnRef(String);

pub fn col(name: impl Into<String>) -> ColumnRef {
    ColumnRef(name.into())
}

impl ColumnRef {
    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        Predicate::Eq {
            column: self.0,
            value: value.into(),
        }
    }
}
