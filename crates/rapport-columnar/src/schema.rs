//! Table schemas with per-column encoding hints.
//!
//! A schema is declared once when a table is created. Besides names and
//! logical types it carries two hints the engine uses when sealing granules:
//! which string columns should be dictionary encoded, and the position of each
//! column in the table's sort key.

use std::collections::HashSet;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    Utf8,
    Int64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Plain,
    /// Low-cardinality strings: a value dictionary plus per-row keys.
    Dictionary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub logical_type: LogicalType,
    pub encoding: Encoding,
    pub sort_position: Option<usize>,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn utf8(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Utf8)
    }

    pub fn int64(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Int64)
    }

    fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            encoding: Encoding::Plain,
            sort_position: None,
            nullable: false,
        }
    }

    pub fn dictionary(mut self) -> Self {
        self.encoding = Encoding::Dictionary;
        self
    }

    pub fn sorted(mut self, position: usize) -> Self {
        self.sort_position = Some(position);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Ordered column list plus the derived sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
    /// Column indices in sort-key order.
    sort_key: Vec<usize>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnDef>) -> EngineResult<Self> {
        if columns.is_empty() {
            return Err(EngineError::InvalidSchema("schema has no columns".into()));
        }

        let mut seen = HashSet::new();
        for col in &columns {
            if col.name.is_empty() {
                return Err(EngineError::InvalidSchema("empty column name".into()));
            }
            if !seen.insert(col.name.as_str()) {
                return Err(EngineError::InvalidSchema(format!(
                    "duplicate column '{}'",
                    col.name
                )));
            }
            if col.encoding == Encoding::Dictionary && col.logical_type != LogicalType::Utf8 {
                return Err(EngineError::InvalidSchema(format!(
                    "dictionary encoding requested for non-string column '{}'",
                    col.name
                )));
            }
        }

        let mut keyed: Vec<(usize, usize)> = columns
            .iter()
            .enumerate()
            .filter_map(|(idx, col)| col.sort_position.map(|pos| (pos, idx)))
            .collect();
        keyed.sort_unstable();
        for (expected, (pos, idx)) in keyed.iter().enumerate() {
            if *pos != expected {
                return Err(EngineError::InvalidSchema(format!(
                    "sort positions must be contiguous from 0; column '{}' has position {}",
                    columns[*idx].name, pos
                )));
            }
        }
        let sort_key = keyed.into_iter().map(|(_, idx)| idx).collect();

        Ok(Self { columns, sort_key })
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn sort_key(&self) -> &[usize] {
        &self.sort_key
    }

    /// Names of the sort-key columns, in order.
    pub fn sort_key_names(&self) -> Vec<&str> {
        self.sort_key
            .iter()
            .map(|&idx| self.columns[idx].name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_follows_declared_positions() {
        let schema = TableSchema::new(vec![
            ColumnDef::utf8("b").dictionary().sorted(1),
            ColumnDef::utf8("note"),
            ColumnDef::utf8("a").dictionary().sorted(0),
            ColumnDef::int64("ts").sorted(2),
        ])
        .unwrap();

        assert_eq!(schema.sort_key(), &[2, 0, 3]);
        assert_eq!(schema.sort_key_names(), vec!["a", "b", "ts"]);
        assert_eq!(schema.index_of("note"), Some(1));
        assert!(schema.column("missing").is_none());
    }

    #[test]
    fn rejects_malformed_schemas() {
        let dup = TableSchema::new(vec![ColumnDef::utf8("a"), ColumnDef::int64("a")]);
        assert!(matches!(dup, Err(EngineError::InvalidSchema(_))));

        let dict_int = TableSchema::new(vec![ColumnDef::int64("n").dictionary()]);
        assert!(matches!(dict_int, Err(EngineError::InvalidSchema(_))));

        let gap = TableSchema::new(vec![
            ColumnDef::utf8("a").sorted(0),
            ColumnDef::utf8("b").sorted(2),
        ]);
        assert!(matches!(gap, Err(EngineError::InvalidSchema(_))));

        assert!(TableSchema::new(vec![]).is_err());
    }
}
