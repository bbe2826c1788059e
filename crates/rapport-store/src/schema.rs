//! The interaction table.
//!
//! `actorId`, `targetId` and `kind` are low-cardinality and dictionary
//! encoded. Together with `timestamp` they form the sort key, in that order.
//! `message` is a plain string and is always present, possibly empty.

use rapport_columnar::{ColumnDef, EngineResult, Row, TableSchema, Value};
use rapport_types::InteractionRecord;

pub const TABLE_NAME: &str = "interactions_table";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionColumn {
    ActorId,
    TargetId,
    Kind,
    Message,
    Timestamp,
}

impl InteractionColumn {
    /// Schema order.
    pub const ALL: [InteractionColumn; 5] = [
        InteractionColumn::ActorId,
        InteractionColumn::TargetId,
        InteractionColumn::Kind,
        InteractionColumn::Message,
        InteractionColumn::Timestamp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InteractionColumn::ActorId => "actorId",
            InteractionColumn::TargetId => "targetId",
            InteractionColumn::Kind => "kind",
            InteractionColumn::Message => "message",
            InteractionColumn::Timestamp => "timestamp",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    fn definition(self) -> ColumnDef {
        match self {
            InteractionColumn::ActorId => ColumnDef::utf8(self.name()).dictionary().sorted(0),
            InteractionColumn::TargetId => ColumnDef::utf8(self.name()).dictionary().sorted(1),
            InteractionColumn::Kind => ColumnDef::utf8(self.name()).dictionary().sorted(2),
            InteractionColumn::Message => ColumnDef::utf8(self.name()),
            InteractionColumn::Timestamp => ColumnDef::int64(self.name()).sorted(3),
        }
    }
}

pub fn interaction_schema() -> EngineResult<TableSchema> {
    TableSchema::new(
        InteractionColumn::ALL
            .into_iter()
            .map(InteractionColumn::definition)
            .collect(),
    )
}

/// Lay a record out as one row, in schema order.
pub fn to_row(record: &InteractionRecord) -> Row {
    InteractionColumn::ALL
        .into_iter()
        .map(|column| match column {
            InteractionColumn::ActorId => Value::from(record.actor_id.as_str()),
            InteractionColumn::TargetId => Value::from(record.target_id.as_str()),
            InteractionColumn::Kind => Value::from(record.kind.as_str()),
            InteractionColumn::Message => Value::from(record.message.as_str()),
            InteractionColumn::Timestamp => Value::Int64(record.timestamp),
        })
        .collect()
}
