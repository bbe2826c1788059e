//! Batch to record conversion.
//!
//! The engine picks an encoding per batch, so `actorId`, `targetId` and
//! `kind` may arrive either dictionary encoded or as plain strings. Column
//! views are resolved once per batch; rows are then decoded independently so
//! a bad row never takes its siblings down with it.
//!
//! Per row and column: a null cell leaves the field at its default, an
//! unknown column name is ignored, and a column of an unexpected type fails
//! the row.

use arrow::array::{AnyDictionaryArray, Array, AsArray, Int64Array, StringArray};
use arrow::datatypes::{DataType, Int64Type};
use arrow::record_batch::RecordBatch;
use rapport_types::{InteractionKind, InteractionRecord, UnknownVariant};
use thiserror::Error;
use tracing::warn;

use crate::schema::InteractionColumn;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unexpected array type for {column}: {found}")]
    UnexpectedType {
        column: &'static str,
        found: DataType,
    },

    #[error("unexpected dictionary type for {column}: {found}")]
    UnexpectedDictionaryType {
        column: &'static str,
        found: DataType,
    },

    #[error("row {row} out of bounds for batch of {rows} rows")]
    RowOutOfBounds { row: usize, rows: usize },

    #[error(transparent)]
    InvalidKind(#[from] UnknownVariant),
}

/// A string column, dictionary encoded or plain.
pub enum ColumnView<'a> {
    Dictionary {
        array: &'a dyn AnyDictionaryArray,
        keys: Vec<usize>,
        values: &'a StringArray,
    },
    Plain(&'a StringArray),
}

impl<'a> ColumnView<'a> {
    /// Resolve the representation of `array`. Dictionaries are only accepted
    /// when `allow_dictionary` is set and must hold strings.
    pub fn try_new(
        array: &'a dyn Array,
        column: &'static str,
        allow_dictionary: bool,
    ) -> Result<Self, DecodeError> {
        if let Some(dict) = array.as_any_dictionary_opt() {
            if !allow_dictionary {
                return Err(DecodeError::UnexpectedType {
                    column,
                    found: array.data_type().clone(),
                });
            }
            let values = dict.values().as_string_opt::<i32>().ok_or_else(|| {
                DecodeError::UnexpectedDictionaryType {
                    column,
                    found: dict.values().data_type().clone(),
                }
            })?;
            return Ok(ColumnView::Dictionary {
                array: dict,
                keys: dict.normalized_keys(),
                values,
            });
        }

        array
            .as_string_opt::<i32>()
            .map(ColumnView::Plain)
            .ok_or_else(|| DecodeError::UnexpectedType {
                column,
                found: array.data_type().clone(),
            })
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self, ColumnView::Dictionary { .. })
    }

    /// The string at `row`, or `None` when the cell (or the dictionary entry
    /// it points at) is null.
    pub fn value_at(&self, row: usize) -> Option<&'a str> {
        match self {
            ColumnView::Plain(values) => {
                let values: &'a StringArray = *values;
                (!values.is_null(row)).then(|| values.value(row))
            }
            ColumnView::Dictionary {
                array,
                keys,
                values,
            } => {
                if array.is_null(row) {
                    return None;
                }
                let values: &'a StringArray = *values;
                let key = *keys.get(row)?;
                (key < values.len() && !values.is_null(key)).then(|| values.value(key))
            }
        }
    }
}

enum TypedColumn<'a> {
    Text(ColumnView<'a>),
    Int64(&'a Int64Array),
}

struct DecodedColumn<'a> {
    column: InteractionColumn,
    array: &'a dyn Array,
    typed: Result<TypedColumn<'a>, DecodeError>,
}

/// Decodes rows of one batch. Build it once per batch, then call
/// [`decode_row`](Self::decode_row) for each row.
pub struct BatchDecoder<'a> {
    columns: Vec<DecodedColumn<'a>>,
    rows: usize,
}

impl<'a> BatchDecoder<'a> {
    pub fn new(batch: &'a RecordBatch) -> Self {
        let schema = batch.schema_ref();
        let mut columns = Vec::with_capacity(batch.num_columns());

        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            let Some(column) = InteractionColumn::from_name(field.name()) else {
                warn!("Unhandled column '{}' during decode, ignoring", field.name());
                continue;
            };
            let array = array.as_ref();
            columns.push(DecodedColumn {
                column,
                array,
                typed: resolve(column, array),
            });
        }

        Self {
            columns,
            rows: batch.num_rows(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn decode_row(&self, row: usize) -> Result<InteractionRecord, DecodeError> {
        if row >= self.rows {
            return Err(DecodeError::RowOutOfBounds {
                row,
                rows: self.rows,
            });
        }

        let mut record = InteractionRecord::default();
        for decoded in &self.columns {
            if decoded.array.is_null(row) {
                continue;
            }
            match decoded.typed.as_ref().map_err(Clone::clone)? {
                TypedColumn::Text(view) => {
                    let Some(value) = view.value_at(row) else {
                        continue;
                    };
                    assign_text(&mut record, decoded.column, value)?;
                }
                TypedColumn::Int64(values) => record.timestamp = values.value(row),
            }
        }
        Ok(record)
    }
}

fn resolve(column: InteractionColumn, array: &dyn Array) -> Result<TypedColumn<'_>, DecodeError> {
    let name = column.name();
    match column {
        InteractionColumn::ActorId | InteractionColumn::TargetId | InteractionColumn::Kind => {
            ColumnView::try_new(array, name, true).map(TypedColumn::Text)
        }
        InteractionColumn::Message => ColumnView::try_new(array, name, false).map(TypedColumn::Text),
        InteractionColumn::Timestamp => array
            .as_primitive_opt::<Int64Type>()
            .map(TypedColumn::Int64)
            .ok_or_else(|| DecodeError::UnexpectedType {
                column: name,
                found: array.data_type().clone(),
            }),
    }
}

fn assign_text(
    record: &mut InteractionRecord,
    column: InteractionColumn,
    value: &str,
) -> Result<(), DecodeError> {
    match column {
        InteractionColumn::ActorId => record.actor_id = value.to_string(),
        InteractionColumn::TargetId => record.target_id = value.to_string(),
        InteractionColumn::Message => record.message = value.to_string(),
        InteractionColumn::Kind => {
            record.kind = if value.is_empty() {
                InteractionKind::Unspecified
            } else {
                value.parse()?
            };
        }
        // Resolved as an integer column.
        InteractionColumn::Timestamp => {}
    }
    Ok(())
}

/// Decode a single row. Prefer [`BatchDecoder`] when decoding many rows.
pub fn decode(batch: &RecordBatch, row: usize) -> Result<InteractionRecord, DecodeError> {
    BatchDecoder::new(batch).decode_row(row)
}
