//! In-memory columnar tables.
//!
//! Rows are appended to an active buffer. Once the buffer holds
//! `granule_rows` rows it is sealed into an immutable arrow `RecordBatch`:
//! rows are ordered by the sort key and each dictionary-hinted column is
//! dictionary encoded when that pays off for the granule. The active buffer is
//! scanned as plain columns. A scan therefore sees a mix of encodings, and
//! readers must not assume one per column.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, DictionaryArray, Int64Array, StringArray,
};
use arrow::compute::filter_record_batch;
use arrow::datatypes::{DataType, Field, Int32Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use tracing::{debug, error, trace};

use crate::batch::{Batch, BatchTracker};
use crate::context::ExecContext;
use crate::error::{EngineError, EngineResult};
use crate::predicate::Predicate;
use crate::schema::{Encoding, LogicalType, TableSchema};
use crate::value::{Row, Value};
use crate::wal::Wal;

/// The surface the interaction store needs from a table.
pub trait ColumnarTable: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> &TableSchema;

    /// Append one row. The row is visible to scans that start afterwards.
    fn append(&self, ctx: &ExecContext, row: Row) -> EngineResult<()>;

    /// Deliver every row matching `filter` in batches. The context is checked
    /// before each batch; an error from `on_batch` stops the scan and is
    /// returned unchanged.
    fn scan(
        &self,
        ctx: &ExecContext,
        filter: Option<&Predicate>,
        on_batch: &mut dyn FnMut(Batch) -> EngineResult<()>,
    ) -> EngineResult<()>;
}

#[derive(Default)]
struct TableState {
    sealed: Vec<RecordBatch>,
    active: Vec<Row>,
}

pub struct Table {
    name: String,
    schema: TableSchema,
    granule_rows: usize,
    state: RwLock<TableState>,
    wal: Option<Arc<Wal>>,
    tracker: BatchTracker,
}

impl Table {
    pub(crate) fn new(
        name: impl Into<String>,
        schema: TableSchema,
        granule_rows: usize,
        wal: Option<Arc<Wal>>,
        tracker: BatchTracker,
    ) -> Self {
        Self {
            name: name.into(),
            schema,
            granule_rows: granule_rows.max(1),
            state: RwLock::new(TableState::default()),
            wal,
            tracker,
        }
    }

    /// Load rows recovered from the log without logging them again.
    pub(crate) fn restore(&self, rows: Vec<Row>) -> EngineResult<()> {
        let mut state = self.write_state()?;
        for row in rows {
            self.validate_row(&row)?;
            self.insert(&mut state, row);
        }
        Ok(())
    }

    pub fn row_count(&self) -> EngineResult<usize> {
        let state = self.read_state()?;
        let sealed: usize = state.sealed.iter().map(|b| b.num_rows()).sum();
        Ok(sealed + state.active.len())
    }

    /// Number of sealed granules.
    pub fn granule_count(&self) -> EngineResult<usize> {
        Ok(self.read_state()?.sealed.len())
    }

    fn read_state(&self) -> EngineResult<std::sync::RwLockReadGuard<'_, TableState>> {
        self.state
            .read()
            .map_err(|e| EngineError::LockPoisoned(format!("table '{}': {}", self.name, e)))
    }

    fn write_state(&self) -> EngineResult<RwLockWriteGuard<'_, TableState>> {
        self.state
            .write()
            .map_err(|e| EngineError::LockPoisoned(format!("table '{}': {}", self.name, e)))
    }

    /// The row is committed once pushed. A granule that fails to seal stays
    /// in the active buffer and is retried on the next insert.
    fn insert(&self, state: &mut TableState, row: Row) {
        state.active.push(row);
        if state.active.len() < self.granule_rows {
            return;
        }
        match self.seal(&mut state.active) {
            Ok(granule) => {
                debug!(
                    "Sealed granule {} of table '{}' ({} rows)",
                    state.sealed.len(),
                    self.name,
                    granule.num_rows()
                );
                state.sealed.push(granule);
            }
            Err(e) => error!("Failed to seal granule of table '{}': {}", self.name, e),
        }
    }

    fn validate_row(&self, row: &Row) -> EngineResult<()> {
        let columns = self.schema.columns();
        if row.len() != columns.len() {
            return Err(self.row_error(format!(
                "expected {} cells, got {}",
                columns.len(),
                row.len()
            )));
        }
        for (cell, col) in row.iter().zip(columns) {
            if cell.is_null() && !col.nullable {
                return Err(self.row_error(format!("column '{}' is not nullable", col.name)));
            }
            if !cell.fits(col.logical_type) {
                return Err(self.row_error(format!(
                    "column '{}' expects {:?}, got {:?}",
                    col.name, col.logical_type, cell
                )));
            }
        }
        Ok(())
    }

    fn row_error(&self, reason: String) -> EngineError {
        EngineError::RowShape {
            table: self.name.clone(),
            reason,
        }
    }

    /// Sort `rows` by the sort key and build a granule, draining `rows` on
    /// success.
    fn seal(&self, rows: &mut Vec<Row>) -> EngineResult<RecordBatch> {
        let key = self.schema.sort_key();
        rows.sort_by(|a, b| {
            key.iter()
                .map(|&idx| a[idx].cmp(&b[idx]))
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        let granule = self.build_batch(rows, true)?;
        rows.clear();
        Ok(granule)
    }

    /// Build a batch from rows. With `encode`, dictionary-hinted columns are
    /// dictionary encoded when at most half of their values are distinct.
    fn build_batch(&self, rows: &[Row], encode: bool) -> EngineResult<RecordBatch> {
        let mut fields = Vec::with_capacity(self.schema.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.schema.len());

        for (idx, col) in self.schema.columns().iter().enumerate() {
            let array: ArrayRef = match col.logical_type {
                LogicalType::Int64 => Arc::new(
                    rows.iter()
                        .map(|r| r[idx].as_i64())
                        .collect::<Int64Array>(),
                ),
                LogicalType::Utf8 => {
                    let cells: Vec<Option<&str>> = rows.iter().map(|r| r[idx].as_str()).collect();
                    if encode && col.encoding == Encoding::Dictionary && worth_dictionary(&cells) {
                        Arc::new(cells.into_iter().collect::<DictionaryArray<Int32Type>>())
                    } else {
                        Arc::new(StringArray::from(cells))
                    }
                }
            };
            fields.push(Field::new(&col.name, array.data_type().clone(), col.nullable));
            arrays.push(array);
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }

    fn validate_predicate(&self, predicate: &Predicate) -> EngineResult<()> {
        let Predicate::Eq { column, value } = predicate;
        let def = self
            .schema
            .column(column)
            .ok_or_else(|| EngineError::UnknownColumn {
                table: self.name.clone(),
                column: column.clone(),
            })?;
        if !value.fits(def.logical_type) {
            return Err(EngineError::InvalidPredicate {
                column: column.clone(),
                reason: format!("{:?} cannot be compared with {:?}", value, def.logical_type),
            });
        }
        Ok(())
    }
}

fn worth_dictionary(cells: &[Option<&str>]) -> bool {
    let distinct: HashSet<&str> = cells.iter().flatten().copied().collect();
    distinct.len() * 2 <= cells.len()
}

/// Rows of `array` equal to `value`. Null cells and null literals never match.
fn equality_mask(array: &dyn Array, value: &Value) -> EngineResult<BooleanArray> {
    let mask = match (array.data_type(), value) {
        (_, Value::Null) => BooleanArray::from(vec![false; array.len()]),
        (DataType::Utf8, Value::Utf8(wanted)) => array
            .as_string::<i32>()
            .iter()
            .map(|cell| Some(cell == Some(wanted.as_str())))
            .collect(),
        (DataType::Dictionary(key, inner), Value::Utf8(wanted))
            if **key == DataType::Int32 && **inner == DataType::Utf8 =>
        {
            let dict = array.as_dictionary::<Int32Type>();
            let target = dict
                .values()
                .as_string::<i32>()
                .iter()
                .position(|v| v == Some(wanted.as_str()))
                .map(|pos| pos as i32);
            dict.keys()
                .iter()
                .map(|k| Some(target.is_some() && k == target))
                .collect()
        }
        (DataType::Int64, Value::Int64(wanted)) => array
            .as_primitive::<Int64Type>()
            .iter()
            .map(|cell| Some(cell == Some(*wanted)))
            .collect(),
        (other, _) => {
            return Err(EngineError::InvalidPredicate {
                column: String::new(),
                reason: format!("unsupported column type {} for {:?}", other, value),
            });
        }
    };
    Ok(mask)
}

fn apply_filter(batch: &RecordBatch, predicate: &Predicate) -> EngineResult<RecordBatch> {
    let Predicate::Eq { column, value } = predicate;
    let idx = batch
        .schema()
        .index_of(column)
        .map_err(EngineError::from)?;
    let mask = equality_mask(batch.column(idx).as_ref(), value).map_err(|e| match e {
        EngineError::InvalidPredicate { reason, .. } => EngineError::InvalidPredicate {
            column: column.clone(),
            reason,
        },
        other => other,
    })?;
    Ok(filter_record_batch(batch, &mask)?)
}

impl ColumnarTable for Table {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn append(&self, ctx: &ExecContext, row: Row) -> EngineResult<()> {
        ctx.check()?;
        self.validate_row(&row)?;

        let mut state = self.write_state()?;
        // Last point at which the write can be abandoned.
        ctx.check()?;
        if let Some(wal) = &self.wal {
            wal.append(&self.name, &row)?;
        }
        self.insert(&mut state, row);
        Ok(())
    }

    fn scan(
        &self,
        ctx: &ExecContext,
        filter: Option<&Predicate>,
        on_batch: &mut dyn FnMut(Batch) -> EngineResult<()>,
    ) -> EngineResult<()> {
        ctx.check()?;
        if let Some(predicate) = filter {
            self.validate_predicate(predicate)?;
        }

        // Snapshot under the lock, run callbacks without it.
        let mut granules = {
            let state = self.read_state()?;
            let mut granules = state.sealed.clone();
            if !state.active.is_empty() {
                granules.push(self.build_batch(&state.active, false)?);
            }
            granules
        };
        trace!(
            "Scanning {} granules of '{}' with filter {:?}",
            granules.len(),
            self.name,
            filter.map(|p| p.to_string())
        );

        for granule in granules.drain(..) {
            ctx.check()?;
            let selected = match filter {
                Some(predicate) => apply_filter(&granule, predicate)?,
                None => granule,
            };
            if selected.num_rows() == 0 {
                continue;
            }
            on_batch(self.tracker.track(selected))?;
        }
        Ok(())
    }
}
