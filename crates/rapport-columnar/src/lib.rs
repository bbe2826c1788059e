//! A small in-process columnar engine built on arrow.
//!
//! The interaction store only relies on the boundary defined here: table
//! creation with per-column encoding hints, context-bound row appends, and
//! context-bound scans that deliver scoped [`Batch`]es to a callback.

pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod predicate;
pub mod schema;
pub mod table;
pub mod value;
pub mod wal;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

pub use batch::{Batch, BatchTracker};
pub use config::EngineConfig;
pub use context::ExecContext;
pub use error::{EngineError, EngineResult};
pub use predicate::{ColumnRef, Predicate, col};
pub use schema::{ColumnDef, Encoding, LogicalType, TableSchema};
pub use table::{ColumnarTable, Table};
pub use value::{Row, Value};

use crate::wal::Wal;

/// Process-wide handle owning every table of one database.
pub struct ColumnStore {
    config: EngineConfig,
    tables: RwLock<HashMap<String, Arc<Table>>>,
    wal: Option<Arc<Wal>>,
    tracker: BatchTracker,
}

impl ColumnStore {
    pub fn open(config: EngineConfig) -> EngineResult<Self> {
        if let Some(dir) = &config.storage_dir {
            std::fs::create_dir_all(dir).map_err(|source| EngineError::Storage {
                path: dir.clone(),
                source,
            })?;
        }

        let wal = match config.wal_path() {
            Some(path) => Some(Arc::new(Wal::open(&path)?)),
            None => None,
        };

        info!(
            "Column store '{}' opened ({}, granule size {})",
            config.database,
            if wal.is_some() { "durable" } else { "in-memory" },
            config.granule_rows
        );

        Ok(Self {
            config,
            tables: RwLock::new(HashMap::new()),
            wal,
            tracker: BatchTracker::default(),
        })
    }

    /// A store with no persistence, mostly for tests.
    pub fn in_memory(database: impl Into<String>) -> Self {
        Self {
            config: EngineConfig::new(database).with_wal(false),
            tables: RwLock::new(HashMap::new()),
            wal: None,
            tracker: BatchTracker::default(),
        }
    }

    /// Create `name`, or return it if it already exists with the same schema.
    /// Rows in the write-ahead log for this table are replayed on creation.
    pub fn create_table(&self, name: &str, schema: TableSchema) -> EngineResult<Arc<Table>> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| EngineError::LockPoisoned(format!("table registry: {}", e)))?;

        if let Some(existing) = tables.get(name) {
            if existing.schema() != &schema {
                return Err(EngineError::SchemaMismatch {
                    table: name.to_string(),
                });
            }
            return Ok(existing.clone());
        }

        let table = Arc::new(Table::new(
            name,
            schema,
            self.config.granule_rows,
            self.wal.clone(),
            self.tracker.clone(),
        ));

        if let Some(wal) = &self.wal {
            let rows = wal.replay(name)?;
            if !rows.is_empty() {
                info!("Replaying {} logged rows into '{}'", rows.len(), name);
            }
            table.restore(rows)?;
        }

        info!(
            "Table '{}' ready (sort key: {})",
            name,
            table.schema().sort_key_names().join(", ")
        );
        tables.insert(name.to_string(), table.clone());
        Ok(table)
    }

    pub fn table(&self, name: &str) -> EngineResult<Arc<Table>> {
        let tables = self
            .tables
            .read()
            .map_err(|e| EngineError::LockPoisoned(format!("table registry: {}", e)))?;
        tables
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::TableNotFound(name.to_string()))
    }

    /// Batches delivered by scans and not yet dropped.
    pub fn outstanding_batches(&self) -> usize {
        self.tracker.outstanding()
    }
}
