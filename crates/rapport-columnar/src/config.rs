//! Engine configuration.

use std::path::PathBuf;

/// Rows buffered per table before a granule is sealed.
pub const DEFAULT_GRANULE_ROWS: usize = 8192;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Database name; also names the write-ahead log file.
    pub database: String,

    /// Directory for persistent state. `None` keeps everything in memory.
    pub storage_dir: Option<PathBuf>,

    /// Log every append before applying it. Ignored without `storage_dir`.
    pub wal: bool,

    /// Active-buffer size at which rows are sorted and dictionary encoded.
    pub granule_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: "default".into(),
            storage_dir: None,
            wal: true,
            granule_rows: DEFAULT_GRANULE_ROWS,
        }
    }
}

impl EngineConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    pub fn with_wal(mut self, enabled: bool) -> Self {
        self.wal = enabled;
        self
    }

    pub fn with_granule_rows(mut self, rows: usize) -> Self {
        self.granule_rows = rows.max(1);
        self
    }

    /// Path of the write-ahead log, when durability is enabled.
    pub fn wal_path(&self) -> Option<PathBuf> {
        match (&self.storage_dir, self.wal) {
            (Some(dir), true) => Some(dir.join(format!("{}.wal.db", self.database))),
            _ => None,
        }
    }
}
