//! SQLite-backed write-ahead log.
//!
//! Every accepted row is appended here before it becomes visible in memory.
//! On table creation the logged rows for that table are replayed in sequence
//! order, which rebuilds the granules.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::value::Row;

pub struct Wal {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Wal {
    pub fn open(path: &Path) -> EngineResult<Self> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        run_migrations(&conn)?;

        info!("Write-ahead log opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<F, T>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&Connection) -> EngineResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EngineError::LockPoisoned(format!("WAL connection: {}", e)))?;
        f(&conn)
    }

    pub fn append(&self, table: &str, row: &Row) -> EngineResult<()> {
        let encoded = serde_json::to_string(row)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO wal_rows (table_name, row) VALUES (?1, ?2)",
                (table, encoded.as_str()),
            )?;
            Ok(())
        })
    }

    /// All logged rows of `table`, oldest first.
    pub fn replay(&self, table: &str) -> EngineResult<Vec<Row>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT row FROM wal_rows WHERE table_name = ?1 ORDER BY seq")?;
            let encoded = stmt
                .query_map([table], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            encoded
                .iter()
                .map(|s| serde_json::from_str::<Row>(s).map_err(EngineError::from))
                .collect()
        })
    }

    pub fn row_count(&self, table: &str) -> EngineResult<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM wal_rows WHERE table_name = ?1",
                [table],
                |r| r.get(0),
            )?;
            Ok(n as u64)
        })
    }
}

fn run_migrations(conn: &Connection) -> EngineResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("WAL: running migration v1 (row log)");
        conn.execute_batch(
            "
            CREATE TABLE wal_rows (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                table_name  TEXT NOT NULL,
                row         TEXT NOT NULL
            );

            CREATE INDEX idx_wal_rows_table ON wal_rows(table_name, seq);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
