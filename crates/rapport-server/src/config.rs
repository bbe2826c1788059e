use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use rapport_columnar::EngineConfig;
use rapport_columnar::config::DEFAULT_GRANULE_ROWS;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub storage_dir: PathBuf,
    pub wal: bool,
    pub granule_rows: usize,
    pub op_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.into());

        let port: u16 = var("RAPPORT_PORT", "8069")
            .parse()
            .context("RAPPORT_PORT")?;
        let wal = match var("RAPPORT_WAL", "true").to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => anyhow::bail!("RAPPORT_WAL: expected a boolean, got '{}'", other),
        };
        let granule_rows: usize = var("RAPPORT_GRANULE_ROWS", &DEFAULT_GRANULE_ROWS.to_string())
            .parse()
            .context("RAPPORT_GRANULE_ROWS")?;
        let timeout_ms: u64 = var("RAPPORT_OP_TIMEOUT_MS", "5000")
            .parse()
            .context("RAPPORT_OP_TIMEOUT_MS")?;

        Ok(Self {
            host: var("RAPPORT_HOST", "0.0.0.0"),
            port,
            database: var("RAPPORT_DB_NAME", "user_interactions_db"),
            storage_dir: var("RAPPORT_STORAGE_DIR", "rapport_data").into(),
            wal,
            granule_rows,
            op_timeout: Duration::from_millis(timeout_ms),
        })
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig::new(self.database.clone())
            .with_storage_dir(self.storage_dir.clone())
            .with_wal(self.wal)
            .with_granule_rows(self.granule_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8069);
        assert_eq!(config.database, "user_interactions_db");
        assert_eq!(config.storage_dir, PathBuf::from("rapport_data"));
        assert!(config.wal);
        assert_eq!(config.granule_rows, 8192);
        assert_eq!(config.op_timeout, Duration::from_secs(5));
    }

    #[test]
    fn overrides_flow_into_engine_config() {
        let config = load(&[
            ("RAPPORT_DB_NAME", "other"),
            ("RAPPORT_STORAGE_DIR", "/tmp/rapport"),
            ("RAPPORT_WAL", "off"),
            ("RAPPORT_GRANULE_ROWS", "16"),
        ])
        .unwrap();
        let engine = config.engine();
        assert_eq!(engine.database, "other");
        assert!(!engine.wal);
        assert_eq!(engine.granule_rows, 16);
        assert_eq!(engine.wal_path(), None);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(load(&[("RAPPORT_PORT", "http")]).is_err());
        assert!(load(&[("RAPPORT_WAL", "maybe")]).is_err());
        assert!(load(&[("RAPPORT_OP_TIMEOUT_MS", "-1")]).is_err());
    }
}
