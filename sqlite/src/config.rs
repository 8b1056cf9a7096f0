//! Store configuration.
//!
//! Controls how sessions set up their connection and how far the schema
//! reconciler may go when a record type changes. Every field has a default,
//! so a configuration file only needs to name what it overrides.
//!
//! # Example YAML
//!
//! ```yaml
//! journal_mode: wal
//! busy_timeout_ms: 5000
//! statement_cache_capacity: 32
//! migration:
//!   allow_destructive: false
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// SQLite journal mode applied when a session opens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    /// Write-ahead log. Readers do not block the writer.
    #[default]
    Wal,
    /// Rollback journal, deleted after each transaction.
    Delete,
    /// Rollback journal, truncated after each transaction.
    Truncate,
    /// Rollback journal kept in memory.
    Memory,
}

impl JournalMode {
    /// Value passed to `PRAGMA journal_mode`.
    pub fn as_pragma(self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Memory => "MEMORY",
        }
    }
}

/// Limits on what the schema reconciler may do.
///
/// # Examples
///
/// ```
/// # use rowmap_sqlite::MigrationPolicy;
/// let strict = MigrationPolicy { allow_destructive: false };
/// assert!(!strict.allow_destructive);
/// assert!(MigrationPolicy::default().allow_destructive);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationPolicy {
    /// Allow dropping and recreating a table when no data-preserving
    /// migration exists. Existing rows are lost.
    pub allow_destructive: bool,
}

impl Default for MigrationPolicy {
    fn default() -> Self {
        Self {
            allow_destructive: true,
        }
    }
}

/// Configuration shared by every session of a [`Store`](crate::Store).
///
/// # Examples
///
/// ```no_run
/// use rowmap_sqlite::{Store, StoreConfig};
///
/// let config = StoreConfig::load("rowmap.yml").unwrap();
/// let store = Store::with_config("records.db", config);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Journal mode set on every new connection.
    pub journal_mode: JournalMode,
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Capacity of each connection's prepared statement cache.
    pub statement_cache_capacity: usize,
    /// Schema reconciliation limits.
    pub migration: MigrationPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::default(),
            busy_timeout_ms: 5000,
            statement_cache_capacity: 32,
            migration: MigrationPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::StoreError::Io) if the file cannot be read, or
    /// [`Yaml`](crate::StoreError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::StoreError::Io) if the file cannot be written,
    /// or [`Yaml`](crate::StoreError::Yaml) if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Busy timeout as a [`Duration`].
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.journal_mode, JournalMode::Wal);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.statement_cache_capacity, 32);
        assert!(config.migration.allow_destructive);
    }

    #[test]
    fn test_deserialize_complete() {
        let yaml = r#"
journal_mode: truncate
busy_timeout_ms: 250
statement_cache_capacity: 8
migration:
  allow_destructive: false
"#;
        let config: StoreConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.journal_mode, JournalMode::Truncate);
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.statement_cache_capacity, 8);
        assert!(!config.migration.allow_destructive);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: StoreConfig = serde_yaml::from_str("journal_mode: delete\n").unwrap();
        assert_eq!(config.journal_mode, JournalMode::Delete);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(config.migration.allow_destructive);

        let config: StoreConfig = serde_yaml::from_str("migration: {}\n").unwrap();
        assert!(config.migration.allow_destructive);
    }

    #[test]
    fn test_unknown_journal_mode_rejected() {
        assert!(serde_yaml::from_str::<StoreConfig>("journal_mode: off\n").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rowmap.yml");

        let config = StoreConfig {
            journal_mode: JournalMode::Memory,
            busy_timeout_ms: 100,
            statement_cache_capacity: 4,
            migration: MigrationPolicy {
                allow_destructive: false,
            },
        };
        config.save(&path).unwrap();
        assert_eq!(StoreConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = StoreConfig::load("/nonexistent/rowmap.yml").unwrap_err();
        assert!(matches!(err, crate::StoreError::Io(_)));
    }

    #[test]
    fn test_journal_mode_pragma() {
        assert_eq!(JournalMode::Wal.as_pragma(), "WAL");
        assert_eq!(JournalMode::Memory.as_pragma(), "MEMORY");
    }
}
