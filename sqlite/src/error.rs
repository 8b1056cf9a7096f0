//! Error types for record storage.
//!
//! [`StoreError`] is returned by every public operation. Structural record
//! problems arrive as [`StoreError::Configuration`] and are never worth
//! retrying; everything else is a runtime failure of the engine or of the
//! row codec.

use rowmap_core::ConfigError;
use thiserror::Error;

use crate::codec::CodecError;

/// Errors that can occur while storing or loading records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite reported a non-success status.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The record type cannot be mapped onto a table.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A value could not be bound to or read from a statement.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Reconciling the table would drop existing rows and the migration
    /// policy forbids it.
    #[error("destructive migration of table {table} refused: {pending}")]
    DestructiveMigrationRefused {
        /// Table that would have been reset.
        table: String,
        /// Summary of the delta that has no data-preserving path.
        pending: String,
    },

    /// Configuration file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl StoreError {
    /// Returns `true` for structural record errors, including values the
    /// codec refuses to map onto columns.
    pub fn is_configuration(&self) -> bool {
        match self {
            StoreError::Configuration(_) => true,
            StoreError::Codec(err) => err.is_configuration(),
            _ => false,
        }
    }
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
