//! Structural validation of record shapes.
//!
//! Catches record types that cannot be mapped onto a single table before
//! any database access happens: missing or duplicated fields, a missing
//! primary key, nested values, unsupported scalars, and names that are not
//! usable as SQL identifiers.
//!
//! # Examples
//!
//! ```
//! use rowmap_core::{ConfigError, FieldDescriptor, LogicalType, TableShape};
//!
//! let shape = TableShape::new(
//!     "Item",
//!     vec![
//!         FieldDescriptor::new("id", LogicalType::Text, false).primary_key(),
//!         FieldDescriptor::new("count", LogicalType::Integer, false),
//!     ],
//! )
//! .unwrap();
//! assert_eq!(shape.primary_key().name, "id");
//!
//! // No primary key
//! let err = TableShape::new(
//!     "Item",
//!     vec![FieldDescriptor::new("count", LogicalType::Integer, false)],
//! )
//! .unwrap_err();
//! assert!(matches!(err, ConfigError::PrimaryKeyCount { found: 0, .. }));
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::types::{FieldDescriptor, TableShape};

/// Record shape errors.
///
/// These indicate a programming error in the record type. They are raised
/// before any table is touched and are never worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The record does not deserialize as a struct with named fields.
    #[error("record type {record} is not a struct with named fields (found {found})")]
    NotAStruct {
        /// Rust type name of the record.
        record: &'static str,
        /// What the record's `Deserialize` impl asked for instead.
        found: &'static str,
    },
    /// The record struct declares no fields.
    #[error("record type {table} has no fields")]
    NoFields {
        /// Table name.
        table: String,
    },
    /// Two fields share a column name (e.g. through `#[serde(rename)]`).
    #[error("duplicate field `{field}` in record type {table}")]
    DuplicateField {
        /// Table name.
        table: String,
        /// Duplicated column name.
        field: String,
    },
    /// The record does not have exactly one primary key field.
    #[error("record type {table} must have exactly one primary key field `{key}`, found {found}")]
    PrimaryKeyCount {
        /// Table name.
        table: String,
        /// Declared primary key name.
        key: String,
        /// Number of fields marked as primary key.
        found: usize,
    },
    /// A field holds a nested struct, map, sequence or tuple.
    #[error("field `{field}` of record type {table} is a nested {kind} value")]
    NestedField {
        /// Table name.
        table: String,
        /// Field name.
        field: String,
        /// Kind of nested value.
        kind: &'static str,
    },
    /// A field holds a scalar with no storage mapping.
    #[error("field `{field}` of record type {table} has unsupported type {kind}")]
    UnsupportedType {
        /// Table name.
        table: String,
        /// Field name.
        field: String,
        /// Name of the unsupported scalar.
        kind: &'static str,
    },
    /// A field's `Deserialize` impl failed before requesting any value.
    #[error("cannot determine the type of field `{field}` of record type {table}: {message}")]
    Untraceable {
        /// Table name.
        table: String,
        /// Field name.
        field: String,
        /// Error reported by the field's `Deserialize` impl.
        message: String,
    },
    /// A table or column name is not a plain identifier.
    #[error("invalid identifier '{0}': must contain only ASCII alphanumeric characters and underscores")]
    InvalidIdentifier(String),
}

/// Validates that a table or column name contains only ASCII alphanumeric
/// characters and underscores.
///
/// Names are used both as quoted identifiers and as `$name` statement
/// parameters, so anything else is rejected.
pub fn validate_identifier(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::InvalidIdentifier(name.to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

impl TableShape {
    /// Builds a validated shape.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the table has no fields, a name is not a
    /// valid identifier, a name is duplicated, or the number of primary key
    /// fields is not exactly one.
    pub fn new(table: impl Into<String>, fields: Vec<FieldDescriptor>) -> Result<Self, ConfigError> {
        let table = table.into();
        validate_identifier(&table)?;

        if fields.is_empty() {
            return Err(ConfigError::NoFields { table });
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for field in &fields {
            validate_identifier(&field.name)?;
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigError::DuplicateField {
                    table,
                    field: field.name.clone(),
                });
            }
        }

        let keys: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_primary_key)
            .map(|(i, _)| i)
            .collect();
        if keys.len() != 1 {
            let key = keys
                .first()
                .map(|&i| fields[i].name.clone())
                .unwrap_or_else(|| "<none>".to_string());
            return Err(ConfigError::PrimaryKeyCount {
                table,
                key,
                found: keys.len(),
            });
        }

        Ok(Self::from_parts(table, fields, keys[0]))
    }
}
