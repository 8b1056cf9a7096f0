//! Record and column shape definitions.
//!
//! This module defines the data model shared by the extractor and the
//! storage backends: the [`Record`] trait implemented by persisted types,
//! the [`LogicalType`] of a column, the per-field [`FieldDescriptor`], and
//! the ordered [`TableShape`] derived for a record type.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A flat structured value stored as one row of one table.
///
/// Every serde field of the type maps to one column. Fields must be scalars
/// or optional scalars; nested structs, maps and sequences are rejected
/// when the shape is extracted.
///
/// # Examples
///
/// ```
/// use rowmap_core::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Bookmark {
///     url: String,
///     title: Option<String>,
///     visits: u32,
/// }
///
/// impl Record for Bookmark {
///     type Key = String;
///     const PRIMARY_KEY: &'static str = "url";
///
///     fn primary_key(&self) -> &String {
///         &self.url
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + 'static {
    /// Type of the primary key field.
    type Key: Serialize;

    /// Name of the field used as the primary key.
    const PRIMARY_KEY: &'static str;

    /// Table name override. Defaults to the serde name of the struct.
    const TABLE: Option<&'static str> = None;

    /// Returns the primary key of this record.
    fn primary_key(&self) -> &Self::Key;
}

/// Storage class of a column.
///
/// # Examples
///
/// ```
/// use rowmap_core::LogicalType;
///
/// assert_eq!(LogicalType::Integer.sql_type(), "INTEGER");
/// assert!(LogicalType::Real.is_numeric());
/// assert!(!LogicalType::Text.is_numeric());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LogicalType {
    /// UTF-8 text, opaque identifiers and unit enum variants.
    Text,
    /// Booleans, stored as 0/1.
    Boolean,
    /// Fixed-width signed and unsigned integers.
    Integer,
    /// Floating-point numbers and time values.
    Real,
}

impl LogicalType {
    /// Declared SQL type used in `CREATE TABLE` statements.
    pub fn sql_type(self) -> &'static str {
        match self {
            LogicalType::Text => "TEXT",
            LogicalType::Boolean => "BOOLEAN",
            LogicalType::Integer => "INTEGER",
            LogicalType::Real => "REAL",
        }
    }

    /// Returns `true` for [`Integer`](Self::Integer) and [`Real`](Self::Real).
    pub fn is_numeric(self) -> bool {
        matches!(self, LogicalType::Integer | LogicalType::Real)
    }
}

/// Desired shape of a single column, derived from one record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldDescriptor {
    /// Column name (the serde field name).
    pub name: String,
    /// Storage class.
    pub logical_type: LogicalType,
    /// Whether the field is an `Option`.
    pub nullable: bool,
    /// Whether this is the record's primary key.
    pub is_primary_key: bool,
}

impl FieldDescriptor {
    /// Creates a non-key descriptor.
    pub fn new(name: impl Into<String>, logical_type: LogicalType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable,
            is_primary_key: false,
        }
    }

    /// Marks the descriptor as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }
}

/// Ordered set of field descriptors for one record type.
///
/// Fields keep the declaration order of the record, which is also the
/// column order of created tables and insert statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableShape {
    table: String,
    fields: Vec<FieldDescriptor>,
    primary_key: usize,
}

impl TableShape {
    /// Builds a shape from already validated parts.
    ///
    /// `primary_key` is the index of the key field inside `fields`.
    pub(crate) fn from_parts(
        table: String,
        fields: Vec<FieldDescriptor>,
        primary_key: usize,
    ) -> Self {
        Self {
            table,
            fields,
            primary_key,
        }
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Field descriptors in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// The primary key descriptor.
    pub fn primary_key(&self) -> &FieldDescriptor {
        &self.fields[self.primary_key]
    }

    /// Looks up a field by column name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Iterates over column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}
