//! Bidirectional conversion between records and statement rows.
//!
//! The codec walks a value's serde structure:
//!
//! - on the write path ([`bind_record`], [`bind_named`]) every named field
//!   binds to the like-named `$field` parameter of the statement;
//! - on the read path ([`decode_row`], [`decode_rows`]) a record is read
//!   from the current result row with columns looked up by name, and a
//!   sequence of records is the row cursor itself, one step per element.
//!
//! Only scalars and optional scalars are mapped. Numbers travel as `f64`
//! in both directions and are narrowed to the requested width on decode.

mod de;
mod path;
mod ser;

use std::fmt;

use rusqlite::{Rows, Statement};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use self::path::{Frame, ROOT};

/// Errors raised while binding or decoding values.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The statement produced no row to decode.
    #[error("no row available")]
    NoRow,

    /// A required field has no column in the result set.
    #[error("column `{column}` is absent from the result set")]
    ColumnAbsent {
        /// Missing column name.
        column: String,
    },

    /// A column value has the wrong storage class for the requested type.
    #[error("type mismatch at `{path}`: expected {expected}, found {found}")]
    TypeMismatch {
        /// Coding path of the value.
        path: String,
        /// What the record type asked for.
        expected: &'static str,
        /// What the column held.
        found: &'static str,
    },

    /// A numeric column value does not fit the requested type.
    #[error("value {value} at `{path}` is out of range for {target}")]
    OutOfRange {
        /// Coding path of the value.
        path: String,
        /// The stored value.
        value: f64,
        /// Requested Rust type.
        target: &'static str,
    },

    /// A scalar was encoded without an enclosing named field.
    #[error("cannot bind {kind} at `{path}`: only named fields of a record can be bound")]
    RootScalar {
        /// Coding path of the value.
        path: String,
        /// Kind of value.
        kind: &'static str,
    },

    /// A nested structured or sequence value was found below a field.
    #[error("nested {kind} at `{path}` cannot be mapped to a column")]
    Nested {
        /// Coding path of the value.
        path: String,
        /// Kind of nested value.
        kind: &'static str,
    },

    /// A value with no column representation.
    #[error("unsupported {kind} at `{path}`")]
    Unsupported {
        /// Coding path of the value.
        path: String,
        /// Kind of value.
        kind: &'static str,
    },

    /// The record serialized a field its table shape does not declare,
    /// e.g. one marked `#[serde(skip_deserializing)]`.
    #[error("statement has no parameter `${name}`")]
    UnknownParameter {
        /// Field name.
        name: String,
    },

    /// The engine rejected a bind, step or column read.
    #[error("statement error: {0}")]
    Statement(#[from] rusqlite::Error),

    /// Error raised by a `Serialize`/`Deserialize` impl.
    #[error("{0}")]
    Custom(String),
}

impl CodecError {
    /// Returns `true` if the value's shape can never be mapped, as opposed
    /// to a failure caused by the stored data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CodecError::RootScalar { .. }
                | CodecError::Nested { .. }
                | CodecError::Unsupported { .. }
                | CodecError::UnknownParameter { .. }
        )
    }

    pub(crate) fn type_mismatch(path: &Frame<'_>, expected: &'static str, found: &'static str) -> Self {
        CodecError::TypeMismatch {
            path: path.render(),
            expected,
            found,
        }
    }

    pub(crate) fn nested(path: &Frame<'_>, kind: &'static str) -> Self {
        CodecError::Nested {
            path: path.render(),
            kind,
        }
    }

    pub(crate) fn unsupported(path: &Frame<'_>, kind: &'static str) -> Self {
        CodecError::Unsupported {
            path: path.render(),
            kind,
        }
    }
}

impl serde::ser::Error for CodecError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CodecError::Custom(msg.to_string())
    }
}

impl serde::de::Error for CodecError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CodecError::Custom(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        CodecError::ColumnAbsent {
            column: field.to_string(),
        }
    }
}

/// Binds every field of `record` to its `$field` parameter.
///
/// Parameters left unbound by the record read as `NULL`.
pub(crate) fn bind_record<T: Serialize + ?Sized>(
    stmt: &mut Statement<'_>,
    record: &T,
) -> Result<(), CodecError> {
    stmt.clear_bindings();
    record.serialize(ser::RecordEncoder::new(stmt))
}

/// Binds a single value to the `$name` parameter.
pub(crate) fn bind_named<T: Serialize + ?Sized>(
    stmt: &mut Statement<'_>,
    name: &str,
    value: &T,
) -> Result<(), CodecError> {
    value.serialize(ser::ParamEncoder::new(stmt, Frame::field(&ROOT, name)))
}

/// Decodes one record from the next row of the cursor.
///
/// Fails with [`CodecError::NoRow`] if the cursor is exhausted.
pub(crate) fn decode_row<T: DeserializeOwned>(rows: &mut Rows<'_>) -> Result<T, CodecError> {
    T::deserialize(de::CursorDecoder::new(rows))
}

/// Decodes every remaining row of the cursor, in result order.
pub(crate) fn decode_rows<T: DeserializeOwned>(rows: &mut Rows<'_>) -> Result<Vec<T>, CodecError> {
    Vec::<T>::deserialize(de::CursorDecoder::new(rows))
}
