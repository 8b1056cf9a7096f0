//! Record types and table shapes for rowmap.
//!
//! This crate defines how a Rust type is mapped onto a single relational
//! table, independently of any storage engine:
//!
//! - [`Record`] — the trait implemented by persisted types (serde derives
//!   plus a primary key name).
//! - [`FieldDescriptor`] / [`LogicalType`] — the desired shape of one
//!   column.
//! - [`TableShape`] — the ordered, validated descriptor set of a record.
//! - [`describe`] — derives a [`TableShape`] from a record's serde derive.
//! - [`ShapeRegistry`] — caches derived shapes per type.
//! - [`Timestamp`] — a time value stored as float seconds.
//!
//! Structural problems are reported as [`ConfigError`] before any database
//! is touched.
//!
//! # Example
//!
//! ```
//! use rowmap_core::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Reading {
//!     sensor: String,
//!     value: f64,
//!     taken_at: Timestamp,
//!     note: Option<String>,
//! }
//!
//! impl Record for Reading {
//!     type Key = String;
//!     const PRIMARY_KEY: &'static str = "sensor";
//!     fn primary_key(&self) -> &String {
//!         &self.sensor
//!     }
//! }
//!
//! let shape = describe::<Reading>().unwrap();
//! assert_eq!(shape.table(), "Reading");
//! assert_eq!(shape.field("taken_at").unwrap().logical_type, LogicalType::Real);
//! assert!(shape.field("note").unwrap().nullable);
//! ```

mod extract;
mod registry;
mod timestamp;
mod types;
mod validate;

pub use extract::describe;
pub use registry::ShapeRegistry;
pub use timestamp::Timestamp;
pub use types::*;
pub use validate::{ConfigError, validate_identifier};
