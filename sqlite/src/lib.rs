//! SQLite persistence for flat record types.
//!
//! Each [`Record`](rowmap_core::Record) type maps to one table whose columns
//! follow the type's fields. The table is created on first insert and kept
//! in line with the type as it evolves: new optional fields are added,
//! compatible type changes rebuild the table with its data, and anything
//! else falls back to an empty table when the [`MigrationPolicy`] allows.
//!
//! # Architecture
//!
//! - **`schema`** — SQL text for tables and the four record statements
//! - **`migration`** — live/desired column comparison and reconciliation
//! - **`codec`** — serde encoder/decoder between records and rows
//! - **`query`** — per-session statement cache
//! - **`session`** — [`Store`] (lock, shapes, config) and [`Session`]
//! - **`config`** — [`StoreConfig`], loadable from YAML
//!
//! # Quick start
//!
//! ```no_run
//! use rowmap_core::Record;
//! use rowmap_sqlite::Store;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Task {
//!     id: u32,
//!     title: String,
//!     done: bool,
//! }
//!
//! impl Record for Task {
//!     type Key = u32;
//!     const PRIMARY_KEY: &'static str = "id";
//!     fn primary_key(&self) -> &u32 {
//!         &self.id
//!     }
//! }
//!
//! let store = Store::open("tasks.db");
//! let mut session = store.session().unwrap();
//! session
//!     .insert(&[Task { id: 1, title: "write docs".into(), done: false }])
//!     .unwrap();
//!
//! for task in session.get_all::<Task>().unwrap() {
//!     println!("{} {}", task.id, task.title);
//! }
//! ```
//!
//! # Errors
//!
//! Every operation returns [`StoreError`]. Structural problems with a record
//! type are reported as [`StoreError::Configuration`] before any table is
//! accessed; [`StoreError::is_configuration`] separates them from runtime
//! failures.

mod codec;
mod config;
mod error;
mod migration;
mod query;
mod schema;
mod session;

pub use codec::CodecError;
pub use config::{JournalMode, MigrationPolicy, StoreConfig};
pub use error::{Result, StoreError};
pub use migration::{
    FieldChange, LiveColumn, MigrationReport, MigrationStep, SchemaDelta, live_columns, reconcile,
};
pub use schema::create_table_sql;
pub use session::{Session, Store};
