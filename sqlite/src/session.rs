//! Stores, sessions and the process-wide lock.
//!
//! A [`Store`] is the handle for one database file: it holds the cache of
//! record shapes, the configuration, and the file's readers-writer lock.
//! Locks live in a process-wide registry keyed by canonical path, so every
//! store opened on the same file, and every clone of it, shares one lock.
//!
//! A [`Session`] is one connection opened from a store, for use by one
//! thread at a time. It owns its compiled statements.
//!
//! Inserts, deletes and reconciliation take the lock exclusively; reads
//! take it shared. The lock is held for a whole batch.
//!
//! # Example
//!
//! ```no_run
//! use rowmap_core::Record;
//! use rowmap_sqlite::Store;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Contact {
//!     email: String,
//!     name: String,
//!     age: Option<u8>,
//! }
//!
//! impl Record for Contact {
//!     type Key = String;
//!     const PRIMARY_KEY: &'static str = "email";
//!     fn primary_key(&self) -> &String {
//!         &self.email
//!     }
//! }
//!
//! let store = Store::open("contacts.db");
//! let mut session = store.session().unwrap();
//!
//! session
//!     .insert(&[Contact {
//!         email: "ada@example.com".into(),
//!         name: "Ada".into(),
//!         age: None,
//!     }])
//!     .unwrap();
//!
//! let ada: Option<Contact> = session.get("ada@example.com").unwrap();
//! assert!(ada.is_some());
//!
//! session.delete::<Contact, str, _>(["ada@example.com"]).unwrap();
//! assert!(session.get_all::<Contact>().unwrap().is_empty());
//! ```

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rowmap_core::{Record, ShapeRegistry, TableShape};
use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::codec::{CodecError, bind_named, bind_record, decode_row, decode_rows};
use crate::config::{MigrationPolicy, StoreConfig};
use crate::error::Result;
use crate::migration::{self, MigrationReport};
use crate::query::{Operation, StatementCache};

/// File locks shared by every store in the process.
static FILE_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>> = OnceLock::new();

/// Returns the lock for `path`, creating it on first use.
fn file_lock(path: &Path) -> Arc<RwLock<()>> {
    let mut locks = FILE_LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    locks.entry(lock_key(path)).or_default().clone()
}

// The file may not exist yet, so fall back to its canonical parent.
fn lock_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map(|dir| dir.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

struct StoreInner {
    path: PathBuf,
    config: StoreConfig,
    lock: Arc<RwLock<()>>,
    shapes: ShapeRegistry,
}

/// Handle to one database file.
///
/// Stores opened on the same file share its lock, so sessions from any of
/// them exclude each other's schema changes. Clones also share the shape
/// cache and configuration.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.path)
            .field("config", &self.inner.config)
            .field("shapes", &self.inner.shapes.len())
            .finish()
    }
}

impl Store {
    /// Creates a store for `path` with the default configuration.
    ///
    /// Nothing is opened until [`session`](Self::session) is called.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_config(path, StoreConfig::default())
    }

    /// Creates a store for `path` with an explicit configuration.
    pub fn with_config(path: impl Into<PathBuf>, config: StoreConfig) -> Self {
        let path = path.into();
        let lock = file_lock(&path);
        Self {
            inner: Arc::new(StoreInner {
                path,
                config,
                lock,
                shapes: ShapeRegistry::new(),
            }),
        }
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Configuration shared by every session.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Returns the table shape of `T`, deriving it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`](crate::StoreError::Configuration)
    /// if `T` cannot be mapped onto a table.
    pub fn shape<T: Record>(&self) -> Result<Arc<TableShape>> {
        Ok(self.inner.shapes.shape::<T>()?)
    }

    /// Opens a new connection.
    ///
    /// Applies the busy timeout and statement cache capacity, then sets
    /// the journal mode while holding the write lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`](crate::StoreError::Database) if the
    /// file cannot be opened or configured.
    pub fn session(&self) -> Result<Session> {
        let config = &self.inner.config;
        let conn = Connection::open(&self.inner.path)?;
        conn.busy_timeout(config.busy_timeout())?;
        conn.set_prepared_statement_cache_capacity(config.statement_cache_capacity);

        let journal_mode: String = {
            let _guard = self.write();
            conn.pragma_update_and_check(
                None,
                "journal_mode",
                config.journal_mode.as_pragma(),
                |row| row.get(0),
            )?
        };
        debug!(path = %self.inner.path.display(), %journal_mode, "opened session");

        Ok(Session {
            conn,
            queries: StatementCache::default(),
            store: self.clone(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.inner.lock.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.inner.lock.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One connection to a store's database file.
///
/// Sessions can be moved between threads but not shared.
pub struct Session {
    conn: Connection,
    queries: StatementCache,
    store: Store,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.store.path())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Inserts a batch of records, replacing rows with the same key.
    ///
    /// The table is reconciled with `T` first. The batch runs in one
    /// transaction under the write lock; an empty batch returns
    /// immediately.
    ///
    /// # Errors
    ///
    /// Configuration errors are returned before any table is touched.
    /// Migration, engine and codec failures roll the batch back.
    pub fn insert<T: Record>(&mut self, records: &[T]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let shape = self.store.shape::<T>()?;
        let _guard = self.store.write();
        reconcile_table(
            &self.conn,
            &mut self.queries,
            &shape,
            &self.store.config().migration,
        )?;

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = self
                .queries
                .prepare::<T>(&self.conn, &shape, Operation::Insert)?;
            for record in records {
                bind_record(&mut stmt, record)?;
                stmt.raw_execute()?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Deletes the rows with the given primary keys.
    ///
    /// Returns the number of rows removed. Keys with no row are skipped.
    /// The table must already exist; deletes never reconcile.
    pub fn delete<'k, T, Q, I>(&mut self, keys: I) -> Result<usize>
    where
        T: Record,
        T::Key: Borrow<Q>,
        Q: Serialize + ?Sized + 'k,
        I: IntoIterator<Item = &'k Q>,
    {
        let shape = self.store.shape::<T>()?;
        let key = &shape.primary_key().name;
        let _guard = self.store.write();

        let tx = self.conn.unchecked_transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = self
                .queries
                .prepare::<T>(&self.conn, &shape, Operation::Delete)?;
            for value in keys {
                bind_named(&mut stmt, key, value)?;
                deleted += stmt.raw_execute()?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Loads the record with the given primary key.
    ///
    /// Columns the record does not declare are ignored, and optional
    /// fields with no column read as `None`.
    pub fn get<T, Q>(&mut self, key: &Q) -> Result<Option<T>>
    where
        T: Record,
        T::Key: Borrow<Q>,
        Q: Serialize + ?Sized,
    {
        let shape = self.store.shape::<T>()?;
        let _guard = self.store.read();

        let mut stmt = self
            .queries
            .prepare::<T>(&self.conn, &shape, Operation::Get)?;
        bind_named(&mut stmt, &shape.primary_key().name, key)?;
        let mut rows = stmt.raw_query();
        match decode_row(&mut rows) {
            Ok(record) => Ok(Some(record)),
            Err(CodecError::NoRow) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Loads every record of type `T`, in table order.
    pub fn get_all<T: Record>(&mut self) -> Result<Vec<T>> {
        let shape = self.store.shape::<T>()?;
        let _guard = self.store.read();

        let mut stmt = self
            .queries
            .prepare::<T>(&self.conn, &shape, Operation::GetAll)?;
        let mut rows = stmt.raw_query();
        Ok(decode_rows(&mut rows)?)
    }

    /// Reconciles the table of `T` without inserting anything.
    pub fn reconcile<T: Record>(&mut self) -> Result<MigrationReport> {
        let shape = self.store.shape::<T>()?;
        let _guard = self.store.write();
        reconcile_table(
            &self.conn,
            &mut self.queries,
            &shape,
            &self.store.config().migration,
        )
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// The store this session was opened from.
    pub fn store(&self) -> &Store {
        &self.store
    }
}

fn reconcile_table(
    conn: &Connection,
    queries: &mut StatementCache,
    shape: &TableShape,
    policy: &MigrationPolicy,
) -> Result<MigrationReport> {
    let report = migration::reconcile(conn, shape, policy)?;
    if !report.is_noop() {
        queries.invalidate(conn, shape.table());
    }
    Ok(report)
}
