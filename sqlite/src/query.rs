//! Per-session statement cache.
//!
//! Each record type has four fixed statements: insert-or-replace,
//! delete-by-key, get-by-key and get-all. Their SQL text is built once per
//! `(record type, operation)` pair and compiled through the connection's
//! prepared statement cache, so repeated calls skip both SQL generation
//! and compilation.
//!
//! When the reconciler changes a table, [`StatementCache::invalidate`]
//! drops the SQL built for it and flushes the compiled handles.

use std::any::TypeId;
use std::collections::HashMap;

use rowmap_core::{Record, TableShape};
use rusqlite::{CachedStatement, Connection};
use tracing::debug;

use crate::error::Result;
use crate::schema::{delete_sql, get_all_sql, get_sql, insert_sql};

/// The statements a session runs against a record table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Operation {
    Insert,
    Delete,
    Get,
    GetAll,
}

impl Operation {
    fn sql(self, shape: &TableShape) -> String {
        match self {
            Operation::Insert => insert_sql(shape),
            Operation::Delete => delete_sql(shape),
            Operation::Get => get_sql(shape),
            Operation::GetAll => get_all_sql(shape),
        }
    }
}

#[derive(Debug)]
struct PreparedQuery {
    table: String,
    sql: String,
}

/// SQL text per `(TypeId, Operation)`, owned by one session.
#[derive(Debug, Default)]
pub(crate) struct StatementCache {
    queries: HashMap<(TypeId, Operation), PreparedQuery>,
}

impl StatementCache {
    /// Returns the compiled statement for `op` on record type `T`.
    pub(crate) fn prepare<'c, T: Record>(
        &mut self,
        conn: &'c Connection,
        shape: &TableShape,
        op: Operation,
    ) -> Result<CachedStatement<'c>> {
        let query = self
            .queries
            .entry((TypeId::of::<T>(), op))
            .or_insert_with(|| {
                let sql = op.sql(shape);
                debug!(table = shape.table(), ?op, %sql, "built statement");
                PreparedQuery {
                    table: shape.table().to_string(),
                    sql,
                }
            });
        Ok(conn.prepare_cached(&query.sql)?)
    }

    /// Forgets every statement on `table` and flushes compiled handles.
    pub(crate) fn invalidate(&mut self, conn: &Connection, table: &str) {
        let before = self.queries.len();
        self.queries.retain(|_, query| query.table != table);
        conn.flush_prepared_statement_cache();
        debug!(
            table,
            evicted = before - self.queries.len(),
            "invalidated statements"
        );
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.queries.len()
    }
}
