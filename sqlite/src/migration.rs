//! Schema reconciliation for record tables.
//!
//! [`reconcile`] compares the live columns of a table with the desired
//! [`TableShape`] and applies the least destructive DDL that makes them
//! match:
//!
//! 1. a missing table is created;
//! 2. compatible type changes and column removals rebuild the table through
//!    a `_tmp_<table>` copy, keeping every retained column's data;
//! 3. new nullable columns are added with `ALTER TABLE .. ADD COLUMN`;
//! 4. anything else drops and recreates the table empty, if the
//!    [`MigrationPolicy`] allows it.
//!
//! The whole plan is computed from the in-memory delta before any DDL runs,
//! so a refused reset leaves the table untouched.
//!
//! # Example
//!
//! ```
//! use rowmap_core::{FieldDescriptor, LogicalType, TableShape};
//! use rowmap_sqlite::{MigrationPolicy, reconcile};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open_in_memory().unwrap();
//! let shape = TableShape::new(
//!     "Item",
//!     vec![FieldDescriptor::new("id", LogicalType::Text, false).primary_key()],
//! )
//! .unwrap();
//!
//! let report = reconcile(&conn, &shape, &MigrationPolicy::default()).unwrap();
//! assert!(!report.is_noop());
//!
//! // Nothing left to do
//! let report = reconcile(&conn, &shape, &MigrationPolicy::default()).unwrap();
//! assert!(report.is_noop());
//! ```

use rowmap_core::{FieldDescriptor, TableShape};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::MigrationPolicy;
use crate::error::{Result, StoreError};
use crate::schema::{
    TABLE_INFO_SQL, add_column_sql, copy_rows_sql, create_named_table_sql, create_table_sql,
    drop_table_sql, rename_table_sql, temp_table_name,
};

/// A column as it currently exists in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveColumn {
    /// Column name.
    pub name: String,
    /// Declared type, as written in the table definition.
    pub stored_type: String,
    /// Whether the column carries a `NOT NULL` constraint.
    pub not_null: bool,
    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,
}

impl LiveColumn {
    /// Returns `true` if the column already matches `field`.
    pub fn matches(&self, field: &FieldDescriptor) -> bool {
        self.stored_type
            .eq_ignore_ascii_case(field.logical_type.sql_type())
            && self.not_null != field.nullable
            && self.is_primary_key == field.is_primary_key
    }
}

/// A same-name column whose definition differs from the desired field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    /// The live column.
    pub from: LiveColumn,
    /// The desired field.
    pub to: FieldDescriptor,
}

impl FieldChange {
    /// Returns `true` if existing values can be copied into the new
    /// definition.
    ///
    /// Primary key changes and tightening a nullable column to `NOT NULL`
    /// are never compatible. Otherwise the declared types must be equal, or
    /// both be numeric (`INTEGER`/`REAL`).
    pub fn is_compatible(&self) -> bool {
        if self.from.is_primary_key || self.to.is_primary_key {
            return false;
        }
        if !self.to.nullable && !self.from.not_null {
            return false;
        }
        let to = self.to.logical_type.sql_type();
        if self.from.stored_type.eq_ignore_ascii_case(to) {
            return true;
        }
        is_numeric_type(&self.from.stored_type) && self.to.logical_type.is_numeric()
    }
}

fn is_numeric_type(declared: &str) -> bool {
    declared.eq_ignore_ascii_case("INTEGER") || declared.eq_ignore_ascii_case("REAL")
}

/// Difference between the live columns of a table and a desired shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDelta {
    /// Desired fields with no live column.
    pub to_add: Vec<FieldDescriptor>,
    /// Live columns with no desired field.
    pub to_remove: Vec<LiveColumn>,
    /// Same-name columns whose definition differs.
    pub to_change: Vec<FieldChange>,
}

impl SchemaDelta {
    /// Matches live columns and desired fields by name.
    pub fn compute(live: &[LiveColumn], desired: &[FieldDescriptor]) -> Self {
        let mut delta = SchemaDelta::default();
        for field in desired {
            match live.iter().find(|c| c.name == field.name) {
                None => delta.to_add.push(field.clone()),
                Some(column) if !column.matches(field) => delta.to_change.push(FieldChange {
                    from: column.clone(),
                    to: field.clone(),
                }),
                Some(_) => {}
            }
        }
        delta.to_remove = live
            .iter()
            .filter(|c| !desired.iter().any(|f| f.name == c.name))
            .cloned()
            .collect();
        delta
    }

    /// Returns `true` if the table already matches.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty() && self.to_change.is_empty()
    }

    /// Turns every incompatible change into a removal plus an addition.
    fn isolate_incompatible(&mut self, table: &str) {
        let (compatible, incompatible): (Vec<_>, Vec<_>) =
            self.to_change.drain(..).partition(FieldChange::is_compatible);
        self.to_change = compatible;
        for change in incompatible {
            debug!(table, column = %change.to.name, "isolated incompatible column change");
            self.to_remove.push(change.from);
            self.to_add.push(change.to);
        }
    }

    /// One-line summary, e.g. `add [a]; remove [b]; change [c]`.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.to_add.is_empty() {
            parts.push(format!("add [{}]", join_names(self.to_add.iter().map(|f| f.name.as_str()))));
        }
        if !self.to_remove.is_empty() {
            parts.push(format!(
                "remove [{}]",
                join_names(self.to_remove.iter().map(|c| c.name.as_str()))
            ));
        }
        if !self.to_change.is_empty() {
            parts.push(format!(
                "change [{}]",
                join_names(self.to_change.iter().map(|c| c.to.name.as_str()))
            ));
        }
        parts.join("; ")
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

/// One DDL step applied by [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum MigrationStep {
    /// The table did not exist and was created.
    CreateTable {
        /// Created columns, in declaration order.
        columns: Vec<String>,
    },
    /// A nullable column was appended.
    AddColumn {
        /// Added column.
        column: String,
    },
    /// The table was copied into a new definition.
    Rebuild {
        /// Columns whose data was carried over.
        retained: Vec<String>,
        /// Columns dropped with their data.
        dropped: Vec<String>,
    },
    /// The table was dropped and recreated empty.
    Reset {
        /// Columns of the discarded table.
        discarded: Vec<String>,
    },
}

/// Outcome of reconciling one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Reconciled table.
    pub table: String,
    /// Applied steps, in order. Empty when the table already matched.
    pub steps: Vec<MigrationStep>,
}

impl MigrationReport {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            steps: Vec::new(),
        }
    }

    /// Returns `true` if no DDL was executed.
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns `true` if existing rows were discarded.
    pub fn is_destructive(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s, MigrationStep::Reset { .. }))
    }
}

/// Reads the live columns of `table`, or `None` if it does not exist.
pub fn live_columns(conn: &Connection, table: &str) -> Result<Option<Vec<LiveColumn>>> {
    let mut stmt = conn.prepare(TABLE_INFO_SQL)?;
    let columns = stmt
        .query_map([table], |row| {
            Ok(LiveColumn {
                name: row.get(0)?,
                stored_type: row.get(1)?,
                not_null: row.get(2)?,
                is_primary_key: row.get::<_, i64>(3)? != 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((!columns.is_empty()).then_some(columns))
}

/// A step decided from the delta, before anything is executed.
#[derive(Debug)]
enum Planned {
    Rebuild {
        retained: Vec<String>,
        dropped: Vec<String>,
    },
    AddColumn(FieldDescriptor),
    Reset,
}

fn plan(mut delta: SchemaDelta, desired: &[FieldDescriptor], table: &str) -> Vec<Planned> {
    let mut steps = Vec::new();
    while !delta.is_empty() {
        delta.isolate_incompatible(table);

        let removes_key = delta.to_remove.iter().any(|c| c.is_primary_key);
        let retained: Vec<String> = desired
            .iter()
            .filter(|f| !delta.to_add.iter().any(|a| a.name == f.name))
            .map(|f| f.name.clone())
            .collect();

        if (!delta.to_change.is_empty() || !delta.to_remove.is_empty())
            && !removes_key
            && !retained.is_empty()
        {
            steps.push(Planned::Rebuild {
                retained,
                dropped: delta.to_remove.drain(..).map(|c| c.name).collect(),
            });
            delta.to_change.clear();
        } else if let Some(index) = delta
            .to_add
            .iter()
            .position(|f| f.nullable && !f.is_primary_key)
        {
            steps.push(Planned::AddColumn(delta.to_add.remove(index)));
        } else {
            // A reset replaces the whole table, so earlier steps are moot.
            steps.clear();
            steps.push(Planned::Reset);
            break;
        }
    }
    steps
}

/// Brings `table` in line with `shape`.
///
/// Idempotent: reconciling an already matching table executes no DDL and
/// returns an empty report.
///
/// # Errors
///
/// Returns [`StoreError::DestructiveMigrationRefused`] if only a reset
/// would reconcile the table and `policy` forbids it; the table is left
/// untouched. Engine failures are propagated; steps already applied stay
/// applied, and each rebuild is all-or-nothing.
pub fn reconcile(
    conn: &Connection,
    shape: &TableShape,
    policy: &MigrationPolicy,
) -> Result<MigrationReport> {
    let table = shape.table();
    let mut report = MigrationReport::new(table);

    let Some(live) = live_columns(conn, table)? else {
        conn.flush_prepared_statement_cache();
        conn.execute_batch(&create_table_sql(shape))?;
        info!(table, "created table");
        report.steps.push(MigrationStep::CreateTable {
            columns: shape.column_names().map(String::from).collect(),
        });
        return Ok(report);
    };

    let delta = SchemaDelta::compute(&live, shape.fields());
    if delta.is_empty() {
        return Ok(report);
    }
    let pending = delta.summary();
    let steps = plan(delta, shape.fields(), table);

    if steps.iter().any(|s| matches!(s, Planned::Reset)) && !policy.allow_destructive {
        return Err(StoreError::DestructiveMigrationRefused {
            table: table.to_string(),
            pending,
        });
    }

    conn.flush_prepared_statement_cache();
    for step in steps {
        let step = match step {
            Planned::Rebuild { retained, dropped } => {
                rebuild(conn, shape, &retained)?;
                info!(table, ?retained, ?dropped, "rebuilt table");
                MigrationStep::Rebuild { retained, dropped }
            }
            Planned::AddColumn(field) => {
                conn.execute_batch(&add_column_sql(table, &field))?;
                info!(table, column = %field.name, "added column");
                MigrationStep::AddColumn { column: field.name }
            }
            Planned::Reset => {
                let discarded: Vec<String> = live.iter().map(|c| c.name.clone()).collect();
                warn!(table, ?discarded, %pending, "no data-preserving migration; recreating table empty");
                let tx = conn.unchecked_transaction()?;
                tx.execute_batch(&drop_table_sql(table))?;
                tx.execute_batch(&create_table_sql(shape))?;
                tx.commit()?;
                MigrationStep::Reset { discarded }
            }
        };
        report.steps.push(step);
    }
    Ok(report)
}

/// Copies `retained` columns into a fresh definition of the table.
fn rebuild(conn: &Connection, shape: &TableShape, retained: &[String]) -> Result<()> {
    let table = shape.table();
    let temp = temp_table_name(table);
    let fields: Vec<FieldDescriptor> = shape
        .fields()
        .iter()
        .filter(|f| retained.contains(&f.name))
        .cloned()
        .collect();
    let columns: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();

    with_foreign_keys_off(conn, || {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(&drop_table_sql(&temp))?;
        tx.execute_batch(&create_named_table_sql(&temp, &fields))?;
        tx.execute_batch(&copy_rows_sql(table, &temp, &columns))?;
        tx.execute_batch(&drop_table_sql(table))?;
        tx.execute_batch(&rename_table_sql(&temp, table))?;
        tx.commit()?;
        Ok(())
    })
}

fn with_foreign_keys_off<T>(conn: &Connection, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let enabled: bool = conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
    if enabled {
        conn.pragma_update(None, "foreign_keys", false)?;
    }
    let result = f();
    if enabled {
        let restored = conn.pragma_update(None, "foreign_keys", true);
        return match (result, restored) {
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => Err(err.into()),
            (Ok(value), Ok(())) => Ok(value),
        };
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmap_core::LogicalType;

    fn key() -> FieldDescriptor {
        FieldDescriptor::new("id", LogicalType::Text, false).primary_key()
    }

    fn shape(fields: Vec<FieldDescriptor>) -> TableShape {
        TableShape::new("Item", fields).unwrap()
    }

    fn permissive() -> MigrationPolicy {
        MigrationPolicy::default()
    }

    fn strict() -> MigrationPolicy {
        MigrationPolicy {
            allow_destructive: false,
        }
    }

    fn columns(conn: &Connection) -> Vec<LiveColumn> {
        live_columns(conn, "Item").unwrap().unwrap()
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row(r#"SELECT count(*) FROM "Item""#, [], |r| r.get(0))
            .unwrap()
    }

    fn live(name: &str, stored_type: &str, not_null: bool) -> LiveColumn {
        LiveColumn {
            name: name.into(),
            stored_type: stored_type.into(),
            not_null,
            is_primary_key: false,
        }
    }

    #[test]
    fn test_compatibility() {
        let change = |from: LiveColumn, to: FieldDescriptor| FieldChange { from, to };

        // Numeric widening and narrowing
        assert!(change(live("v", "INTEGER", true), FieldDescriptor::new("v", LogicalType::Real, false)).is_compatible());
        assert!(change(live("v", "real", true), FieldDescriptor::new("v", LogicalType::Integer, false)).is_compatible());
        // Relaxing nullability
        assert!(change(live("v", "TEXT", true), FieldDescriptor::new("v", LogicalType::Text, true)).is_compatible());
        // Tightening nullability
        assert!(!change(live("v", "TEXT", false), FieldDescriptor::new("v", LogicalType::Text, false)).is_compatible());
        // Unrelated types
        assert!(!change(live("v", "TEXT", true), FieldDescriptor::new("v", LogicalType::Integer, false)).is_compatible());
        assert!(!change(live("v", "BOOLEAN", true), FieldDescriptor::new("v", LogicalType::Integer, false)).is_compatible());
        // Primary keys
        let mut from = live("v", "TEXT", true);
        from.is_primary_key = true;
        assert!(!change(from, FieldDescriptor::new("v", LogicalType::Text, false)).is_compatible());
    }

    #[test]
    fn test_delta_compute() {
        let live = vec![
            LiveColumn {
                name: "id".into(),
                stored_type: "TEXT".into(),
                not_null: true,
                is_primary_key: true,
            },
            live("count", "INTEGER", true),
            live("old", "TEXT", false),
        ];
        let desired = vec![
            key(),
            FieldDescriptor::new("count", LogicalType::Real, false),
            FieldDescriptor::new("new", LogicalType::Text, true),
        ];
        let delta = SchemaDelta::compute(&live, &desired);
        assert_eq!(delta.to_add.len(), 1);
        assert_eq!(delta.to_add[0].name, "new");
        assert_eq!(delta.to_remove.len(), 1);
        assert_eq!(delta.to_remove[0].name, "old");
        assert_eq!(delta.to_change.len(), 1);
        assert_eq!(delta.to_change[0].to.name, "count");
        assert_eq!(delta.summary(), "add [new]; remove [old]; change [count]");
    }

    #[test]
    fn test_create_then_noop() {
        let conn = Connection::open_in_memory().unwrap();
        let shape = shape(vec![key(), FieldDescriptor::new("n", LogicalType::Integer, false)]);

        let report = reconcile(&conn, &shape, &permissive()).unwrap();
        assert_eq!(
            report.steps,
            vec![MigrationStep::CreateTable {
                columns: vec!["id".into(), "n".into()]
            }]
        );

        let report = reconcile(&conn, &shape, &permissive()).unwrap();
        assert!(report.is_noop());
        assert_eq!(report.table, "Item");
    }

    #[test]
    fn test_add_nullable_column_keeps_rows() {
        let conn = Connection::open_in_memory().unwrap();
        reconcile(&conn, &shape(vec![key()]), &permissive()).unwrap();
        conn.execute(r#"INSERT INTO "Item" VALUES ('a')"#, []).unwrap();

        let v2 = shape(vec![key(), FieldDescriptor::new("note", LogicalType::Text, true)]);
        let report = reconcile(&conn, &v2, &strict()).unwrap();
        assert_eq!(
            report.steps,
            vec![MigrationStep::AddColumn {
                column: "note".into()
            }]
        );
        assert_eq!(count(&conn), 1);
        assert!(reconcile(&conn, &v2, &strict()).unwrap().is_noop());
    }

    #[test]
    fn test_widening_rebuild_keeps_values() {
        let conn = Connection::open_in_memory().unwrap();
        reconcile(
            &conn,
            &shape(vec![key(), FieldDescriptor::new("v", LogicalType::Integer, false)]),
            &permissive(),
        )
        .unwrap();
        conn.execute(r#"INSERT INTO "Item" VALUES ('a', 123)"#, []).unwrap();

        let v2 = shape(vec![key(), FieldDescriptor::new("v", LogicalType::Real, false)]);
        let report = reconcile(&conn, &v2, &strict()).unwrap();
        assert_eq!(
            report.steps,
            vec![MigrationStep::Rebuild {
                retained: vec!["id".into(), "v".into()],
                dropped: vec![],
            }]
        );

        let (value, class): (f64, String) = conn
            .query_row(r#"SELECT "v", typeof("v") FROM "Item""#, [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!(value, 123.0);
        assert_eq!(class, "real");
        assert_eq!(columns(&conn)[1].stored_type, "REAL");
        assert!(live_columns(&conn, "_tmp_Item").unwrap().is_none());
    }

    #[test]
    fn test_removal_rebuild() {
        let conn = Connection::open_in_memory().unwrap();
        reconcile(
            &conn,
            &shape(vec![key(), FieldDescriptor::new("gone", LogicalType::Text, false)]),
            &permissive(),
        )
        .unwrap();
        conn.execute(r#"INSERT INTO "Item" VALUES ('a', 'x')"#, []).unwrap();

        let report = reconcile(&conn, &shape(vec![key()]), &strict()).unwrap();
        assert_eq!(
            report.steps,
            vec![MigrationStep::Rebuild {
                retained: vec!["id".into()],
                dropped: vec!["gone".into()],
            }]
        );
        assert_eq!(columns(&conn).len(), 1);
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_incompatible_change_isolated() {
        let conn = Connection::open_in_memory().unwrap();
        reconcile(
            &conn,
            &shape(vec![key(), FieldDescriptor::new("v", LogicalType::Text, false)]),
            &permissive(),
        )
        .unwrap();
        conn.execute(r#"INSERT INTO "Item" VALUES ('a', 'x')"#, []).unwrap();

        // Text -> optional Integer: the old column is dropped, a new one added
        let v2 = shape(vec![key(), FieldDescriptor::new("v", LogicalType::Integer, true)]);
        let report = reconcile(&conn, &v2, &strict()).unwrap();
        assert_eq!(
            report.steps,
            vec![
                MigrationStep::Rebuild {
                    retained: vec!["id".into()],
                    dropped: vec!["v".into()],
                },
                MigrationStep::AddColumn { column: "v".into() },
            ]
        );
        let value: Option<i64> = conn
            .query_row(r#"SELECT "v" FROM "Item""#, [], |r| r.get(0))
            .unwrap();
        assert_eq!(value, None);
        assert!(!report.is_destructive());
    }

    #[test]
    fn test_required_addition_resets() {
        let conn = Connection::open_in_memory().unwrap();
        reconcile(&conn, &shape(vec![key()]), &permissive()).unwrap();
        conn.execute(r#"INSERT INTO "Item" VALUES ('a')"#, []).unwrap();

        let v2 = shape(vec![key(), FieldDescriptor::new("n", LogicalType::Integer, false)]);
        let report = reconcile(&conn, &v2, &permissive()).unwrap();
        assert!(report.is_destructive());
        assert_eq!(
            report.steps,
            vec![MigrationStep::Reset {
                discarded: vec!["id".into()]
            }]
        );
        assert_eq!(count(&conn), 0);
        assert!(reconcile(&conn, &v2, &permissive()).unwrap().is_noop());
    }

    #[test]
    fn test_reset_refused_leaves_table() {
        let conn = Connection::open_in_memory().unwrap();
        reconcile(&conn, &shape(vec![key()]), &permissive()).unwrap();
        conn.execute(r#"INSERT INTO "Item" VALUES ('a')"#, []).unwrap();

        let v2 = shape(vec![key(), FieldDescriptor::new("n", LogicalType::Integer, false)]);
        let err = reconcile(&conn, &v2, &strict()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DestructiveMigrationRefused { ref table, ref pending }
                if table == "Item" && pending == "add [n]"
        ));
        assert_eq!(columns(&conn).len(), 1);
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_primary_key_change_resets() {
        let conn = Connection::open_in_memory().unwrap();
        reconcile(
            &conn,
            &shape(vec![key(), FieldDescriptor::new("other", LogicalType::Text, false)]),
            &permissive(),
        )
        .unwrap();

        let v2 = shape(vec![
            FieldDescriptor::new("id", LogicalType::Text, false),
            FieldDescriptor::new("other", LogicalType::Text, false).primary_key(),
        ]);
        let report = reconcile(&conn, &v2, &permissive()).unwrap();
        assert!(report.is_destructive());
        let live = columns(&conn);
        assert!(live.iter().any(|c| c.name == "other" && c.is_primary_key));
    }

    #[test]
    fn test_rebuild_replaces_stale_temp_table() {
        let conn = Connection::open_in_memory().unwrap();
        reconcile(
            &conn,
            &shape(vec![key(), FieldDescriptor::new("v", LogicalType::Integer, false)]),
            &permissive(),
        )
        .unwrap();
        conn.execute_batch(r#"CREATE TABLE "_tmp_Item" ("junk" TEXT)"#).unwrap();

        let v2 = shape(vec![key(), FieldDescriptor::new("v", LogicalType::Real, false)]);
        reconcile(&conn, &v2, &strict()).unwrap();
        assert!(live_columns(&conn, "_tmp_Item").unwrap().is_none());
        assert!(reconcile(&conn, &v2, &strict()).unwrap().is_noop());
    }

    #[test]
    fn test_foreign_keys_restored_with_original_error() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();

        let err = with_foreign_keys_off(&conn, || -> Result<()> {
            let enabled: bool = conn.pragma_query_value(None, "foreign_keys", |r| r.get(0))?;
            assert!(!enabled);
            conn.execute_batch("SELECT * FROM missing_table")?;
            Ok(())
        })
        .unwrap_err();
        assert!(err.to_string().contains("missing_table"));

        let enabled: bool = conn
            .pragma_query_value(None, "foreign_keys", |r| r.get(0))
            .unwrap();
        assert!(enabled);
    }

    #[test]
    fn test_planned_additions_carry_descriptors() {
        let live = vec![LiveColumn {
            is_primary_key: true,
            ..live("id", "TEXT", true)
        }];
        let desired = vec![
            key(),
            FieldDescriptor::new("note", LogicalType::Text, true),
            FieldDescriptor::new("score", LogicalType::Real, true),
        ];
        let steps = plan(SchemaDelta::compute(&live, &desired), &desired, "Item");
        let added: Vec<&FieldDescriptor> = steps
            .iter()
            .map(|step| match step {
                Planned::AddColumn(field) => field,
                other => panic!("unexpected step {other:?}"),
            })
            .collect();
        assert_eq!(added, vec![&desired[1], &desired[2]]);
    }

    #[test]
    fn test_report_serializes() {
        let report = MigrationReport {
            table: "Item".into(),
            steps: vec![MigrationStep::AddColumn {
                column: "note".into(),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["steps"][0]["step"], "add_column");
        assert_eq!(json["steps"][0]["column"], "note");
    }
}
