//! SQL text generation for record tables.
//!
//! Every statement the store runs is generated here from a [`TableShape`]
//! or from a list of [`FieldDescriptor`]s. Identifiers are always emitted
//! double-quoted; record field values are never interpolated, they bind to
//! `$field` parameters named after the column.
//!
//! # Column definitions
//!
//! Each field becomes one column:
//!
//! ```text
//! "name" TEXT NOT NULL PRIMARY KEY
//! "count" INTEGER NOT NULL
//! "note" TEXT
//! ```
//!
//! The declared type is [`LogicalType::sql_type`]; `NOT NULL` is emitted for
//! non-optional fields and `PRIMARY KEY` for the key field.
//!
//! [`LogicalType::sql_type`]: rowmap_core::LogicalType::sql_type

use rowmap_core::{FieldDescriptor, TableShape};

/// Live column metadata, as reported by `pragma_table_info`.
pub(crate) const TABLE_INFO_SQL: &str =
    r#"SELECT "name", "type", "notnull", "pk" FROM pragma_table_info(?1) ORDER BY "cid""#;

/// Quotes an identifier for use in SQL text.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Name of the scratch table used while rebuilding `table`.
pub(crate) fn temp_table_name(table: &str) -> String {
    format!("_tmp_{table}")
}

/// Renders one column definition.
pub(crate) fn column_definition(field: &FieldDescriptor) -> String {
    let mut sql = format!("{} {}", quote_ident(&field.name), field.logical_type.sql_type());
    if !field.nullable {
        sql.push_str(" NOT NULL");
    }
    if field.is_primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    sql
}

fn column_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Generates the `CREATE TABLE` statement for a record shape.
///
/// # Examples
///
/// ```
/// use rowmap_core::{FieldDescriptor, LogicalType, TableShape};
/// use rowmap_sqlite::create_table_sql;
///
/// let shape = TableShape::new(
///     "Item",
///     vec![
///         FieldDescriptor::new("id", LogicalType::Text, false).primary_key(),
///         FieldDescriptor::new("note", LogicalType::Text, true),
///     ],
/// )
/// .unwrap();
/// assert_eq!(
///     create_table_sql(&shape),
///     r#"CREATE TABLE "Item" ("id" TEXT NOT NULL PRIMARY KEY, "note" TEXT)"#
/// );
/// ```
pub fn create_table_sql(shape: &TableShape) -> String {
    create_named_table_sql(shape.table(), shape.fields())
}

/// Generates a `CREATE TABLE` statement under an explicit table name.
pub(crate) fn create_named_table_sql(table: &str, fields: &[FieldDescriptor]) -> String {
    let columns = fields
        .iter()
        .map(column_definition)
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({columns})", quote_ident(table))
}

pub(crate) fn add_column_sql(table: &str, field: &FieldDescriptor) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_ident(table),
        column_definition(field)
    )
}

pub(crate) fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(table))
}

pub(crate) fn rename_table_sql(from: &str, to: &str) -> String {
    format!("ALTER TABLE {} RENAME TO {}", quote_ident(from), quote_ident(to))
}

/// Copies the named columns from one table into another.
pub(crate) fn copy_rows_sql(from: &str, to: &str, columns: &[&str]) -> String {
    let list = column_list(columns.iter().copied());
    format!(
        "INSERT INTO {} ({list}) SELECT {list} FROM {}",
        quote_ident(to),
        quote_ident(from)
    )
}

/// `REPLACE INTO` over every column, binding `$field` parameters.
pub(crate) fn insert_sql(shape: &TableShape) -> String {
    let params = shape
        .column_names()
        .map(|name| format!("${name}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "REPLACE INTO {} ({}) VALUES ({params})",
        quote_ident(shape.table()),
        column_list(shape.column_names())
    )
}

pub(crate) fn delete_sql(shape: &TableShape) -> String {
    let key = &shape.primary_key().name;
    format!(
        "DELETE FROM {} WHERE {} = ${key}",
        quote_ident(shape.table()),
        quote_ident(key)
    )
}

pub(crate) fn get_sql(shape: &TableShape) -> String {
    let key = &shape.primary_key().name;
    format!(
        "SELECT * FROM {} WHERE {} = ${key}",
        quote_ident(shape.table()),
        quote_ident(key)
    )
}

pub(crate) fn get_all_sql(shape: &TableShape) -> String {
    format!("SELECT * FROM {}", quote_ident(shape.table()))
}
