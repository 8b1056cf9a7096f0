//! Read path: decoding records from result rows.
//!
//! A sequence at the top level is the row cursor itself; a struct at the top
//! level is the next row. Within a row, fields are looked up by column name
//! and each column is decoded from the value's storage class.

use rusqlite::types::ValueRef;
use rusqlite::{Row, Rows, Statement};
use serde::de::value::StrDeserializer;
use serde::de::{
    DeserializeSeed, Deserializer, IntoDeserializer, MapAccess, SeqAccess, Visitor,
};
use serde::forward_to_deserialize_any;

use super::CodecError;
use super::path::{Frame, ROOT};

/// Decodes from the cursor position of a query.
pub(crate) struct CursorDecoder<'a, 'stmt> {
    rows: &'a mut Rows<'stmt>,
}

impl<'a, 'stmt> CursorDecoder<'a, 'stmt> {
    pub(crate) fn new(rows: &'a mut Rows<'stmt>) -> Self {
        Self { rows }
    }

    fn step(self) -> Result<RowDecoder<'a, 'stmt, 'static>, CodecError> {
        match self.rows.next()? {
            Some(row) => Ok(RowDecoder::new(row, ROOT)),
            None => Err(CodecError::NoRow),
        }
    }
}

impl<'de> Deserializer<'de> for CursorDecoder<'_, '_> {
    type Error = CodecError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        self.step()?.deserialize_any(visitor)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        visitor.visit_seq(RowSequence {
            rows: self.rows,
            index: 0,
        })
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct tuple tuple_struct map struct
        enum identifier ignored_any
    }
}

/// Steps the cursor once per requested element.
struct RowSequence<'a, 'stmt> {
    rows: &'a mut Rows<'stmt>,
    index: usize,
}

impl<'de> SeqAccess<'de> for RowSequence<'_, '_> {
    type Error = CodecError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, CodecError> {
        let index = self.index;
        self.index += 1;
        match self.rows.next()? {
            Some(row) => seed
                .deserialize(RowDecoder::new(row, Frame::index(&ROOT, index)))
                .map(Some),
            None => Ok(None),
        }
    }
}

/// Decodes one row as a struct or map keyed by column name.
struct RowDecoder<'a, 'stmt, 'p> {
    row: &'a Row<'stmt>,
    path: Frame<'p>,
}

impl<'a, 'stmt, 'p> RowDecoder<'a, 'stmt, 'p> {
    fn new(row: &'a Row<'stmt>, path: Frame<'p>) -> Self {
        Self { row, path }
    }
}

impl<'de> Deserializer<'de> for RowDecoder<'_, '_, '_> {
    type Error = CodecError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        let statement: &Statement<'_> = self.row.as_ref();
        visitor.visit_map(RowFields {
            row: self.row,
            columns: statement.column_names(),
            next: 0,
            path: self.path,
        })
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct seq tuple tuple_struct map struct
        enum identifier ignored_any
    }
}

struct RowFields<'a, 'stmt, 'p> {
    row: &'a Row<'stmt>,
    columns: Vec<&'a str>,
    next: usize,
    path: Frame<'p>,
}

impl<'de> MapAccess<'de> for RowFields<'_, '_, '_> {
    type Error = CodecError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, CodecError> {
        let Some(&name) = self.columns.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let key: StrDeserializer<'_, CodecError> = name.into_deserializer();
        seed.deserialize(key).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, CodecError> {
        let index = self
            .next
            .checked_sub(1)
            .ok_or_else(|| CodecError::Custom("column value requested before its name".into()))?;
        let name = self.columns[index];
        let value = self.row.get_ref(index)?;
        seed.deserialize(ColumnDecoder {
            value,
            path: Frame::field(&self.path, name),
        })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.columns.len() - self.next)
    }
}

fn storage_class(value: ValueRef<'_>) -> &'static str {
    match value {
        ValueRef::Null => "null",
        ValueRef::Integer(_) => "integer",
        ValueRef::Real(_) => "real",
        ValueRef::Text(_) => "text",
        ValueRef::Blob(_) => "blob",
    }
}

/// Decodes a single column value.
struct ColumnDecoder<'v, 'p> {
    value: ValueRef<'v>,
    path: Frame<'p>,
}

impl<'v> ColumnDecoder<'v, '_> {
    fn mismatch(&self, expected: &'static str) -> CodecError {
        CodecError::type_mismatch(&self.path, expected, storage_class(self.value))
    }

    fn out_of_range(&self, value: f64, target: &'static str) -> CodecError {
        CodecError::OutOfRange {
            path: self.path.render(),
            value,
            target,
        }
    }

    fn text(&self, expected: &'static str) -> Result<&'v str, CodecError> {
        match self.value {
            ValueRef::Text(bytes) => {
                std::str::from_utf8(bytes).map_err(|_| CodecError::type_mismatch(&self.path, expected, "invalid utf-8"))
            }
            _ => Err(self.mismatch(expected)),
        }
    }

    fn real(&self, expected: &'static str) -> Result<f64, CodecError> {
        match self.value {
            ValueRef::Integer(i) => Ok(i as f64),
            ValueRef::Real(f) => Ok(f),
            _ => Err(self.mismatch(expected)),
        }
    }
}

// Integers are narrowed exactly from INTEGER storage; REAL values are
// truncated toward zero and must land inside the target range. `MAX + 1`
// is a power of two and exact in f64, unlike `MAX` for the 64-bit types.
macro_rules! narrow_integer {
    ($($method:ident => $visit:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
                let target = stringify!($ty);
                let value = match self.value {
                    ValueRef::Integer(i) => {
                        <$ty>::try_from(i).map_err(|_| self.out_of_range(i as f64, target))?
                    }
                    ValueRef::Real(f) => {
                        let truncated = f.trunc();
                        if !truncated.is_finite()
                            || truncated < <$ty>::MIN as f64
                            || truncated >= <$ty>::MAX as f64 + 1.0
                        {
                            return Err(self.out_of_range(f, target));
                        }
                        truncated as $ty
                    }
                    _ => return Err(self.mismatch("integer")),
                };
                visitor.$visit(value)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ColumnDecoder<'_, '_> {
    type Error = CodecError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        match self.value {
            ValueRef::Null => visitor.visit_none(),
            ValueRef::Integer(i) => visitor.visit_i64(i),
            ValueRef::Real(f) => visitor.visit_f64(f),
            ValueRef::Text(_) => visitor.visit_str(self.text("text")?),
            ValueRef::Blob(_) => Err(CodecError::unsupported(&self.path, "blob")),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        match self.value {
            ValueRef::Integer(i) => visitor.visit_bool(i != 0),
            ValueRef::Real(f) => visitor.visit_bool(f != 0.0),
            _ => Err(self.mismatch("boolean")),
        }
    }

    narrow_integer! {
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        let value = self.real("real")?;
        if value.is_finite() && value.abs() > f64::from(f32::MAX) {
            return Err(self.out_of_range(value, "f32"));
        }
        visitor.visit_f32(value as f32)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        visitor.visit_f64(self.real("real")?)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        let text = self.text("character")?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(CodecError::type_mismatch(&self.path, "character", "text")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        visitor.visit_str(self.text("text")?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, CodecError> {
        Err(CodecError::unsupported(&self.path, "bytes"))
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, CodecError> {
        Err(CodecError::unsupported(&self.path, "bytes"))
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        match self.value {
            ValueRef::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        match self.value {
            ValueRef::Null => visitor.visit_unit(),
            _ => Err(self.mismatch("null")),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, CodecError> {
        Err(CodecError::nested(&self.path, "sequence"))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, CodecError> {
        Err(CodecError::nested(&self.path, "tuple"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, CodecError> {
        Err(CodecError::nested(&self.path, "tuple"))
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, CodecError> {
        Err(CodecError::nested(&self.path, "map"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, CodecError> {
        Err(CodecError::nested(&self.path, "struct"))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        let variant: StrDeserializer<'_, CodecError> = self.text("enum variant")?.into_deserializer();
        visitor.visit_enum(variant)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        visitor.visit_unit()
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use serde::Deserialize;

    use crate::codec::{CodecError, decode_row, decode_rows};

    #[derive(Debug, PartialEq, Deserialize)]
    enum Mood {
        Calm,
        Busy,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Entry {
        id: String,
        count: u32,
        ratio: f64,
        flag: bool,
        note: Option<String>,
        mood: Mood,
    }

    fn fixture() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE "Entry" (
                "id" TEXT NOT NULL PRIMARY KEY,
                "count" INTEGER NOT NULL,
                "ratio" REAL NOT NULL,
                "flag" BOOLEAN NOT NULL,
                "note" TEXT,
                "mood" TEXT NOT NULL
            );
            INSERT INTO "Entry" VALUES ('a', 1, 0.5, 1, NULL, 'Calm');
            INSERT INTO "Entry" VALUES ('b', 2.0, 2, 0, 'hello', 'Busy');
            "#,
        )
        .unwrap();
        conn
    }

    fn decode_one<T: serde::de::DeserializeOwned>(
        conn: &Connection,
        sql: &str,
    ) -> Result<T, CodecError> {
        let mut stmt = conn.prepare(sql).unwrap();
        let mut rows = stmt.query([]).unwrap();
        decode_row(&mut rows)
    }

    #[test]
    fn test_decode_row_by_column_name() {
        let conn = fixture();
        let entry: Entry = decode_one(&conn, r#"SELECT * FROM "Entry" WHERE "id" = 'a'"#).unwrap();
        assert_eq!(
            entry,
            Entry {
                id: "a".into(),
                count: 1,
                ratio: 0.5,
                flag: true,
                note: None,
                mood: Mood::Calm,
            }
        );

        // Column order does not matter
        let entry: Entry = decode_one(
            &conn,
            r#"SELECT "mood", "note", "flag", "ratio", "count", "id" FROM "Entry" WHERE "id" = 'b'"#,
        )
        .unwrap();
        assert_eq!(entry.count, 2);
        assert_eq!(entry.ratio, 2.0);
        assert!(!entry.flag);
        assert_eq!(entry.note.as_deref(), Some("hello"));
        assert_eq!(entry.mood, Mood::Busy);
    }

    #[test]
    fn test_decode_rows_in_order() {
        let conn = fixture();
        let mut stmt = conn.prepare(r#"SELECT * FROM "Entry" ORDER BY "id""#).unwrap();
        let mut rows = stmt.query([]).unwrap();
        let entries: Vec<Entry> = decode_rows(&mut rows).unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_decode_rows_empty() {
        let conn = fixture();
        let mut stmt = conn.prepare(r#"SELECT * FROM "Entry" WHERE 0"#).unwrap();
        let mut rows = stmt.query([]).unwrap();
        let entries: Vec<Entry> = decode_rows(&mut rows).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_no_row() {
        let conn = fixture();
        let err = decode_one::<Entry>(&conn, r#"SELECT * FROM "Entry" WHERE "id" = 'zzz'"#).unwrap_err();
        assert!(matches!(err, CodecError::NoRow));
    }

    #[test]
    fn test_missing_required_column() {
        let conn = fixture();
        let err = decode_one::<Entry>(&conn, r#"SELECT "id", "count" FROM "Entry""#).unwrap_err();
        assert!(matches!(err, CodecError::ColumnAbsent { ref column } if column == "ratio"));
    }

    #[test]
    fn test_missing_optional_column_and_extra_columns() {
        #[derive(Debug, Deserialize)]
        struct Narrow {
            id: String,
            absent: Option<i64>,
        }

        let conn = fixture();
        let narrow: Narrow = decode_one(&conn, r#"SELECT * FROM "Entry" WHERE "id" = 'a'"#).unwrap();
        assert_eq!(narrow.id, "a");
        assert_eq!(narrow.absent, None);
    }

    #[test]
    fn test_integer_narrowing() {
        #[derive(Debug, Deserialize)]
        struct Small {
            value: u8,
        }

        let conn = Connection::open_in_memory().unwrap();
        let small: Small = decode_one(&conn, "SELECT 3.7 AS value").unwrap();
        assert_eq!(small.value, 3);

        let err = decode_one::<Small>(&conn, "SELECT 300 AS value").unwrap_err();
        assert!(matches!(
            err,
            CodecError::OutOfRange { target: "u8", ref path, .. } if path == "value"
        ));

        let err = decode_one::<Small>(&conn, "SELECT -1.0 AS value").unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { .. }));

        let small: Small = decode_one(&conn, "SELECT 255.9 AS value").unwrap();
        assert_eq!(small.value, 255);
        let err = decode_one::<Small>(&conn, "SELECT 256.0 AS value").unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { target: "u8", .. }));
    }

    #[test]
    fn test_wide_integer_bounds_from_real() {
        #[derive(Debug, Deserialize)]
        struct Signed {
            value: i64,
        }
        #[derive(Debug, Deserialize)]
        struct Unsigned {
            value: u64,
        }

        let conn = Connection::open_in_memory().unwrap();
        let err = decode_one::<Signed>(&conn, "SELECT 9223372036854775808.0 AS value").unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { target: "i64", .. }));
        let min: Signed = decode_one(&conn, "SELECT -9223372036854775808.0 AS value").unwrap();
        assert_eq!(min.value, i64::MIN);

        let err =
            decode_one::<Unsigned>(&conn, "SELECT 18446744073709551616.0 AS value").unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { target: "u64", .. }));
        let large: Unsigned = decode_one(&conn, "SELECT 9007199254740992.0 AS value").unwrap();
        assert_eq!(large.value, 1 << 53);
    }

    #[test]
    fn test_type_mismatch() {
        #[derive(Debug, Deserialize)]
        struct Counted {
            value: i64,
        }
        #[derive(Debug, Deserialize)]
        struct Named {
            value: String,
        }

        let conn = Connection::open_in_memory().unwrap();
        let err = decode_one::<Counted>(&conn, "SELECT 'seven' AS value").unwrap_err();
        assert!(matches!(
            err,
            CodecError::TypeMismatch { expected: "integer", found: "text", .. }
        ));

        let err = decode_one::<Named>(&conn, "SELECT 7 AS value").unwrap_err();
        assert!(matches!(
            err,
            CodecError::TypeMismatch { expected: "text", found: "integer", .. }
        ));

        let err = decode_one::<Counted>(&conn, "SELECT NULL AS value").unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { found: "null", .. }));
    }

    #[test]
    fn test_nested_field_rejected() {
        #[derive(Debug, Deserialize)]
        struct Holder {
            #[allow(dead_code)]
            value: Vec<i64>,
        }

        let conn = Connection::open_in_memory().unwrap();
        let err = decode_one::<Holder>(&conn, "SELECT 1 AS value").unwrap_err();
        assert!(matches!(err, CodecError::Nested { kind: "sequence", .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_error_path_includes_row_index() {
        #[derive(Debug, Deserialize)]
        struct Small {
            #[allow(dead_code)]
            value: u8,
        }

        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn
            .prepare("SELECT 1 AS value UNION ALL SELECT 1000 AS value")
            .unwrap();
        let mut rows = stmt.query([]).unwrap();
        let err = decode_rows::<Small>(&mut rows).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { ref path, .. } if path == "[1].value"));
    }
}
