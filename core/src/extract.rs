//! Field descriptor extraction from serde derives.
//!
//! A record's `Deserialize` impl already knows the struct name, the field
//! names, and which primitive each field asks for. [`describe`] replays
//! that impl against probing deserializers instead of real data:
//!
//! 1. one pass captures the name and field list handed to
//!    `deserialize_struct`;
//! 2. one pass per field presents only that field and records the first
//!    primitive its `Deserialize` impl requests. `Option` sets the nullable
//!    flag and is unwrapped; newtype structs are transparent.
//!
//! Each probe stops the replay as soon as it has what it needs, so no
//! placeholder values are ever fabricated.

use std::any::type_name;
use std::fmt;

use serde::de::value::StrDeserializer;
use serde::de::{self, DeserializeSeed, Deserializer, IntoDeserializer, MapAccess, Visitor};
use serde::forward_to_deserialize_any;

use crate::types::{FieldDescriptor, LogicalType, Record, TableShape};
use crate::validate::ConfigError;

/// Derives the table shape of a record type.
///
/// # Errors
///
/// Returns [`ConfigError`] if the record is not a struct with named fields,
/// has no fields, lacks its primary key field, or contains a nested or
/// unsupported field.
///
/// # Examples
///
/// ```
/// use rowmap_core::{LogicalType, Record, describe};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Note {
///     id: String,
///     body: Option<String>,
///     pinned: bool,
/// }
///
/// impl Record for Note {
///     type Key = String;
///     const PRIMARY_KEY: &'static str = "id";
///     fn primary_key(&self) -> &String {
///         &self.id
///     }
/// }
///
/// let shape = describe::<Note>().unwrap();
/// assert_eq!(shape.table(), "Note");
/// assert_eq!(shape.fields()[1].logical_type, LogicalType::Text);
/// assert!(shape.fields()[1].nullable);
/// assert_eq!(shape.fields()[2].logical_type, LogicalType::Boolean);
/// ```
pub fn describe<T: Record>() -> Result<TableShape, ConfigError> {
    let (name, fields) = probe_struct::<T>()?;
    let table = T::TABLE.unwrap_or(name).to_string();

    if fields.is_empty() {
        return Err(ConfigError::NoFields { table });
    }
    if !fields.contains(&T::PRIMARY_KEY) {
        return Err(ConfigError::PrimaryKeyCount {
            table,
            key: T::PRIMARY_KEY.to_string(),
            found: 0,
        });
    }

    let mut descriptors = Vec::with_capacity(fields.len());
    for &field in fields {
        let (trace, failure) = probe_field::<T>(field);
        let logical_type = match trace.requested {
            Some(Requested::Scalar(logical_type)) => logical_type,
            Some(Requested::Nested(kind)) => {
                return Err(ConfigError::NestedField {
                    table,
                    field: field.to_string(),
                    kind,
                });
            }
            Some(Requested::Unsupported(kind)) => {
                return Err(ConfigError::UnsupportedType {
                    table,
                    field: field.to_string(),
                    kind,
                });
            }
            None => {
                return Err(ConfigError::Untraceable {
                    table,
                    field: field.to_string(),
                    message: failure.unwrap_or_else(|| "no value requested".to_string()),
                });
            }
        };

        let mut descriptor = FieldDescriptor::new(field, logical_type, trace.nullable);
        descriptor.is_primary_key = field == T::PRIMARY_KEY;
        descriptors.push(descriptor);
    }

    TableShape::new(table, descriptors)
}

/// Captures the struct name and field list.
fn probe_struct<T: Record>() -> Result<(&'static str, &'static [&'static str]), ConfigError> {
    let mut captured = None;
    let mut found = "scalar";
    let _ = T::deserialize(StructProbe {
        captured: &mut captured,
        found: &mut found,
    });
    captured.ok_or(ConfigError::NotAStruct {
        record: type_name::<T>(),
        found,
    })
}

/// Replays the record with only `field` present.
///
/// Returns the trace and, if nothing was recorded, the error that stopped
/// the replay.
fn probe_field<T: Record>(field: &'static str) -> (FieldTrace, Option<String>) {
    let mut trace = FieldTrace::default();
    let outcome = T::deserialize(FieldProbe {
        field,
        trace: &mut trace,
    });
    let failure = match outcome {
        Err(Probe::Custom(message)) => Some(message),
        _ => None,
    };
    (trace, failure)
}

/// Replay control flow.
///
/// `Captured` is not a failure: it unwinds the replay once the probe has
/// recorded what it needs.
#[derive(Debug)]
enum Probe {
    Captured,
    Custom(String),
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Captured => f.write_str("shape captured"),
            Probe::Custom(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for Probe {}

impl de::Error for Probe {
    fn custom<M: fmt::Display>(msg: M) -> Self {
        Probe::Custom(msg.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
enum Requested {
    Scalar(LogicalType),
    Nested(&'static str),
    Unsupported(&'static str),
}

#[derive(Debug, Default)]
struct FieldTrace {
    requested: Option<Requested>,
    nullable: bool,
}

struct StructProbe<'a> {
    captured: &'a mut Option<(&'static str, &'static [&'static str])>,
    found: &'a mut &'static str,
}

impl StructProbe<'_> {
    fn reject<T>(self, kind: &'static str) -> Result<T, Probe> {
        *self.found = kind;
        Err(Probe::Captured)
    }
}

impl<'de> Deserializer<'de> for StructProbe<'_> {
    type Error = Probe;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        self.reject("scalar")
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        *self.captured = Some((name, fields));
        Err(Probe::Captured)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Probe> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        self.reject("map")
    }

    fn deserialize_seq<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        self.reject("sequence")
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value, Probe> {
        self.reject("tuple")
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        self.reject("tuple struct")
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        self.reject("enum")
    }

    fn deserialize_option<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        self.reject("option")
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct identifier ignored_any
    }
}

struct FieldProbe<'a> {
    field: &'static str,
    trace: &'a mut FieldTrace,
}

impl<'de> Deserializer<'de> for FieldProbe<'_> {
    type Error = Probe;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        Err(de::Error::custom("record is no longer a struct"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Probe> {
        visitor.visit_map(SingleField {
            field: self.field,
            trace: self.trace,
            yielded: false,
        })
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Probe> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct seq tuple tuple_struct map enum
        identifier ignored_any
    }
}

/// Map access presenting exactly one field.
struct SingleField<'a> {
    field: &'static str,
    trace: &'a mut FieldTrace,
    yielded: bool,
}

impl<'de> MapAccess<'de> for SingleField<'_> {
    type Error = Probe;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, Probe> {
        if self.yielded {
            return Ok(None);
        }
        self.yielded = true;
        let key: StrDeserializer<'static, Probe> = self.field.into_deserializer();
        seed.deserialize(key).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Probe> {
        seed.deserialize(ValueProbe {
            trace: &mut *self.trace,
        })
    }
}

/// Records the first primitive a field's `Deserialize` impl asks for.
struct ValueProbe<'a> {
    trace: &'a mut FieldTrace,
}

impl ValueProbe<'_> {
    fn record<T>(self, requested: Requested) -> Result<T, Probe> {
        self.trace.requested = Some(requested);
        Err(Probe::Captured)
    }

    fn scalar<T>(self, logical_type: LogicalType) -> Result<T, Probe> {
        self.record(Requested::Scalar(logical_type))
    }
}

macro_rules! probe_scalar {
    ($($method:ident => $logical:ident),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
                self.scalar(LogicalType::$logical)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ValueProbe<'_> {
    type Error = Probe;

    probe_scalar! {
        deserialize_bool => Boolean,
        deserialize_i8 => Integer,
        deserialize_i16 => Integer,
        deserialize_i32 => Integer,
        deserialize_i64 => Integer,
        deserialize_u8 => Integer,
        deserialize_u16 => Integer,
        deserialize_u32 => Integer,
        deserialize_u64 => Integer,
        deserialize_f32 => Real,
        deserialize_f64 => Real,
        deserialize_char => Text,
        deserialize_str => Text,
        deserialize_string => Text,
        deserialize_identifier => Text,
    }

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        self.record(Requested::Unsupported("self-describing value"))
    }

    fn deserialize_i128<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        self.record(Requested::Unsupported("i128"))
    }

    fn deserialize_u128<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        self.record(Requested::Unsupported("u128"))
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        self.record(Requested::Unsupported("bytes"))
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        self.record(Requested::Unsupported("bytes"))
    }

    fn deserialize_unit<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        self.record(Requested::Unsupported("unit"))
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        self.record(Requested::Unsupported("unit struct"))
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        self.record(Requested::Unsupported("ignored value"))
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Probe> {
        self.trace.nullable = true;
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Probe> {
        visitor.visit_newtype_struct(self)
    }

    // Unit variants are stored by name; data-carrying variants are refused
    // when the value is encoded.
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        self.scalar(LogicalType::Text)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        self.record(Requested::Nested("sequence"))
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value, Probe> {
        self.record(Requested::Nested("tuple"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        self.record(Requested::Nested("tuple"))
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Probe> {
        self.record(Requested::Nested("map"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        self.record(Requested::Nested("struct"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::Timestamp;

    macro_rules! record {
        ($ty:ident, $key:ident: $key_ty:ty) => {
            impl Record for $ty {
                type Key = $key_ty;
                const PRIMARY_KEY: &'static str = stringify!($key);
                fn primary_key(&self) -> &$key_ty {
                    &self.$key
                }
            }
        };
    }

    #[derive(Debug, Clone, Copy, Serialize, Deserialize)]
    enum Color {
        Red,
        Green,
    }

    #[derive(Debug, Clone, Copy, Serialize, Deserialize)]
    struct Meters(f64);

    #[derive(Serialize, Deserialize)]
    struct Everything {
        id: String,
        flag: bool,
        small: i8,
        big: u64,
        ratio: f32,
        exact: f64,
        initial: char,
        uid: uuid::Uuid,
        at: Timestamp,
        color: Color,
        length: Meters,
        maybe_text: Option<String>,
        maybe_int: Option<i32>,
        maybe_color: Option<Color>,
    }
    record!(Everything, id: String);

    #[test]
    fn test_scalar_inference() {
        let shape = describe::<Everything>().unwrap();
        let types: Vec<(&str, LogicalType, bool)> = shape
            .fields()
            .iter()
            .map(|f| (f.name.as_str(), f.logical_type, f.nullable))
            .collect();
        assert_eq!(
            types,
            vec![
                ("id", LogicalType::Text, false),
                ("flag", LogicalType::Boolean, false),
                ("small", LogicalType::Integer, false),
                ("big", LogicalType::Integer, false),
                ("ratio", LogicalType::Real, false),
                ("exact", LogicalType::Real, false),
                ("initial", LogicalType::Text, false),
                ("uid", LogicalType::Text, false),
                ("at", LogicalType::Real, false),
                ("color", LogicalType::Text, false),
                ("length", LogicalType::Real, false),
                ("maybe_text", LogicalType::Text, true),
                ("maybe_int", LogicalType::Integer, true),
                ("maybe_color", LogicalType::Text, true),
            ]
        );
        assert_eq!(shape.primary_key().name, "id");
        assert_eq!(shape.fields().iter().filter(|f| f.is_primary_key).count(), 1);
    }

    #[derive(Serialize, Deserialize)]
    #[serde(rename = "renamed_items")]
    struct Renamed {
        #[serde(rename = "key")]
        id: i64,
        #[serde(skip)]
        #[allow(dead_code)]
        cache: Option<String>,
    }

    impl Record for Renamed {
        type Key = i64;
        const PRIMARY_KEY: &'static str = "key";
        fn primary_key(&self) -> &i64 {
            &self.id
        }
    }

    #[test]
    fn test_serde_names_are_used() {
        let shape = describe::<Renamed>().unwrap();
        assert_eq!(shape.table(), "renamed_items");
        assert_eq!(shape.column_names().collect::<Vec<_>>(), vec!["key"]);
        assert_eq!(shape.primary_key().logical_type, LogicalType::Integer);
    }

    #[derive(Serialize, Deserialize)]
    struct Overridden {
        id: String,
    }

    impl Record for Overridden {
        type Key = String;
        const PRIMARY_KEY: &'static str = "id";
        const TABLE: Option<&'static str> = Some("custom_table");
        fn primary_key(&self) -> &String {
            &self.id
        }
    }

    #[test]
    fn test_table_override() {
        assert_eq!(describe::<Overridden>().unwrap().table(), "custom_table");
    }

    #[derive(Serialize, Deserialize)]
    struct Inner {
        x: i32,
    }

    #[derive(Serialize, Deserialize)]
    struct WithStruct {
        id: String,
        inner: Inner,
    }
    record!(WithStruct, id: String);

    #[derive(Serialize, Deserialize)]
    struct WithVec {
        id: String,
        tags: Vec<String>,
    }
    record!(WithVec, id: String);

    #[derive(Serialize, Deserialize)]
    struct WithMap {
        id: String,
        attrs: Option<HashMap<String, String>>,
    }
    record!(WithMap, id: String);

    #[test]
    fn test_nested_fields_are_rejected() {
        assert!(matches!(
            describe::<WithStruct>().unwrap_err(),
            ConfigError::NestedField { field, kind: "struct", .. } if field == "inner"
        ));
        assert!(matches!(
            describe::<WithVec>().unwrap_err(),
            ConfigError::NestedField { field, kind: "sequence", .. } if field == "tags"
        ));
        assert!(matches!(
            describe::<WithMap>().unwrap_err(),
            ConfigError::NestedField { kind: "map", .. }
        ));
    }

    #[derive(Serialize, Deserialize)]
    struct WithBytes {
        id: String,
        #[serde(with = "serde_bytes_like")]
        payload: Vec<u8>,
    }
    record!(WithBytes, id: String);

    mod serde_bytes_like {
        use serde::{Deserializer, Serializer};

        pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
            s.serialize_bytes(v)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
            struct BytesVisitor;
            impl serde::de::Visitor<'_> for BytesVisitor {
                type Value = Vec<u8>;
                fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str("bytes")
                }
                fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Vec<u8>, E> {
                    Ok(v.to_vec())
                }
            }
            d.deserialize_byte_buf(BytesVisitor)
        }
    }

    #[derive(Serialize, Deserialize)]
    struct WithJson {
        id: String,
        extra: serde_json::Value,
    }
    record!(WithJson, id: String);

    #[test]
    fn test_unsupported_scalars_are_rejected() {
        assert!(matches!(
            describe::<WithBytes>().unwrap_err(),
            ConfigError::UnsupportedType { kind: "bytes", .. }
        ));
        assert!(matches!(
            describe::<WithJson>().unwrap_err(),
            ConfigError::UnsupportedType { kind: "self-describing value", .. }
        ));
    }

    #[derive(Serialize, Deserialize)]
    struct NoKey {
        name: String,
    }

    impl Record for NoKey {
        type Key = String;
        const PRIMARY_KEY: &'static str = "id";
        fn primary_key(&self) -> &String {
            &self.name
        }
    }

    #[test]
    fn test_missing_primary_key() {
        assert_eq!(
            describe::<NoKey>().unwrap_err(),
            ConfigError::PrimaryKeyCount {
                table: "NoKey".into(),
                key: "id".into(),
                found: 0,
            }
        );
    }

    #[derive(Serialize, Deserialize)]
    struct Empty {}

    impl Record for Empty {
        type Key = ();
        const PRIMARY_KEY: &'static str = "id";
        fn primary_key(&self) -> &() {
            &()
        }
    }

    #[test]
    fn test_zero_fields() {
        assert_eq!(
            describe::<Empty>().unwrap_err(),
            ConfigError::NoFields {
                table: "Empty".into()
            }
        );
    }

    #[derive(Serialize, Deserialize)]
    struct Tuple(String, i32);

    impl Record for Tuple {
        type Key = String;
        const PRIMARY_KEY: &'static str = "0";
        fn primary_key(&self) -> &String {
            &self.0
        }
    }

    #[test]
    fn test_tuple_struct_is_not_a_record() {
        assert!(matches!(
            describe::<Tuple>().unwrap_err(),
            ConfigError::NotAStruct { found: "tuple struct", .. }
        ));
    }
}
