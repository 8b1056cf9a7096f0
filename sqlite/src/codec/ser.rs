//! Write path: binding record fields to statement parameters.

use rusqlite::Statement;
use rusqlite::types::{Null, ToSql};
use serde::ser::{Impossible, Serialize, SerializeStruct, Serializer};

use super::CodecError;
use super::path::{Frame, ROOT};

fn root_scalar(kind: &'static str) -> CodecError {
    CodecError::RootScalar {
        path: ROOT.render(),
        kind,
    }
}

/// Encodes a whole record: a struct whose fields become parameters.
pub(crate) struct RecordEncoder<'a, 'conn> {
    stmt: &'a mut Statement<'conn>,
}

impl<'a, 'conn> RecordEncoder<'a, 'conn> {
    pub(crate) fn new(stmt: &'a mut Statement<'conn>) -> Self {
        Self { stmt }
    }
}

macro_rules! reject_root {
    ($($method:ident($ty:ty) => $kind:literal),* $(,)?) => {
        $(
            fn $method(self, _v: $ty) -> Result<(), CodecError> {
                Err(root_scalar($kind))
            }
        )*
    };
}

impl<'a, 'conn> Serializer for RecordEncoder<'a, 'conn> {
    type Ok = ();
    type Error = CodecError;
    type SerializeSeq = Impossible<(), CodecError>;
    type SerializeTuple = Impossible<(), CodecError>;
    type SerializeTupleStruct = Impossible<(), CodecError>;
    type SerializeTupleVariant = Impossible<(), CodecError>;
    type SerializeMap = Impossible<(), CodecError>;
    type SerializeStruct = FieldEncoder<'a, 'conn>;
    type SerializeStructVariant = Impossible<(), CodecError>;

    reject_root! {
        serialize_bool(bool) => "boolean",
        serialize_i8(i8) => "integer",
        serialize_i16(i16) => "integer",
        serialize_i32(i32) => "integer",
        serialize_i64(i64) => "integer",
        serialize_u8(u8) => "integer",
        serialize_u16(u16) => "integer",
        serialize_u32(u32) => "integer",
        serialize_u64(u64) => "integer",
        serialize_f32(f32) => "number",
        serialize_f64(f64) => "number",
        serialize_char(char) => "character",
        serialize_str(&str) => "text",
        serialize_bytes(&[u8]) => "bytes",
    }

    fn serialize_none(self) -> Result<(), CodecError> {
        Err(root_scalar("null"))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, _value: &T) -> Result<(), CodecError> {
        Err(root_scalar("optional value"))
    }

    fn serialize_unit(self) -> Result<(), CodecError> {
        Err(root_scalar("unit"))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), CodecError> {
        Err(root_scalar("unit struct"))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<(), CodecError> {
        Err(root_scalar("enum variant"))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), CodecError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<(), CodecError> {
        Err(root_scalar("enum variant"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, CodecError> {
        Err(CodecError::unsupported(&ROOT, "sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, CodecError> {
        Err(CodecError::unsupported(&ROOT, "tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, CodecError> {
        Err(CodecError::unsupported(&ROOT, "tuple struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, CodecError> {
        Err(CodecError::unsupported(&ROOT, "enum variant"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, CodecError> {
        Err(CodecError::unsupported(&ROOT, "map"))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, CodecError> {
        Ok(FieldEncoder { stmt: self.stmt })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, CodecError> {
        Err(CodecError::unsupported(&ROOT, "enum variant"))
    }
}

/// Binds the fields of one record.
pub(crate) struct FieldEncoder<'a, 'conn> {
    stmt: &'a mut Statement<'conn>,
}

impl SerializeStruct for FieldEncoder<'_, '_> {
    type Ok = ();
    type Error = CodecError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), CodecError> {
        value.serialize(ParamEncoder::new(&mut *self.stmt, Frame::field(&ROOT, key)))
    }

    fn end(self) -> Result<(), CodecError> {
        Ok(())
    }
}

/// Binds one scalar to the parameter named after its field.
pub(crate) struct ParamEncoder<'a, 'conn, 'p> {
    stmt: &'a mut Statement<'conn>,
    path: Frame<'p>,
}

impl<'a, 'conn, 'p> ParamEncoder<'a, 'conn, 'p> {
    pub(crate) fn new(stmt: &'a mut Statement<'conn>, path: Frame<'p>) -> Self {
        Self { stmt, path }
    }

    fn bind<V: ToSql>(self, value: V) -> Result<(), CodecError> {
        let Some(name) = self.path.name() else {
            return Err(root_scalar("value"));
        };
        let index = self
            .stmt
            .parameter_index(&format!("${name}"))?
            .ok_or_else(|| CodecError::UnknownParameter {
                name: name.to_string(),
            })?;
        self.stmt.raw_bind_parameter(index, value)?;
        Ok(())
    }
}

macro_rules! bind_as_real {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method(self, v: $ty) -> Result<(), CodecError> {
                self.bind(v as f64)
            }
        )*
    };
}

impl Serializer for ParamEncoder<'_, '_, '_> {
    type Ok = ();
    type Error = CodecError;
    type SerializeSeq = Impossible<(), CodecError>;
    type SerializeTuple = Impossible<(), CodecError>;
    type SerializeTupleStruct = Impossible<(), CodecError>;
    type SerializeTupleVariant = Impossible<(), CodecError>;
    type SerializeMap = Impossible<(), CodecError>;
    type SerializeStruct = Impossible<(), CodecError>;
    type SerializeStructVariant = Impossible<(), CodecError>;

    fn serialize_bool(self, v: bool) -> Result<(), CodecError> {
        self.bind(i64::from(v))
    }

    bind_as_real! {
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_f32(f32),
        serialize_f64(f64),
    }

    fn serialize_i128(self, _v: i128) -> Result<(), CodecError> {
        Err(CodecError::unsupported(&self.path, "i128"))
    }

    fn serialize_u128(self, _v: u128) -> Result<(), CodecError> {
        Err(CodecError::unsupported(&self.path, "u128"))
    }

    fn serialize_char(self, v: char) -> Result<(), CodecError> {
        self.bind(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<(), CodecError> {
        self.bind(v)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<(), CodecError> {
        Err(CodecError::unsupported(&self.path, "bytes"))
    }

    fn serialize_none(self) -> Result<(), CodecError> {
        self.bind(Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), CodecError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), CodecError> {
        self.bind(Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), CodecError> {
        self.bind(Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<(), CodecError> {
        self.bind(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), CodecError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<(), CodecError> {
        Err(CodecError::nested(&self.path, "enum variant"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, CodecError> {
        Err(CodecError::nested(&self.path, "sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, CodecError> {
        Err(CodecError::nested(&self.path, "tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, CodecError> {
        Err(CodecError::nested(&self.path, "tuple"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, CodecError> {
        Err(CodecError::nested(&self.path, "enum variant"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, CodecError> {
        Err(CodecError::nested(&self.path, "map"))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, CodecError> {
        Err(CodecError::nested(&self.path, "struct"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, CodecError> {
        Err(CodecError::nested(&self.path, "enum variant"))
    }
}
