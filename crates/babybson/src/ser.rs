//! Serde 序列化模块
//!
//! 实现 Serde Serializer trait，将 Rust 数据结构转换为 [`Value`] 树。
//!
//! 整数映射:
//! - i8 / i16 / i32 / u8 / u16 -> Int32
//! - i64 -> Int64；u32 / u64 在 i32 范围内为 Int32，否则为 Int64
//! - 超出 i64 范围的 u64 / i128 / u128 -> 错误
//!
//! [`ObjectId`] 与 [`DateTime`] 通过专用的 newtype 名称识别，分别输出类型标记 0x07 与 0x09。

use crate::codec::encode_document;
use crate::document::Document;
use crate::value::{Binary, DateTime, Value};
use crate::{BsonError, BsonResult};
use babybson_common::ObjectId;
use compact_str::CompactString;
use serde::ser::{self, Serialize};

pub struct Serializer {
    output: Value,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            output: Value::Null,
        }
    }

    pub fn into_value(self) -> Value {
        self.output
    }
}

/// 将 Rust 值序列化为 [`Value`]
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> BsonResult<Value> {
    let mut serializer = Serializer::new();
    value.serialize(&mut serializer)?;
    Ok(serializer.into_value())
}

/// 将 Rust 值序列化为 [`Document`]，顶层必须是结构体或映射
pub fn to_document<T: ?Sized + Serialize>(value: &T) -> BsonResult<Document> {
    match to_value(value)? {
        Value::Document(doc) => Ok(doc),
        other => Err(BsonError::Serialization(format!(
            "Top-level value must be a document, got {}",
            other.type_name()
        ))),
    }
}

/// 将 Rust 值序列化为 BSON 字节
pub fn to_vec<T: ?Sized + Serialize>(value: &T) -> BsonResult<Vec<u8>> {
    let doc = to_document(value)?;
    Ok(encode_document(&doc)?)
}

fn wrap_variant(variant: &'static str, value: Value) -> Value {
    Value::Document(Document::from_elements(vec![(
        CompactString::from(variant),
        value,
    )]))
}

impl<'a> ser::Serializer for &'a mut Serializer {
    type Ok = ();
    type Error = BsonError;
    type SerializeSeq = SeqSerializer<'a>;
    type SerializeTuple = SeqSerializer<'a>;
    type SerializeTupleStruct = SeqSerializer<'a>;
    type SerializeTupleVariant = SeqSerializer<'a>;
    type SerializeMap = MapSerializer<'a>;
    type SerializeStruct = MapSerializer<'a>;
    type SerializeStructVariant = MapSerializer<'a>;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        self.output = Value::Boolean(v);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_i16(self, v: i16) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_i32(self, v: i32) -> Result<Self::Ok, Self::Error> {
        self.output = Value::Int32(v);
        Ok(())
    }

    fn serialize_i64(self, v: i64) -> Result<Self::Ok, Self::Error> {
        self.output = Value::Int64(v);
        Ok(())
    }

    fn serialize_i128(self, v: i128) -> Result<Self::Ok, Self::Error> {
        let v = i64::try_from(v)
            .map_err(|_| BsonError::Serialization(format!("i128 {} out of range for Int64", v)))?;
        self.serialize_i64(v)
    }

    fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u16(self, v: u16) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u32(self, v: u32) -> Result<Self::Ok, Self::Error> {
        if v <= i32::MAX as u32 {
            self.serialize_i32(v as i32)
        } else {
            self.serialize_i64(v as i64)
        }
    }

    fn serialize_u64(self, v: u64) -> Result<Self::Ok, Self::Error> {
        if v <= i32::MAX as u64 {
            self.serialize_i32(v as i32)
        } else if v <= i64::MAX as u64 {
            self.serialize_i64(v as i64)
        } else {
            Err(BsonError::Serialization(format!(
                "u64 {} out of range for Int64",
                v
            )))
        }
    }

    fn serialize_u128(self, v: u128) -> Result<Self::Ok, Self::Error> {
        let v = u64::try_from(v)
            .map_err(|_| BsonError::Serialization(format!("u128 {} out of range for Int64", v)))?;
        self.serialize_u64(v)
    }

    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        self.output = Value::Double(v);
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        let mut buf = [0u8; 4];
        self.serialize_str(v.encode_utf8(&mut buf))
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        self.output = Value::String(CompactString::from(v));
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        self.output = Value::Binary(Binary::generic(v));
        Ok(())
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        self.serialize_unit()
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        self.output = Value::Null;
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        match name {
            ObjectId::SERDE_NAME => {
                let id = match to_value(value)? {
                    Value::String(hex) => ObjectId::from_hex(&hex)
                        .map_err(|e| BsonError::Serialization(e.to_string()))?,
                    other => {
                        return Err(BsonError::Serialization(format!(
                            "ObjectId must serialize as a hex string, got {}",
                            other.type_name()
                        )))
                    }
                };
                self.output = Value::ObjectId(id);
                Ok(())
            }
            DateTime::SERDE_NAME => {
                let millis = match to_value(value)? {
                    Value::Int64(n) => n,
                    Value::Int32(n) => n as i64,
                    other => {
                        return Err(BsonError::Serialization(format!(
                            "DateTime must serialize as milliseconds, got {}",
                            other.type_name()
                        )))
                    }
                };
                self.output = Value::DateTime(DateTime::from_millis(millis));
                Ok(())
            }
            _ => value.serialize(self),
        }
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        self.output = wrap_variant(variant, to_value(value)?);
        Ok(())
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(SeqSerializer {
            serializer: self,
            elements: Vec::with_capacity(len.unwrap_or(0)),
            variant: None,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Ok(SeqSerializer {
            serializer: self,
            elements: Vec::with_capacity(len),
            variant: Some(variant),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(MapSerializer {
            serializer: self,
            elements: Vec::with_capacity(len.unwrap_or(0)),
            current_key: None,
            variant: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Ok(MapSerializer {
            serializer: self,
            elements: Vec::with_capacity(len),
            current_key: None,
            variant: Some(variant),
        })
    }
}

pub struct SeqSerializer<'a> {
    serializer: &'a mut Serializer,
    elements: Vec<Value>,
    variant: Option<&'static str>,
}

impl<'a> ser::SerializeSeq for SeqSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.elements.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        let array = Value::Array(self.elements);
        self.serializer.output = match self.variant {
            Some(variant) => wrap_variant(variant, array),
            None => array,
        };
        Ok(())
    }
}

impl<'a> ser::SerializeTuple for SeqSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleStruct for SeqSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleVariant for SeqSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

pub struct MapSerializer<'a> {
    serializer: &'a mut Serializer,
    elements: Vec<(CompactString, Value)>,
    current_key: Option<CompactString>,
    variant: Option<&'static str>,
}

impl<'a> ser::SerializeMap for MapSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Self::Error> {
        self.current_key = match to_value(key)? {
            Value::String(s) => Some(s),
            other => {
                return Err(BsonError::Serialization(format!(
                    "Map key must be a string, got {}",
                    other.type_name()
                )))
            }
        };
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        let key = self
            .current_key
            .take()
            .ok_or_else(|| BsonError::Serialization("No key for value".to_string()))?;
        self.elements.push((key, to_value(value)?));
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        let doc = Value::Document(Document::from_elements(self.elements));
        self.serializer.output = match self.variant {
            Some(variant) => wrap_variant(variant, doc),
            None => doc,
        };
        Ok(())
    }
}

impl<'a> ser::SerializeStruct for MapSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.elements
            .push((CompactString::from(key), to_value(value)?));
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeMap::end(self)
    }
}

impl<'a> ser::SerializeStructVariant for MapSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeMap::end(self)
    }
}

impl ser::Error for BsonError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        BsonError::Serialization(msg.to_string())
    }
}
