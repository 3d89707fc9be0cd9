//! Serde 反序列化模块
//!
//! 实现 Serde Deserializer trait，将 [`Value`] 反序列化为 Rust 数据结构。
//!
//! 支持所有标准 Rust 类型的反序列化:
//! - 基本类型: bool, 整数, 浮点数, 字符串
//! - 复合类型: 结构体, 枚举, 数组, 元组, HashMap
//! - 整数宽度转换: Int32 <-> Int64 (在目标范围内时)
//! - 旧式类型: Regex / Timestamp / DBPointer / 带作用域代码以映射形式呈现，
//!   Decimal128 为 16 字节，MinKey / MaxKey 为类型名字符串

use crate::codec::decode_document;
use crate::document::Document;
use crate::value::Value;
use crate::{BsonError, BsonResult};
use babybson_common::ObjectId;
use serde::de::value::MapAccessDeserializer;
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::fmt;

pub struct Deserializer<'de> {
    input: &'de Value,
}

impl<'de> Deserializer<'de> {
    pub fn new(input: &'de Value) -> Self {
        Deserializer { input }
    }

    fn mismatch(&self, expected: &str) -> BsonError {
        BsonError::Deserialization(format!(
            "Expected {}, got {}",
            expected,
            self.input.type_name()
        ))
    }
}

/// 从 [`Value`] 反序列化
pub fn from_value<'a, T: Deserialize<'a>>(value: &'a Value) -> BsonResult<T> {
    T::deserialize(Deserializer::new(value))
}

/// 从 [`Document`] 反序列化
pub fn from_document<T: DeserializeOwned>(doc: Document) -> BsonResult<T> {
    let value = Value::Document(doc);
    from_value(&value)
}

/// 从 BSON 字节反序列化(默认解码配置)
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> BsonResult<T> {
    let doc = decode_document(data)?;
    from_document(doc)
}

/// 以两个固定字段的映射呈现旧式类型
fn visit_fields<'de, V, T>(visitor: V, fields: [(&'static str, T); 2]) -> BsonResult<V::Value>
where
    V: Visitor<'de>,
    T: IntoDeserializer<'de, BsonError>,
{
    visitor.visit_map(de::value::MapDeserializer::new(fields.into_iter()))
}

impl de::Error for BsonError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        BsonError::Deserialization(msg.to_string())
    }
}

impl<'de> de::Deserializer<'de> for Deserializer<'de> {
    type Error = BsonError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Null | Value::Undefined => visitor.visit_unit(),
            Value::Boolean(b) => visitor.visit_bool(*b),
            Value::Int32(n) => visitor.visit_i32(*n),
            Value::Int64(n) => visitor.visit_i64(*n),
            Value::Double(n) => visitor.visit_f64(*n),
            Value::String(s) | Value::Symbol(s) | Value::JavaScriptCode(s) => {
                visitor.visit_str(s.as_str())
            }
            Value::Binary(b) => visitor.visit_borrowed_bytes(&b.bytes),
            Value::ObjectId(id) => visitor.visit_string(id.to_hex()),
            Value::DateTime(dt) => visitor.visit_i64(dt.timestamp_millis()),
            Value::Array(arr) => visitor.visit_seq(SeqDeserializer::new(arr.iter())),
            Value::Document(doc) => visitor.visit_map(MapDeserializer::new(doc.iter())),
            Value::Regex(re) => visit_fields(
                visitor,
                [("pattern", re.pattern.as_str()), ("options", re.options.as_str())],
            ),
            Value::Timestamp(ts) => {
                visit_fields(visitor, [("time", ts.time), ("increment", ts.increment)])
            }
            Value::DbPointer(ptr) => visit_fields(
                visitor,
                [("namespace", ptr.namespace.to_string()), ("id", ptr.id.to_hex())],
            ),
            Value::JavaScriptCodeWithScope(cws) => visitor.visit_map(CodeWithScopeAccess {
                code: cws.code.as_str(),
                scope: &cws.scope,
                field: 0,
            }),
            Value::Decimal128(d) => visitor.visit_borrowed_bytes(d.as_bytes()),
            Value::MinKey | Value::MaxKey => visitor.visit_str(self.input.type_name()),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Boolean(b) => visitor.visit_bool(*b),
            _ => Err(self.mismatch("boolean")),
        }
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i32(visitor)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i32(visitor)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Int32(n) => visitor.visit_i32(*n),
            Value::Int64(n) => visitor.visit_i64(*n),
            _ => Err(self.mismatch("integer")),
        }
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Int32(n) => visitor.visit_i64(*n as i64),
            Value::Int64(n) => visitor.visit_i64(*n),
            Value::DateTime(dt) => visitor.visit_i64(dt.timestamp_millis()),
            _ => Err(self.mismatch("integer")),
        }
    }

    fn deserialize_i128<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Int32(n) => visitor.visit_i128(*n as i128),
            Value::Int64(n) => visitor.visit_i128(*n as i128),
            _ => Err(self.mismatch("integer")),
        }
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_u32(visitor)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_u32(visitor)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Int32(n) if *n >= 0 => visitor.visit_u32(*n as u32),
            Value::Int64(n) if *n >= 0 && *n <= u32::MAX as i64 => visitor.visit_u32(*n as u32),
            _ => Err(self.mismatch("unsigned integer")),
        }
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Int32(n) if *n >= 0 => visitor.visit_u64(*n as u64),
            Value::Int64(n) if *n >= 0 => visitor.visit_u64(*n as u64),
            _ => Err(self.mismatch("unsigned integer")),
        }
    }

    fn deserialize_u128<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Int32(n) if *n >= 0 => visitor.visit_u128(*n as u128),
            Value::Int64(n) if *n >= 0 => visitor.visit_u128(*n as u128),
            _ => Err(self.mismatch("unsigned integer")),
        }
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Double(n) => visitor.visit_f32(*n as f32),
            Value::Int32(n) => visitor.visit_f32(*n as f32),
            Value::Int64(n) => visitor.visit_f32(*n as f32),
            _ => Err(self.mismatch("float")),
        }
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Double(n) => visitor.visit_f64(*n),
            Value::Int32(n) => visitor.visit_f64(*n as f64),
            Value::Int64(n) => visitor.visit_f64(*n as f64),
            _ => Err(self.mismatch("float")),
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if let Value::String(s) = self.input {
            let mut chars = s.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return visitor.visit_char(c);
            }
        }
        Err(self.mismatch("char"))
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::String(s) | Value::Symbol(s) => visitor.visit_str(s.as_str()),
            Value::ObjectId(id) => visitor.visit_string(id.to_hex()),
            _ => Err(self.mismatch("string")),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Binary(b) => visitor.visit_borrowed_bytes(&b.bytes),
            Value::ObjectId(id) => visitor.visit_borrowed_bytes(id.as_bytes()),
            Value::Decimal128(d) => visitor.visit_borrowed_bytes(d.as_bytes()),
            _ => Err(self.mismatch("binary")),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Null | Value::Undefined => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Null | Value::Undefined => visitor.visit_unit(),
            _ => Err(self.mismatch("null")),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match (name, self.input) {
            (ObjectId::SERDE_NAME, Value::ObjectId(id)) => visitor.visit_bytes(id.as_bytes()),
            _ => visitor.visit_newtype_struct(self),
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Array(arr) => visitor.visit_seq(SeqDeserializer::new(arr.iter())),
            _ => Err(self.mismatch("array")),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::Document(doc) => visitor.visit_map(MapDeserializer::new(doc.iter())),
            Value::Regex(_)
            | Value::Timestamp(_)
            | Value::DbPointer(_)
            | Value::JavaScriptCodeWithScope(_) => self.deserialize_any(visitor),
            _ => Err(self.mismatch("document")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.input {
            Value::String(s) => visitor.visit_enum(s.as_str().into_deserializer()),
            Value::Document(doc) if doc.len() == 1 => match doc.iter().next() {
                Some((variant, value)) => visitor.visit_enum(EnumDeserializer { variant, value }),
                None => Err(self.mismatch("single-field document for enum")),
            },
            _ => Err(self.mismatch("string or single-field document for enum")),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}

struct SeqDeserializer<I> {
    iter: I,
}

impl<I> SeqDeserializer<I> {
    fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<'de, I: Iterator<Item = &'de Value>> SeqAccess<'de> for SeqDeserializer<I> {
    type Error = BsonError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        match self.iter.next() {
            Some(value) => seed.deserialize(Deserializer::new(value)).map(Some),
            None => Ok(None),
        }
    }
}

struct MapDeserializer<'de, I> {
    iter: I,
    value: Option<&'de Value>,
}

impl<'de, I: Iterator<Item = (&'de str, &'de Value)>> MapDeserializer<'de, I> {
    fn new(iter: I) -> Self {
        Self { iter, value: None }
    }
}

impl<'de, I: Iterator<Item = (&'de str, &'de Value)>> MapAccess<'de> for MapDeserializer<'de, I> {
    type Error = BsonError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(key.into_deserializer()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, Self::Error> {
        let value = self
            .value
            .take()
            .ok_or_else(|| BsonError::Deserialization("No value".to_string()))?;
        seed.deserialize(Deserializer::new(value))
    }
}

/// 带作用域代码的 `{code, scope}` 视图
struct CodeWithScopeAccess<'de> {
    code: &'de str,
    scope: &'de Document,
    field: usize,
}

impl<'de> MapAccess<'de> for CodeWithScopeAccess<'de> {
    type Error = BsonError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        let key = match self.field {
            0 => "code",
            1 => "scope",
            _ => return Ok(None),
        };
        seed.deserialize(key.into_deserializer()).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, Self::Error> {
        self.field += 1;
        if self.field == 1 {
            seed.deserialize(self.code.into_deserializer())
        } else {
            let scope = MapDeserializer::new(self.scope.iter());
            seed.deserialize(MapAccessDeserializer::new(scope))
        }
    }
}

struct EnumDeserializer<'de> {
    variant: &'de str,
    value: &'de Value,
}

impl<'de> de::EnumAccess<'de> for EnumDeserializer<'de> {
    type Error = BsonError;
    type Variant = VariantDeserializer<'de>;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Self::Variant), Self::Error> {
        use serde::de::value::StrDeserializer;
        let deserializer: StrDeserializer<'de, BsonError> = self.variant.into_deserializer();
        let variant: V::Value = seed.deserialize(deserializer)?;
        Ok((variant, VariantDeserializer { value: self.value }))
    }
}

struct VariantDeserializer<'de> {
    value: &'de Value,
}

impl<'de> de::VariantAccess<'de> for VariantDeserializer<'de> {
    type Error = BsonError;

    fn unit_variant(self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> Result<T::Value, Self::Error> {
        seed.deserialize(Deserializer::new(self.value))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error> {
        de::Deserializer::deserialize_seq(Deserializer::new(self.value), visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        de::Deserializer::deserialize_map(Deserializer::new(self.value), visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::{to_value, to_vec};
    use crate::value::{DateTime, DbPointer, Decimal128, JavaScriptCodeWithScope, Regex, Timestamp};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestStruct {
        name: String,
        value: i32,
        big: u64,
        active: bool,
        ratio: f64,
        tags: Vec<String>,
        note: Option<String>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Shape {
        Empty,
        Circle(f64),
        Line(i32, i32),
        Rect { w: u8, h: u8 },
    }

    fn sample() -> TestStruct {
        TestStruct {
            name: "test".to_string(),
            value: 42,
            big: 1 << 40,
            active: true,
            ratio: 0.25,
            tags: vec!["a".to_string(), "b".to_string()],
            note: None,
        }
    }

    #[test]
    fn test_roundtrip_struct() {
        let original = sample();
        let value = to_value(&original).unwrap();
        let restored: TestStruct = from_value(&value).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn test_roundtrip_bytes() {
        let bytes = to_vec(&sample()).unwrap();
        let restored: TestStruct = from_slice(&bytes).unwrap();
        assert_eq!(restored, sample());
    }

    #[test]
    fn test_roundtrip_enums() {
        for shape in [
            Shape::Empty,
            Shape::Circle(2.0),
            Shape::Line(-1, 1),
            Shape::Rect { w: 3, h: 4 },
        ] {
            let value = to_value(&shape).unwrap();
            let restored: Shape = from_value(&value).unwrap();
            assert_eq!(restored, shape);
        }
    }

    #[test]
    fn test_integer_narrowing() {
        let n: i32 = from_value(&Value::Int64(5)).unwrap();
        assert_eq!(n, 5);
        assert!(from_value::<i32>(&Value::Int64(i64::MAX)).is_err());
        assert!(from_value::<u32>(&Value::Int32(-1)).is_err());
        let wide: i64 = from_value(&Value::Int32(-3)).unwrap();
        assert_eq!(wide, -3);
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = from_value::<bool>(&Value::Int32(1)).unwrap_err();
        assert_eq!(err.to_string(), "Deserialization error: Expected boolean, got int32");
    }

    #[test]
    fn test_hashmap_from_document() {
        let doc = Document::builder().append("a", 1).append("b", 2).build();
        let map: HashMap<String, i32> = from_document(doc).unwrap();
        assert_eq!(map.get("b"), Some(&2));
    }

    #[test]
    fn test_from_slice_propagates_decode_error() {
        assert!(matches!(
            from_slice::<TestStruct>(&[5, 0, 0]),
            Err(BsonError::Decode(_))
        ));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: ObjectId,
        at: DateTime,
    }

    #[test]
    fn test_object_id_and_datetime_roundtrip() {
        let original = Record {
            id: ObjectId::from_bytes([1; 12]),
            at: DateTime::from_millis(-1_000),
        };
        let bytes = to_vec(&original).unwrap();
        assert_eq!(bytes[4], 0x07);
        assert_eq!(bytes[20], 0x09);
        let restored: Record = from_slice(&bytes).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_object_id_from_native_value() {
        let doc = Document::builder()
            .append("id", ObjectId::from_bytes([2; 12]))
            .append("at", DateTime::from_millis(5))
            .build();
        let record: Record = from_document(doc).unwrap();
        assert_eq!(record.id, ObjectId::from_bytes([2; 12]));
        assert_eq!(record.at.timestamp_millis(), 5);

        // 十六进制字符串与普通整数同样可接受
        let doc = Document::builder()
            .append("id", "020202020202020202020202")
            .append("at", 5i64)
            .build();
        assert_eq!(from_document::<Record>(doc).unwrap(), record);

        let hex: String = from_value(&Value::ObjectId(record.id)).unwrap();
        assert_eq!(hex, "020202020202020202020202");
    }

    #[test]
    fn test_legacy_types_are_self_describing() {
        let doc = Document::builder()
            .append("re", Regex::new("^a", "i"))
            .append("ts", Timestamp { time: 5, increment: 7 })
            .append(
                "ptr",
                DbPointer {
                    namespace: "db.c".into(),
                    id: ObjectId::from_bytes([9; 12]),
                },
            )
            .append(
                "cws",
                JavaScriptCodeWithScope {
                    code: "g".into(),
                    scope: Document::builder().append("z", 1).build(),
                },
            )
            .append("min", Value::MinKey)
            .append("max", Value::MaxKey)
            .build();
        let bytes = doc.to_bytes().unwrap();
        let value: serde_json::Value = from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({
                "re": { "pattern": "^a", "options": "i" },
                "ts": { "time": 5, "increment": 7 },
                "ptr": { "namespace": "db.c", "id": "090909090909090909090909" },
                "cws": { "code": "g", "scope": { "z": 1 } },
                "min": "minKey",
                "max": "maxKey",
            })
        );
    }

    #[test]
    fn test_legacy_types_into_structs() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Parts {
            time: u32,
            increment: u32,
        }

        let parts: Parts = from_value(&Value::Timestamp(Timestamp { time: 1, increment: 2 })).unwrap();
        assert_eq!(parts, Parts { time: 1, increment: 2 });

        let dec = Value::Decimal128(Decimal128::from_bytes([3; 16]));
        let raw: &[u8] = from_value(&dec).unwrap();
        assert_eq!(raw, &[3; 16]);
    }

    #[test]
    fn test_float_widening() {
        let f: f32 = from_value(&Value::Int64(1 << 20)).unwrap();
        assert_eq!(f, 1_048_576.0);
        let f: f32 = from_value(&Value::Int32(-2)).unwrap();
        assert_eq!(f, -2.0);
        let d: f64 = from_value(&Value::Int64(3)).unwrap();
        assert_eq!(d, 3.0);
    }
}
