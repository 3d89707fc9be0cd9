//! BSON 值类型定义模块
//!
//! 定义了 BSON 线格式中每个类型标记对应的值，包括基础类型、复合类型
//! 以及只做原样搬运的遗留类型(Regex、DBPointer、Symbol 等)。
//! 使用 `CompactString` 优化短字符串的内存占用。

use crate::document::Document;
use crate::spec::{BinarySubtype, ElementType};
use babybson_common::ObjectId;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{SecondsFormat, TimeZone, Utc};
use compact_str::CompactString;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// BSON 值的枚举类型
///
/// 每个变体与一个类型标记一一对应。
///
/// # 相等性
///
/// 结构相等。`Double` 按位比较，因此 NaN 与自身相等、`0.0` 与 `-0.0` 不相等；
/// `Int32(1)` 与 `Int64(1)` 是不同的值。
///
/// # 示例
///
/// ```rust,ignore
/// use babybson::Value;
///
/// let value = Value::from("hello");
/// assert_eq!(value.type_name(), "string");
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// 64 位 IEEE-754 浮点数
    Double(f64),
    /// UTF-8 字符串
    String(CompactString),
    /// 嵌入文档
    Document(Document),
    /// 数组（线格式上是键为 "0","1",... 的文档）
    Array(Vec<Value>),
    /// 二进制数据 + 子类型
    Binary(Binary),
    /// 已废弃的 undefined
    Undefined,
    /// 12 字节对象标识符
    ObjectId(ObjectId),
    /// 布尔值
    Boolean(bool),
    /// UTC 日期时间（毫秒）
    DateTime(DateTime),
    /// 空值
    Null,
    /// 正则表达式（模式 + 选项）
    Regex(Regex),
    /// 已废弃的 DBPointer
    DbPointer(DbPointer),
    /// JavaScript 代码
    JavaScriptCode(CompactString),
    /// 已废弃的 Symbol
    Symbol(CompactString),
    /// 带作用域的 JavaScript 代码
    JavaScriptCodeWithScope(JavaScriptCodeWithScope),
    /// 32 位有符号整数
    Int32(i32),
    /// 内部时间戳
    Timestamp(Timestamp),
    /// 64 位有符号整数
    Int64(i64),
    /// IEEE-754 decimal128，原样保存 16 字节
    Decimal128(Decimal128),
    /// 比所有值都小的特殊键
    MinKey,
    /// 比所有值都大的特殊键
    MaxKey,
}

/// 二进制值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub subtype: BinarySubtype,
    pub bytes: Vec<u8>,
}

impl Binary {
    /// 创建通用子类型(0x00)的二进制值
    pub fn generic(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype: BinarySubtype::Generic,
            bytes: bytes.into(),
        }
    }

    pub fn new(subtype: BinarySubtype, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype,
            bytes: bytes.into(),
        }
    }

    /// 子类型为 UUID(0x04) 且长度为 16 时解析为 Uuid
    pub fn to_uuid(&self) -> Option<Uuid> {
        if self.subtype != BinarySubtype::Uuid {
            return None;
        }
        let bytes: [u8; 16] = self.bytes.as_slice().try_into().ok()?;
        Some(Uuid::from_bytes(bytes))
    }
}

impl From<Uuid> for Binary {
    fn from(uuid: Uuid) -> Self {
        Self::new(BinarySubtype::Uuid, uuid.as_bytes().to_vec())
    }
}

/// 正则表达式值
///
/// 模式与选项都按 cstring 写出，不能包含 0x00。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regex {
    pub pattern: CompactString,
    pub options: CompactString,
}

impl Regex {
    pub fn new(pattern: impl Into<CompactString>, options: impl Into<CompactString>) -> Self {
        Self {
            pattern: pattern.into(),
            options: options.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbPointer {
    pub namespace: CompactString,
    pub id: ObjectId,
}

/// 带作用域的 JavaScript 代码值
#[derive(Debug, Clone, PartialEq)]
pub struct JavaScriptCodeWithScope {
    pub code: CompactString,
    pub scope: Document,
}

/// 内部时间戳
///
/// 线格式上先写 increment 再写 time，各 4 字节小端。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub time: u32,
    pub increment: u32,
}

/// decimal128 的 16 字节原始表示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal128 {
    bytes: [u8; 16],
}

impl Decimal128 {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> [u8; 16] {
        self.bytes
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.bytes
    }
}

/// UTC 日期时间
///
/// 保存自 Unix 纪元起的有符号毫秒数，任何 i64 都能无损往返；
/// 超出 chrono 表示范围的值仍可编解码，只是无法转换为 `chrono::DateTime`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateTime(i64);

impl DateTime {
    pub const UNIX_EPOCH: DateTime = DateTime(0);

    /// Serde newtype 名称，BSON 序列化器据此输出类型标记 0x09，其他格式看到的是毫秒数
    pub const SERDE_NAME: &'static str = "$__babybson_date_time";

    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.0
    }

    pub fn from_chrono(dt: chrono::DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_chrono(&self) -> Option<chrono::DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_chrono() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => write!(f, "{}ms", self.0),
        }
    }
}

impl Serialize for DateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(Self::SERDE_NAME, &self.0)
    }
}

struct DateTimeVisitor;

impl<'de> Visitor<'de> for DateTimeVisitor {
    type Value = DateTime;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("milliseconds since the Unix epoch")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<DateTime, E> {
        Ok(DateTime(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<DateTime, E> {
        i64::try_from(v)
            .map(DateTime)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, deserializer: D) -> Result<DateTime, D::Error> {
        deserializer.deserialize_i64(self)
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_newtype_struct(Self::SERDE_NAME, DateTimeVisitor)
    }
}

impl Value {
    /// 值在线格式上的类型标记
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Double(_) => ElementType::Double,
            Value::String(_) => ElementType::String,
            Value::Document(_) => ElementType::EmbeddedDocument,
            Value::Array(_) => ElementType::Array,
            Value::Binary(_) => ElementType::Binary,
            Value::Undefined => ElementType::Undefined,
            Value::ObjectId(_) => ElementType::ObjectId,
            Value::Boolean(_) => ElementType::Boolean,
            Value::DateTime(_) => ElementType::DateTime,
            Value::Null => ElementType::Null,
            Value::Regex(_) => ElementType::RegularExpression,
            Value::DbPointer(_) => ElementType::DbPointer,
            Value::JavaScriptCode(_) => ElementType::JavaScriptCode,
            Value::Symbol(_) => ElementType::Symbol,
            Value::JavaScriptCodeWithScope(_) => ElementType::JavaScriptCodeWithScope,
            Value::Int32(_) => ElementType::Int32,
            Value::Timestamp(_) => ElementType::Timestamp,
            Value::Int64(_) => ElementType::Int64,
            Value::Decimal128(_) => ElementType::Decimal128,
            Value::MinKey => ElementType::MinKey,
            Value::MaxKey => ElementType::MaxKey,
        }
    }

    /// 获取值的类型名称
    ///
    /// # Returns
    /// 类型名称的静态字符串引用
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Document(_) => "document",
            Value::Array(_) => "array",
            Value::Binary(_) => "binary",
            Value::Undefined => "undefined",
            Value::ObjectId(_) => "objectId",
            Value::Boolean(_) => "boolean",
            Value::DateTime(_) => "dateTime",
            Value::Null => "null",
            Value::Regex(_) => "regex",
            Value::DbPointer(_) => "dbPointer",
            Value::JavaScriptCode(_) => "javascript",
            Value::Symbol(_) => "symbol",
            Value::JavaScriptCodeWithScope(_) => "javascriptWithScope",
            Value::Int32(_) => "int32",
            Value::Timestamp(_) => "timestamp",
            Value::Int64(_) => "int64",
            Value::Decimal128(_) => "decimal128",
            Value::MinKey => "minKey",
            Value::MaxKey => "maxKey",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(n) => Some(*n),
            _ => None,
        }
    }

    /// 尝试获取 i64 值
    ///
    /// # Brief
    /// 如果值是整数类型（Int32 或 Int64），返回 i64 值
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(n) => Some(*n as i64),
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Binary> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Value::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// 获取指定键的值
    ///
    /// # Brief
    /// 从文档中获取指定键的值(首次出现者)，或从数组中获取指定索引的值
    ///
    /// # Arguments
    /// * `key` - 键名（文档）或索引字符串（数组）
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Document(doc) => doc.get(key),
            Value::Array(arr) => key.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Undefined, Value::Undefined) => true,
            (Value::ObjectId(a), Value::ObjectId(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Regex(a), Value::Regex(b)) => a == b,
            (Value::DbPointer(a), Value::DbPointer(b)) => a == b,
            (Value::JavaScriptCode(a), Value::JavaScriptCode(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::JavaScriptCodeWithScope(a), Value::JavaScriptCodeWithScope(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Decimal128(a), Value::Decimal128(b)) => a == b,
            (Value::MinKey, Value::MinKey) => true,
            (Value::MaxKey, Value::MaxKey) => true,
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Double(n) => write!(f, "{:?}", n),
            Value::String(s) => write!(f, "{:?}", s.as_str()),
            Value::Document(doc) => write!(f, "{}", doc),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Binary(b) => write!(
                f,
                "Binary(0x{:02x}, {})",
                u8::from(b.subtype),
                STANDARD.encode(&b.bytes)
            ),
            Value::Undefined => write!(f, "undefined"),
            Value::ObjectId(id) => write!(f, "ObjectId(\"{}\")", id),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::DateTime(dt) => write!(f, "DateTime(\"{}\")", dt),
            Value::Null => write!(f, "null"),
            Value::Regex(r) => write!(f, "/{}/{}", r.pattern, r.options),
            Value::DbPointer(p) => write!(f, "DBPointer({:?}, {})", p.namespace.as_str(), p.id),
            Value::JavaScriptCode(code) => write!(f, "JavaScript({})", code),
            Value::Symbol(s) => write!(f, "Symbol({:?})", s.as_str()),
            Value::JavaScriptCodeWithScope(js) => {
                write!(f, "JavaScript({}, scope: {})", js.code, js.scope)
            }
            Value::Int32(n) => write!(f, "{}", n),
            Value::Timestamp(ts) => write!(f, "Timestamp({}, {})", ts.time, ts.increment),
            Value::Int64(n) => write!(f, "NumberLong({})", n),
            Value::Decimal128(d) => {
                write!(f, "Decimal128(0x")?;
                for b in d.bytes().iter().rev() {
                    write!(f, "{:02x}", b)?;
                }
                write!(f, ")")
            }
            Value::MinKey => write!(f, "MinKey"),
            Value::MaxKey => write!(f, "MaxKey"),
        }
    }
}

// ============================================================================
// From 特征实现 - 支持从各种 Rust 类型转换为 Value
// ============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(CompactString::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(CompactString::from(v))
    }
}

impl From<CompactString> for Value {
    fn from(v: CompactString) -> Self {
        Value::String(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl From<Binary> for Value {
    fn from(v: Binary) -> Self {
        Value::Binary(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Binary(Binary::from(v))
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::ObjectId(v)
    }
}

impl From<DateTime> for Value {
    fn from(v: DateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<chrono::DateTime<Utc>> for Value {
    fn from(v: chrono::DateTime<Utc>) -> Self {
        Value::DateTime(DateTime::from_chrono(v))
    }
}

impl From<Regex> for Value {
    fn from(v: Regex) -> Self {
        Value::Regex(v)
    }
}

impl From<DbPointer> for Value {
    fn from(v: DbPointer) -> Self {
        Value::DbPointer(v)
    }
}

impl From<JavaScriptCodeWithScope> for Value {
    fn from(v: JavaScriptCodeWithScope) -> Self {
        Value::JavaScriptCodeWithScope(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Decimal128> for Value {
    fn from(v: Decimal128) -> Self {
        Value::Decimal128(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_equality_is_bitwise() {
        let nan = Value::Double(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
        assert_eq!(Value::Double(1.5), Value::Double(1.5));
    }

    #[test]
    fn test_int_widths_are_distinct() {
        assert_ne!(Value::Int32(1), Value::Int64(1));
        assert_eq!(Value::Int32(7).as_i64(), Some(7));
        assert_eq!(Value::Int64(7).as_i32(), None);
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(1), Value::Int32(1));
        assert_eq!(Value::from(1i64), Value::Int64(1));
        assert_eq!(Value::from("a"), Value::String("a".into()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(
            Value::from(vec![1, 2]),
            Value::Array(vec![Value::Int32(1), Value::Int32(2)])
        );
    }

    #[test]
    fn test_uuid_binary() {
        let uuid = Uuid::from_bytes([7u8; 16]);
        let value = Value::from(uuid);
        let binary = value.as_binary().unwrap();
        assert_eq!(binary.subtype, BinarySubtype::Uuid);
        assert_eq!(binary.to_uuid(), Some(uuid));
        assert_eq!(Binary::generic(vec![7u8; 16]).to_uuid(), None);
    }

    #[test]
    fn test_datetime_conversions() {
        let dt = DateTime::from_millis(1_000);
        assert_eq!(dt.to_string(), "1970-01-01T00:00:01.000Z");
        let chrono_dt = dt.to_chrono().unwrap();
        assert_eq!(DateTime::from_chrono(chrono_dt), dt);
        assert_eq!(DateTime::from_millis(i64::MAX).to_chrono(), None);
        assert_eq!(DateTime::from_millis(i64::MAX).to_string(), format!("{}ms", i64::MAX));
    }

    #[test]
    fn test_element_types_are_distinct() {
        let values = [
            Value::Double(1.0),
            Value::String("s".into()),
            Value::Document(Document::new()),
            Value::Array(vec![]),
            Value::Binary(Binary::generic(vec![])),
            Value::Undefined,
            Value::ObjectId(ObjectId::from_bytes([0; 12])),
            Value::Boolean(true),
            Value::DateTime(DateTime::UNIX_EPOCH),
            Value::Null,
            Value::Regex(Regex::new("a", "")),
            Value::DbPointer(DbPointer {
                namespace: "db.c".into(),
                id: ObjectId::from_bytes([0; 12]),
            }),
            Value::JavaScriptCode("x".into()),
            Value::Symbol("s".into()),
            Value::JavaScriptCodeWithScope(JavaScriptCodeWithScope {
                code: "x".into(),
                scope: Document::new(),
            }),
            Value::Int32(1),
            Value::Timestamp(Timestamp { time: 1, increment: 1 }),
            Value::Int64(1),
            Value::Decimal128(Decimal128::from_bytes([0; 16])),
            Value::MinKey,
            Value::MaxKey,
        ];
        let mut tags: Vec<u8> = values.iter().map(|v| v.element_type().as_u8()).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), ElementType::ALL.len());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int32(5).to_string(), "5");
        assert_eq!(Value::Int64(5).to_string(), "NumberLong(5)");
        assert_eq!(Value::from("hi").to_string(), "\"hi\"");
        assert_eq!(Value::Binary(Binary::generic(vec![1, 2, 3])).to_string(), "Binary(0x00, AQID)");
        assert_eq!(Value::Regex(Regex::new("^a", "i")).to_string(), "/^a/i");
    }
}
