//! BSON 线格式常量
//!
//! 类型标记字节、二进制子类型以及长度相关常量。

pub use babybson_common::config::MIN_DOCUMENT_SIZE;

/// 文档结束符
pub const TERMINATOR: u8 = 0x00;

/// 元素类型标记
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    EmbeddedDocument = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Undefined = 0x06,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    RegularExpression = 0x0B,
    DbPointer = 0x0C,
    JavaScriptCode = 0x0D,
    Symbol = 0x0E,
    JavaScriptCodeWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    Decimal128 = 0x13,
    MaxKey = 0x7F,
    MinKey = 0xFF,
}

impl ElementType {
    /// 全部已知标记，按字节值排序
    pub const ALL: [ElementType; 21] = [
        Self::Double,
        Self::String,
        Self::EmbeddedDocument,
        Self::Array,
        Self::Binary,
        Self::Undefined,
        Self::ObjectId,
        Self::Boolean,
        Self::DateTime,
        Self::Null,
        Self::RegularExpression,
        Self::DbPointer,
        Self::JavaScriptCode,
        Self::Symbol,
        Self::JavaScriptCodeWithScope,
        Self::Int32,
        Self::Timestamp,
        Self::Int64,
        Self::Decimal128,
        Self::MaxKey,
        Self::MinKey,
    ];

    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Double),
            0x02 => Some(Self::String),
            0x03 => Some(Self::EmbeddedDocument),
            0x04 => Some(Self::Array),
            0x05 => Some(Self::Binary),
            0x06 => Some(Self::Undefined),
            0x07 => Some(Self::ObjectId),
            0x08 => Some(Self::Boolean),
            0x09 => Some(Self::DateTime),
            0x0A => Some(Self::Null),
            0x0B => Some(Self::RegularExpression),
            0x0C => Some(Self::DbPointer),
            0x0D => Some(Self::JavaScriptCode),
            0x0E => Some(Self::Symbol),
            0x0F => Some(Self::JavaScriptCodeWithScope),
            0x10 => Some(Self::Int32),
            0x11 => Some(Self::Timestamp),
            0x12 => Some(Self::Int64),
            0x13 => Some(Self::Decimal128),
            0x7F => Some(Self::MaxKey),
            0xFF => Some(Self::MinKey),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// 二进制子类型
///
/// 子类型只影响解释方式，编解码器按原样保存子类型字节。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinarySubtype {
    Generic,
    Function,
    BinaryOld,
    UuidOld,
    Uuid,
    Md5,
    Encrypted,
    Column,
    Sensitive,
    Vector,
    UserDefined(u8),
    Reserved(u8),
}

impl From<u8> for BinarySubtype {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => Self::Generic,
            0x01 => Self::Function,
            0x02 => Self::BinaryOld,
            0x03 => Self::UuidOld,
            0x04 => Self::Uuid,
            0x05 => Self::Md5,
            0x06 => Self::Encrypted,
            0x07 => Self::Column,
            0x08 => Self::Sensitive,
            0x09 => Self::Vector,
            b if b >= 0x80 => Self::UserDefined(b),
            b => Self::Reserved(b),
        }
    }
}

impl From<BinarySubtype> for u8 {
    fn from(subtype: BinarySubtype) -> Self {
        match subtype {
            BinarySubtype::Generic => 0x00,
            BinarySubtype::Function => 0x01,
            BinarySubtype::BinaryOld => 0x02,
            BinarySubtype::UuidOld => 0x03,
            BinarySubtype::Uuid => 0x04,
            BinarySubtype::Md5 => 0x05,
            BinarySubtype::Encrypted => 0x06,
            BinarySubtype::Column => 0x07,
            BinarySubtype::Sensitive => 0x08,
            BinarySubtype::Vector => 0x09,
            BinarySubtype::UserDefined(b) | BinarySubtype::Reserved(b) => b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_table_is_consistent() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_u8(ty.as_u8()), Some(ty));
        }
        let known = (0u8..=255)
            .filter(|b| ElementType::from_u8(*b).is_some())
            .count();
        assert_eq!(known, ElementType::ALL.len());
        assert_eq!(ElementType::from_u8(0x00), None);
        assert_eq!(ElementType::from_u8(0x14), None);
    }

    #[test]
    fn test_binary_subtype_byte_roundtrip() {
        for b in 0u8..=255 {
            assert_eq!(u8::from(BinarySubtype::from(b)), b);
        }
        assert_eq!(BinarySubtype::from(0x80), BinarySubtype::UserDefined(0x80));
        assert_eq!(BinarySubtype::from(0x0A), BinarySubtype::Reserved(0x0A));
    }
}
