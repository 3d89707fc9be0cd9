//! 公共类型定义模块
//!
//! ObjectId: 12 字节标识符，BSON 类型标记 0x07 与 DBPointer 的载荷。

use crate::error::{CommonError, CommonResult};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// ObjectId - 12 字节标识符
///
/// 格式:
/// - 前 4 字节: 时间戳(秒,大端)
/// - 后 8 字节: 由生成方决定(随机数与计数器)
///
/// 编解码器只搬运这 12 个字节，不做任何解释。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Serde newtype 名称
    ///
    /// BSON 序列化器据此把内部的十六进制字符串还原为类型标记 0x07，
    /// 其他格式看到的只是普通字符串。
    pub const SERDE_NAME: &'static str = "$__babybson_object_id";
}

impl ObjectId {
    pub const LEN: usize = 12;

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// 前 4 字节中的生成时间(秒)
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// 从 24 位十六进制字符串解析
    ///
    /// # Arguments
    /// * `s` - 十六进制字符串，大小写均可
    ///
    /// # Returns
    /// 成功返回 ObjectId，长度或字符非法返回 `CommonError::InvalidObjectId`
    pub fn from_hex(s: &str) -> CommonResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| CommonError::InvalidObjectId(format!("Invalid hex: {}", e)))?;
        if bytes.len() != Self::LEN {
            return Err(CommonError::InvalidObjectId(format!(
                "ObjectId must be 12 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 12];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl From<[u8; 12]> for ObjectId {
    fn from(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }
}

impl FromStr for ObjectId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(Self::SERDE_NAME, &self.to_hex())
    }
}

struct ObjectIdVisitor;

impl<'de> Visitor<'de> for ObjectIdVisitor {
    type Value = ObjectId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an ObjectId as 24 hex characters or 12 bytes")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ObjectId, E> {
        ObjectId::from_hex(v).map_err(E::custom)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<ObjectId, E> {
        <[u8; 12]>::try_from(v)
            .map(ObjectId)
            .map_err(|_| E::invalid_length(v.len(), &self))
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, deserializer: D) -> Result<ObjectId, D::Error> {
        deserializer.deserialize_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_newtype_struct(Self::SERDE_NAME, ObjectIdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let oid = ObjectId::from_hex("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(oid.to_hex(), "507f1f77bcf86cd799439011");
        assert_eq!(oid.to_string(), "507f1f77bcf86cd799439011");
        assert_eq!(oid.timestamp(), 0x507f1f77);
    }

    #[test]
    fn test_from_str_uppercase() {
        let oid: ObjectId = "507F1F77BCF86CD799439011".parse().unwrap();
        assert_eq!(oid.as_bytes()[0], 0x50);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let oid = ObjectId::from_bytes([0xab; 12]);
        let text = toml::to_string(&Wrapper { id: oid }).unwrap();
        assert_eq!(text.trim(), r#"id = "abababababababababababab""#);

        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.id, oid);
        assert!(toml::from_str::<Wrapper>(r#"id = "abab""#).is_err());
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Wrapper {
        id: ObjectId,
    }

    #[test]
    fn test_invalid_hex() {
        assert!(matches!(
            ObjectId::from_hex("zz7f1f77bcf86cd799439011"),
            Err(CommonError::InvalidObjectId(_))
        ));
        assert!(matches!(
            ObjectId::from_hex("507f1f77"),
            Err(CommonError::InvalidObjectId(_))
        ));
    }
}
