//! # babybson - 自包含的 BSON 编解码器
//!
//! 在内存中的文档树与 BSON 二进制格式之间双向转换，输出与其他 BSON 实现逐字节一致。
//!
//! - **树形编解码**：[`Document`] / [`Value`] 与字节之间的转换，保留字段顺序与重复字段
//! - **严格校验**：解码时检查每个长度前缀与结束符，错误携带出错位置的字节偏移
//! - **流式写入**：[`DocumentWriter`] 直接向缓冲区追加元素，无需先构建文档树
//! - **Serde 集成**：Rust 结构体与 BSON 文档之间的序列化和反序列化
//!
//! ## 快速开始
//!
//! ```rust,ignore
//! use babybson::{decode_document, encode_document, Document};
//!
//! // 构建文档 {"x": {"y": 1}}
//! let doc = Document::builder()
//!     .append_document("x", |b| b.append("y", 1))
//!     .build();
//!
//! // 编码
//! let bytes = encode_document(&doc).unwrap();
//! assert_eq!(bytes.len(), 20);
//!
//! // 解码
//! let restored = decode_document(&bytes).unwrap();
//! assert_eq!(restored, doc);
//! ```

pub mod spec;
pub mod value;
pub mod document;
pub mod error;
pub mod codec;
pub mod writer;
pub mod ser;
pub mod de;

mod decode;
mod encode;

pub use babybson_common::{CodecConfig, ObjectId};
pub use codec::{
    decode_document, decode_document_at, decode_stream, encode_document, encode_document_into,
    encode_element, Codec,
};
pub use de::{from_document, from_slice, from_value};
pub use decode::DocumentStream;
pub use document::{Document, DocumentBuilder};
pub use error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
pub use ser::{to_document, to_value, to_vec};
pub use spec::{BinarySubtype, ElementType};
pub use value::{
    Binary, DateTime, DbPointer, Decimal128, JavaScriptCodeWithScope, Regex, Timestamp, Value,
};
pub use writer::DocumentWriter;

use thiserror::Error;

/// Serde 桥接层的错误类型
///
/// 编解码错误原样包装，序列化/反序列化过程中的类型不匹配以字符串描述
#[derive(Error, Debug)]
pub enum BsonError {
    /// 编码错误
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// 解码错误
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// 序列化过程错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 反序列化过程错误
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

/// Serde 桥接层的 Result 类型别名
pub type BsonResult<T> = Result<T, BsonError>;
