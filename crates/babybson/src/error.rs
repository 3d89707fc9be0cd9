//! 编解码错误类型
//!
//! 编码与解码各有独立的错误枚举。解码错误都携带出错位置的字节偏移，
//! 便于排查与其他实现之间的互操作问题。畸形输入是永久性错误，不会重试。

use thiserror::Error;

/// 编码错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// 传入的原始字节不是有效的 UTF-8
    #[error("Invalid UTF-8 in field '{field}' at byte {offset}")]
    InvalidUtf8 { field: String, offset: usize },

    /// cstring(字段名、正则模式或选项)中包含 0x00
    #[error("Interior NUL byte in cstring of field '{field}'")]
    InteriorNul { field: String },

    /// 文档体积超出限制
    #[error("Document too large: {size} bytes, max {max}")]
    DocumentTooLarge { size: usize, max: usize },

    /// 嵌套层级过深
    #[error("Nesting too deep: max {max}")]
    NestingTooDeep { max: usize },

    /// 在错误的容器中写入
    #[error("Expected an open {expected}, found {found}")]
    ContainerMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// 没有可关闭的嵌套容器
    #[error("No open container to close")]
    NoOpenContainer,

    /// 结束写入时仍有未关闭的容器
    #[error("{open} container(s) still open")]
    UnclosedContainers { open: usize },
}

/// 解码错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// 输入在需要的字节之前结束
    #[error("Truncated input at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// 元素长度之和与容器声明的长度不符
    #[error(
        "Length mismatch at offset {offset}: container at {container} declares {declared} bytes, elements need {actual}"
    )]
    LengthMismatch {
        offset: usize,
        container: usize,
        declared: usize,
        actual: usize,
    },

    /// 未知的类型标记
    #[error("Invalid type tag 0x{tag:02x} at offset {offset}")]
    InvalidTypeTag { offset: usize, tag: u8 },

    /// 字符串缺少结束符
    #[error("Unterminated string at offset {offset}")]
    UnterminatedString { offset: usize },

    /// 字段名缺少结束符
    #[error("Unterminated field name at offset {offset}")]
    UnterminatedFieldName { offset: usize },

    /// 字符串不是有效的 UTF-8
    #[error("Invalid UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// 顶层文档之后还有多余字节
    #[error("Trailing garbage at offset {offset}: {remaining} unread bytes")]
    TrailingGarbage { offset: usize, remaining: usize },

    /// 长度前缀为负或小于最小值
    #[error("Invalid length {length} at offset {offset}")]
    InvalidLength { offset: usize, length: i32 },

    /// 布尔值字节既不是 0 也不是 1
    #[error("Invalid boolean byte 0x{byte:02x} at offset {offset}")]
    InvalidBoolean { offset: usize, byte: u8 },

    /// 数组键不是下一个十进制下标
    #[error("Invalid array index at offset {offset}: expected \"{expected}\", found \"{found}\"")]
    InvalidArrayIndex {
        offset: usize,
        expected: usize,
        found: String,
    },

    /// 嵌套层级过深
    #[error("Nesting too deep at offset {offset}: max {max}")]
    NestingTooDeep { offset: usize, max: usize },

    /// 文档体积超出限制
    #[error("Document at offset {offset} too large: {size} bytes, max {max}")]
    DocumentTooLarge {
        offset: usize,
        size: usize,
        max: usize,
    },
}

impl DecodeError {
    /// 出错位置的字节偏移(相对于整个输入缓冲区)
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::TruncatedInput { offset, .. }
            | DecodeError::LengthMismatch { offset, .. }
            | DecodeError::InvalidTypeTag { offset, .. }
            | DecodeError::UnterminatedString { offset }
            | DecodeError::UnterminatedFieldName { offset }
            | DecodeError::InvalidUtf8 { offset }
            | DecodeError::TrailingGarbage { offset, .. }
            | DecodeError::InvalidLength { offset, .. }
            | DecodeError::InvalidBoolean { offset, .. }
            | DecodeError::InvalidArrayIndex { offset, .. }
            | DecodeError::NestingTooDeep { offset, .. }
            | DecodeError::DocumentTooLarge { offset, .. } => *offset,
        }
    }

    /// 错误种类的简短名称，用于日志
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::TruncatedInput { .. } => "truncated_input",
            DecodeError::LengthMismatch { .. } => "length_mismatch",
            DecodeError::InvalidTypeTag { .. } => "invalid_type_tag",
            DecodeError::UnterminatedString { .. } => "unterminated_string",
            DecodeError::UnterminatedFieldName { .. } => "unterminated_field_name",
            DecodeError::InvalidUtf8 { .. } => "invalid_utf8",
            DecodeError::TrailingGarbage { .. } => "trailing_garbage",
            DecodeError::InvalidLength { .. } => "invalid_length",
            DecodeError::InvalidBoolean { .. } => "invalid_boolean",
            DecodeError::InvalidArrayIndex { .. } => "invalid_array_index",
            DecodeError::NestingTooDeep { .. } => "nesting_too_deep",
            DecodeError::DocumentTooLarge { .. } => "document_too_large",
        }
    }
}

pub type EncodeResult<T> = Result<T, EncodeError>;
pub type DecodeResult<T> = Result<T, DecodeError>;
