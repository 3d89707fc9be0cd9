//! 流式文档写入器
//!
//! 不构建 Document 树，直接把元素追加到字节缓冲区。
//! 每个打开的容器记录其长度前缀的位置，关闭时回填。

use crate::encode::{backpatch_length, Encoder};
use crate::error::{EncodeError, EncodeResult};
use crate::spec::{ElementType, TERMINATOR};
use crate::value::Value;
use babybson_common::CodecConfig;
use bytes::{BufMut, BytesMut};
use smallvec::SmallVec;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Document,
    Array,
}

impl ContainerKind {
    fn name(self) -> &'static str {
        match self {
            ContainerKind::Document => "document",
            ContainerKind::Array => "array",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenContainer {
    kind: ContainerKind,
    start: usize,
    next_index: usize,
}

/// 流式 BSON 写入器
///
/// 顶层文档在创建时隐式打开，`finish` 时关闭。
/// 文档上下文中用 `append` / `start_*` 写入带名字段，
/// 数组上下文中用 `push` / `push_*` 写入，下标键自动生成。
///
/// # Example
/// ```rust,ignore
/// let mut writer = DocumentWriter::new();
/// writer.start_document("x")?.append("y", 1)?.end_document()?;
/// let bytes = writer.finish()?;
/// ```
#[derive(Debug)]
pub struct DocumentWriter {
    buf: BytesMut,
    config: CodecConfig,
    open: SmallVec<[OpenContainer; 8]>,
}

impl Default for DocumentWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentWriter {
    pub fn new() -> Self {
        Self::with_config(CodecConfig::default())
    }

    pub fn with_config(config: CodecConfig) -> Self {
        let mut buf = BytesMut::with_capacity(256);
        buf.put_i32_le(0);
        Self {
            buf,
            config,
            open: SmallVec::new(),
        }
    }

    /// 已写入的字节数(含未回填的长度前缀)
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() == 4 && self.open.is_empty()
    }

    /// 在文档上下文中追加字段
    pub fn append(&mut self, key: &str, value: impl Into<Value>) -> EncodeResult<&mut Self> {
        self.expect_context(ContainerKind::Document)?;
        self.write_element(key, &value.into())?;
        Ok(self)
    }

    /// 追加字符串字段，内容以原始字节给出
    ///
    /// # Returns
    /// 字节不是有效 UTF-8 时返回 `InvalidUtf8`，并指出第一个无效字节的位置
    pub fn append_utf8(&mut self, key: &str, bytes: &[u8]) -> EncodeResult<&mut Self> {
        let s = utf8(key, bytes)?;
        self.append(key, s)
    }

    /// 打开一个嵌入文档字段
    pub fn start_document(&mut self, key: &str) -> EncodeResult<&mut Self> {
        self.expect_context(ContainerKind::Document)?;
        self.open_container(key, ContainerKind::Document)?;
        Ok(self)
    }

    /// 打开一个数组字段
    pub fn start_array(&mut self, key: &str) -> EncodeResult<&mut Self> {
        self.expect_context(ContainerKind::Document)?;
        self.open_container(key, ContainerKind::Array)?;
        Ok(self)
    }

    /// 在数组上下文中追加元素
    pub fn push(&mut self, value: impl Into<Value>) -> EncodeResult<&mut Self> {
        self.expect_context(ContainerKind::Array)?;
        let key = self.next_index();
        self.write_element(&key, &value.into())?;
        self.advance_index();
        Ok(self)
    }

    pub fn push_utf8(&mut self, bytes: &[u8]) -> EncodeResult<&mut Self> {
        self.expect_context(ContainerKind::Array)?;
        let key = self.next_index();
        let s = utf8(&key, bytes)?;
        self.push(s)
    }

    /// 在数组中打开一个嵌入文档元素
    pub fn push_document(&mut self) -> EncodeResult<&mut Self> {
        self.expect_context(ContainerKind::Array)?;
        let key = self.next_index();
        self.open_container(&key, ContainerKind::Document)?;
        Ok(self)
    }

    /// 在数组中打开一个嵌套数组元素
    pub fn push_array(&mut self) -> EncodeResult<&mut Self> {
        self.expect_context(ContainerKind::Array)?;
        let key = self.next_index();
        self.open_container(&key, ContainerKind::Array)?;
        Ok(self)
    }

    pub fn end_document(&mut self) -> EncodeResult<&mut Self> {
        self.close_container(ContainerKind::Document)?;
        Ok(self)
    }

    pub fn end_array(&mut self) -> EncodeResult<&mut Self> {
        self.close_container(ContainerKind::Array)?;
        Ok(self)
    }

    /// 关闭顶层文档并返回完整字节
    ///
    /// # Returns
    /// 仍有嵌套容器未关闭时返回 `UnclosedContainers`
    pub fn finish(mut self) -> EncodeResult<Vec<u8>> {
        if !self.open.is_empty() {
            return Err(EncodeError::UnclosedContainers {
                open: self.open.len(),
            });
        }
        self.buf.put_u8(TERMINATOR);
        let size = backpatch_length(&mut self.buf, 0)?;
        if size > self.config.max_document_size {
            return Err(EncodeError::DocumentTooLarge {
                size,
                max: self.config.max_document_size,
            });
        }
        trace!(size, "Finished streamed document");
        Ok(self.buf.to_vec())
    }

    fn current_kind(&self) -> ContainerKind {
        self.open
            .last()
            .map(|c| c.kind)
            .unwrap_or(ContainerKind::Document)
    }

    fn expect_context(&self, expected: ContainerKind) -> EncodeResult<()> {
        let found = self.current_kind();
        if found != expected {
            return Err(EncodeError::ContainerMismatch {
                expected: expected.name(),
                found: found.name(),
            });
        }
        Ok(())
    }

    fn next_index(&self) -> String {
        self.open
            .last()
            .map(|c| c.next_index)
            .unwrap_or(0)
            .to_string()
    }

    fn advance_index(&mut self) {
        if let Some(top) = self.open.last_mut() {
            top.next_index += 1;
        }
    }

    /// 写出完整元素；失败时撤销已写入的部分
    fn write_element(&mut self, key: &str, value: &Value) -> EncodeResult<()> {
        let mark = self.buf.len();
        let depth = self.open.len() + 1;
        let result = Encoder::with_depth(&mut self.buf, &self.config, depth).write_element(key, value);
        if result.is_err() {
            self.buf.truncate(mark);
        }
        result
    }

    fn open_container(&mut self, key: &str, kind: ContainerKind) -> EncodeResult<()> {
        let depth = self.open.len() + 1;
        if depth > self.config.nesting_limit() {
            return Err(EncodeError::NestingTooDeep {
                max: self.config.nesting_limit(),
            });
        }
        let ty = match kind {
            ContainerKind::Document => ElementType::EmbeddedDocument,
            ContainerKind::Array => ElementType::Array,
        };
        let mark = self.buf.len();
        if let Err(e) = Encoder::with_depth(&mut self.buf, &self.config, depth).write_header(ty, key) {
            self.buf.truncate(mark);
            return Err(e);
        }
        let start = self.buf.len();
        self.buf.put_i32_le(0);
        self.open.push(OpenContainer {
            kind,
            start,
            next_index: 0,
        });
        Ok(())
    }

    fn close_container(&mut self, kind: ContainerKind) -> EncodeResult<()> {
        let top = self.open.last().copied().ok_or(EncodeError::NoOpenContainer)?;
        if top.kind != kind {
            return Err(EncodeError::ContainerMismatch {
                expected: kind.name(),
                found: top.kind.name(),
            });
        }
        self.buf.put_u8(TERMINATOR);
        backpatch_length(&mut self.buf, top.start)?;
        self.open.pop();
        // 刚关闭的容器本身是外层数组的一个元素
        self.advance_index();
        Ok(())
    }
}

fn utf8<'b>(field: &str, bytes: &'b [u8]) -> EncodeResult<&'b str> {
    std::str::from_utf8(bytes).map_err(|e| EncodeError::InvalidUtf8 {
        field: field.to_string(),
        offset: e.valid_up_to(),
    })
}
