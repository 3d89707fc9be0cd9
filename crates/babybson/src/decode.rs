//! BSON 解码模块
//!
//! 边解析边校验：长度前缀只用于带边界检查的切片，不被信任。
//! 遇到第一个结构错误立即返回，不做截断或类型强转。

use crate::document::Document;
use crate::error::{DecodeError, DecodeResult};
use crate::spec::{ElementType, MIN_DOCUMENT_SIZE, TERMINATOR};
use crate::value::{
    Binary, DateTime, DbPointer, Decimal128, JavaScriptCodeWithScope, Regex, Timestamp, Value,
};
use babybson_common::{CodecConfig, ObjectId};
use compact_str::CompactString;
use tracing::debug;

/// code_w_s 的最小长度: 4 字节总长 + 最短字符串(5) + 空文档(5)
const MIN_CODE_WITH_SCOPE_SIZE: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Document,
    Array,
}

/// cstring 所属的位置，决定缺少结束符时报告哪种错误
#[derive(Debug, Clone, Copy)]
enum CStringKind {
    FieldName,
    Payload,
}

/// 当前正在解析的容器: 起始偏移与声明长度
#[derive(Debug, Clone, Copy)]
struct Frame {
    start: usize,
    declared: usize,
}

/// BSON 解码器
///
/// 内部结构，从字节切片中解析文档。所有偏移都相对于整个 `data`。
pub(crate) struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
    frame: Frame,
    config: &'a CodecConfig,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(data: &'a [u8], config: &'a CodecConfig) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
            frame: Frame {
                start: 0,
                declared: data.len(),
            },
            config,
        }
    }

    /// 解码 `offset` 处的顶层文档
    ///
    /// # Returns
    /// 成功返回文档与消费的字节数
    pub(crate) fn decode_top_level(&mut self, offset: usize) -> DecodeResult<(Document, usize)> {
        let available = self.data.len().saturating_sub(offset);
        if available < MIN_DOCUMENT_SIZE {
            return Err(DecodeError::TruncatedInput {
                offset,
                needed: MIN_DOCUMENT_SIZE,
                available,
            });
        }

        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&self.data[offset..offset + 4]);
        let declared = i32::from_le_bytes(prefix);
        if declared < MIN_DOCUMENT_SIZE as i32 {
            return Err(DecodeError::InvalidLength {
                offset,
                length: declared,
            });
        }
        let declared = declared as usize;
        if declared > self.config.max_document_size {
            return Err(DecodeError::DocumentTooLarge {
                offset,
                size: declared,
                max: self.config.max_document_size,
            });
        }
        if declared > available {
            return Err(DecodeError::TruncatedInput {
                offset,
                needed: declared,
                available,
            });
        }

        self.pos = offset;
        self.depth = 0;
        self.frame = Frame {
            start: offset,
            declared,
        };
        let end = offset + declared;
        let doc = self.read_document(end)?;
        Ok((doc, self.pos - offset))
    }

    fn read_document(&mut self, limit: usize) -> DecodeResult<Document> {
        let elements = self.read_container(limit, ContainerKind::Document)?;
        Ok(Document::from_elements(elements))
    }

    fn read_array(&mut self, limit: usize) -> DecodeResult<Vec<Value>> {
        let elements = self.read_container(limit, ContainerKind::Array)?;
        Ok(elements.into_iter().map(|(_, v)| v).collect())
    }

    /// 读取一个带长度前缀的容器，`limit` 为外层容器允许的最远位置
    fn read_container(
        &mut self,
        limit: usize,
        kind: ContainerKind,
    ) -> DecodeResult<Vec<(CompactString, Value)>> {
        let start = self.pos;
        if self.depth > self.config.nesting_limit() {
            return Err(DecodeError::NestingTooDeep {
                offset: start,
                max: self.config.nesting_limit(),
            });
        }

        let declared = self.read_i32(limit)?;
        if declared < MIN_DOCUMENT_SIZE as i32 {
            return Err(DecodeError::InvalidLength {
                offset: start,
                length: declared,
            });
        }
        let declared = declared as usize;
        let end = start + declared;
        self.check_bounds(start, declared, limit)?;

        let parent = self.frame;
        self.frame = Frame { start, declared };
        self.depth += 1;

        let body_end = end - 1;
        let mut elements = Vec::new();
        loop {
            let tag_offset = self.pos;
            let tag = self.read_u8(end)?;
            if tag == TERMINATOR {
                if tag_offset != body_end {
                    return Err(self.mismatch(tag_offset, tag_offset + 1));
                }
                break;
            }
            if tag_offset == body_end {
                return Err(self.mismatch(tag_offset, declared + 1));
            }
            let ty = ElementType::from_u8(tag).ok_or(DecodeError::InvalidTypeTag {
                offset: tag_offset,
                tag,
            })?;

            let key_offset = self.pos;
            let key = self.read_cstring(body_end, CStringKind::FieldName)?;
            if kind == ContainerKind::Array && self.config.strict_array_indices {
                let expected = elements.len();
                if key.as_str() != expected.to_string() {
                    return Err(DecodeError::InvalidArrayIndex {
                        offset: key_offset,
                        expected,
                        found: key.to_string(),
                    });
                }
            }

            let value = self.read_value(ty, body_end)?;
            elements.push((key, value));
        }

        self.depth -= 1;
        self.frame = parent;
        Ok(elements)
    }

    fn read_value(&mut self, ty: ElementType, limit: usize) -> DecodeResult<Value> {
        let value = match ty {
            ElementType::Double => Value::Double(f64::from_le_bytes(self.read_fixed(limit)?)),
            ElementType::String => Value::String(self.read_string(limit)?),
            ElementType::EmbeddedDocument => Value::Document(self.read_document(limit)?),
            ElementType::Array => Value::Array(self.read_array(limit)?),
            ElementType::Binary => {
                let offset = self.pos;
                let len = self.read_i32(limit)?;
                if len < 0 {
                    return Err(DecodeError::InvalidLength { offset, length: len });
                }
                let subtype = self.read_u8(limit)?;
                let bytes = self.read_bytes(len as usize, limit)?.to_vec();
                Value::Binary(Binary::new(subtype.into(), bytes))
            }
            ElementType::Undefined => Value::Undefined,
            ElementType::ObjectId => Value::ObjectId(self.read_object_id(limit)?),
            ElementType::Boolean => {
                let offset = self.pos;
                match self.read_u8(limit)? {
                    0 => Value::Boolean(false),
                    1 => Value::Boolean(true),
                    byte => return Err(DecodeError::InvalidBoolean { offset, byte }),
                }
            }
            ElementType::DateTime => {
                Value::DateTime(DateTime::from_millis(i64::from_le_bytes(self.read_fixed(limit)?)))
            }
            ElementType::Null => Value::Null,
            ElementType::RegularExpression => {
                let pattern = self.read_cstring(limit, CStringKind::Payload)?;
                let options = self.read_cstring(limit, CStringKind::Payload)?;
                Value::Regex(Regex { pattern, options })
            }
            ElementType::DbPointer => {
                let namespace = self.read_string(limit)?;
                let id = self.read_object_id(limit)?;
                Value::DbPointer(DbPointer { namespace, id })
            }
            ElementType::JavaScriptCode => Value::JavaScriptCode(self.read_string(limit)?),
            ElementType::Symbol => Value::Symbol(self.read_string(limit)?),
            ElementType::JavaScriptCodeWithScope => self.read_code_with_scope(limit)?,
            ElementType::Int32 => Value::Int32(i32::from_le_bytes(self.read_fixed(limit)?)),
            ElementType::Timestamp => {
                let increment = u32::from_le_bytes(self.read_fixed(limit)?);
                let time = u32::from_le_bytes(self.read_fixed(limit)?);
                Value::Timestamp(Timestamp { time, increment })
            }
            ElementType::Int64 => Value::Int64(i64::from_le_bytes(self.read_fixed(limit)?)),
            ElementType::Decimal128 => Value::Decimal128(Decimal128::from_bytes(self.read_fixed(limit)?)),
            ElementType::MinKey => Value::MinKey,
            ElementType::MaxKey => Value::MaxKey,
        };
        Ok(value)
    }

    fn read_code_with_scope(&mut self, limit: usize) -> DecodeResult<Value> {
        let start = self.pos;
        let total = self.read_i32(limit)?;
        if total < MIN_CODE_WITH_SCOPE_SIZE as i32 {
            return Err(DecodeError::InvalidLength {
                offset: start,
                length: total,
            });
        }
        let total = total as usize;
        self.check_bounds(start, total, limit)?;
        let end = start + total;

        let parent = self.frame;
        self.frame = Frame {
            start,
            declared: total,
        };
        let code = self.read_string(end)?;
        let scope = self.read_document(end)?;
        if self.pos != end {
            return Err(self.mismatch(self.pos, self.pos - start));
        }
        self.frame = parent;

        Ok(Value::JavaScriptCodeWithScope(JavaScriptCodeWithScope { code, scope }))
    }

    /// 长度前缀字符串: 长度必须至少为 1，最后一个字节必须是 0x00
    fn read_string(&mut self, limit: usize) -> DecodeResult<CompactString> {
        let offset = self.pos;
        let len = self.read_i32(limit)?;
        if len < 1 {
            return Err(DecodeError::InvalidLength { offset, length: len });
        }
        let body_offset = self.pos;
        let bytes = self.read_bytes(len as usize, limit)?;
        let (content, terminator) = bytes.split_at(bytes.len() - 1);
        if terminator[0] != TERMINATOR {
            return Err(DecodeError::UnterminatedString { offset });
        }
        let s = std::str::from_utf8(content).map_err(|e| DecodeError::InvalidUtf8 {
            offset: body_offset + e.valid_up_to(),
        })?;
        Ok(CompactString::from(s))
    }

    fn read_cstring(&mut self, limit: usize, kind: CStringKind) -> DecodeResult<CompactString> {
        let offset = self.pos;
        let window = &self.data[offset..limit.max(offset)];
        let nul = match window.iter().position(|b| *b == TERMINATOR) {
            Some(n) => n,
            None => {
                return Err(match kind {
                    CStringKind::FieldName => DecodeError::UnterminatedFieldName { offset },
                    CStringKind::Payload => DecodeError::UnterminatedString { offset },
                })
            }
        };
        let s = std::str::from_utf8(&window[..nul]).map_err(|e| DecodeError::InvalidUtf8 {
            offset: offset + e.valid_up_to(),
        })?;
        self.pos = offset + nul + 1;
        Ok(CompactString::from(s))
    }

    fn read_object_id(&mut self, limit: usize) -> DecodeResult<ObjectId> {
        Ok(ObjectId::from_bytes(self.read_fixed(limit)?))
    }

    fn read_u8(&mut self, limit: usize) -> DecodeResult<u8> {
        self.ensure(1, limit)?;
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_i32(&mut self, limit: usize) -> DecodeResult<i32> {
        Ok(i32::from_le_bytes(self.read_fixed(limit)?))
    }

    fn read_fixed<const N: usize>(&mut self, limit: usize) -> DecodeResult<[u8; N]> {
        self.ensure(N, limit)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn read_bytes(&mut self, len: usize, limit: usize) -> DecodeResult<&'a [u8]> {
        self.ensure(len, limit)?;
        let data: &'a [u8] = self.data;
        let bytes = &data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// 确认从当前位置起还有 `n` 个字节可读
    ///
    /// `limit` 是已校验过的容器边界，不会超过缓冲区末尾，
    /// 越界即说明元素长度之和与容器声明不符。
    fn ensure(&self, n: usize, limit: usize) -> DecodeResult<()> {
        let end = self.pos.saturating_add(n);
        if end > limit {
            return Err(self.mismatch(self.pos, end - self.frame.start));
        }
        Ok(())
    }

    /// 校验子结构 [start, start + len) 的边界
    fn check_bounds(&self, start: usize, len: usize, limit: usize) -> DecodeResult<()> {
        let end = start.saturating_add(len);
        if end > self.data.len() {
            return Err(DecodeError::TruncatedInput {
                offset: start,
                needed: len,
                available: self.data.len() - start,
            });
        }
        if end > limit {
            return Err(self.mismatch(start, end - self.frame.start));
        }
        Ok(())
    }

    fn mismatch(&self, offset: usize, actual: usize) -> DecodeError {
        DecodeError::LengthMismatch {
            offset,
            container: self.frame.start,
            declared: self.frame.declared,
            actual,
        }
    }
}

/// 连续文档流
///
/// 依次解码缓冲区中首尾相接的顶层文档。遇到第一个错误后产出该错误并停止，
/// 不会尝试跳过损坏的字节重新同步。
pub struct DocumentStream<'a> {
    data: &'a [u8],
    pos: usize,
    config: CodecConfig,
    done: bool,
}

impl<'a> DocumentStream<'a> {
    pub(crate) fn new(data: &'a [u8], config: CodecConfig) -> Self {
        Self {
            data,
            pos: 0,
            config,
            done: false,
        }
    }

    /// 已消费的字节数
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for DocumentStream<'_> {
    type Item = DecodeResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.data.len() {
            return None;
        }
        match Decoder::new(self.data, &self.config).decode_top_level(self.pos) {
            Ok((doc, consumed)) => {
                self.pos += consumed;
                Some(Ok(doc))
            }
            Err(e) => {
                debug!(offset = e.offset(), kind = e.kind(), "Stream decode stopped: {}", e);
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
