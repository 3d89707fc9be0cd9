//! BSON 编码模块
//!
//! 深度优先遍历值树：每个容器先预留 4 字节长度前缀，按插入顺序写出子元素，
//! 追加结束符后回填长度。

use crate::document::Document;
use crate::error::{EncodeError, EncodeResult};
use crate::spec::{ElementType, TERMINATOR};
use crate::value::Value;
use babybson_common::CodecConfig;
use bytes::{BufMut, BytesMut};

/// 回填 `start` 处预留的长度前缀
///
/// # Brief
/// 长度为从前缀起始到当前缓冲区末尾(含结束符)的字节数
///
/// # Returns
/// 成功返回容器总长度，超出 i32 范围返回 `DocumentTooLarge`
pub(crate) fn backpatch_length(buf: &mut BytesMut, start: usize) -> EncodeResult<usize> {
    let size = buf.len() - start;
    let len = i32::try_from(size).map_err(|_| EncodeError::DocumentTooLarge {
        size,
        max: i32::MAX as usize,
    })?;
    buf[start..start + 4].copy_from_slice(&len.to_le_bytes());
    Ok(size)
}

/// BSON 编码器
///
/// 内部结构，将 Document / Value 写入调用方提供的缓冲区
pub(crate) struct Encoder<'a> {
    buf: &'a mut BytesMut,
    config: &'a CodecConfig,
    depth: usize,
}

impl<'a> Encoder<'a> {
    pub(crate) fn new(buf: &'a mut BytesMut, config: &'a CodecConfig) -> Self {
        Self::with_depth(buf, config, 0)
    }

    /// 从给定嵌套深度开始编码(流式写入器在已打开的容器内使用)
    pub(crate) fn with_depth(buf: &'a mut BytesMut, config: &'a CodecConfig, depth: usize) -> Self {
        Self { buf, config, depth }
    }

    pub(crate) fn write_document(&mut self, doc: &Document) -> EncodeResult<()> {
        let start = self.begin_container()?;
        for (key, value) in doc.iter() {
            self.write_element(key, value)?;
        }
        self.end_container(start)
    }

    fn write_array(&mut self, arr: &[Value]) -> EncodeResult<()> {
        let start = self.begin_container()?;
        for (index, value) in arr.iter().enumerate() {
            self.write_element(&index.to_string(), value)?;
        }
        self.end_container(start)
    }

    /// 写出一个完整元素: 类型标记 + 字段名 + 载荷
    pub(crate) fn write_element(&mut self, key: &str, value: &Value) -> EncodeResult<()> {
        self.write_header(value.element_type(), key)?;
        self.write_payload(key, value)
    }

    pub(crate) fn write_header(&mut self, ty: ElementType, key: &str) -> EncodeResult<()> {
        self.buf.put_u8(ty.as_u8());
        self.write_cstring(key, key)
    }

    fn write_payload(&mut self, key: &str, value: &Value) -> EncodeResult<()> {
        match value {
            Value::Double(n) => {
                self.buf.put_f64_le(*n);
            }
            Value::String(s) | Value::JavaScriptCode(s) | Value::Symbol(s) => {
                self.write_string(s)?;
            }
            Value::Document(doc) => {
                self.write_document(doc)?;
            }
            Value::Array(arr) => {
                self.write_array(arr)?;
            }
            Value::Binary(b) => {
                self.write_len(b.bytes.len())?;
                self.buf.put_u8(b.subtype.into());
                self.buf.put_slice(&b.bytes);
            }
            Value::ObjectId(id) => {
                self.buf.put_slice(id.as_bytes());
            }
            Value::Boolean(b) => {
                self.buf.put_u8(u8::from(*b));
            }
            Value::DateTime(dt) => {
                self.buf.put_i64_le(dt.timestamp_millis());
            }
            Value::Regex(r) => {
                self.write_cstring(key, &r.pattern)?;
                self.write_cstring(key, &r.options)?;
            }
            Value::DbPointer(p) => {
                self.write_string(&p.namespace)?;
                self.buf.put_slice(p.id.as_bytes());
            }
            Value::JavaScriptCodeWithScope(js) => {
                let start = self.buf.len();
                self.buf.put_i32_le(0);
                self.write_string(&js.code)?;
                self.write_document(&js.scope)?;
                backpatch_length(self.buf, start)?;
            }
            Value::Int32(n) => {
                self.buf.put_i32_le(*n);
            }
            Value::Timestamp(ts) => {
                self.buf.put_u32_le(ts.increment);
                self.buf.put_u32_le(ts.time);
            }
            Value::Int64(n) => {
                self.buf.put_i64_le(*n);
            }
            Value::Decimal128(d) => {
                self.buf.put_slice(&d.bytes());
            }
            Value::Undefined | Value::Null | Value::MinKey | Value::MaxKey => {}
        }
        Ok(())
    }

    fn begin_container(&mut self) -> EncodeResult<usize> {
        if self.depth > self.config.nesting_limit() {
            return Err(EncodeError::NestingTooDeep {
                max: self.config.nesting_limit(),
            });
        }
        self.depth += 1;
        let start = self.buf.len();
        self.buf.put_i32_le(0);
        Ok(start)
    }

    fn end_container(&mut self, start: usize) -> EncodeResult<()> {
        self.buf.put_u8(TERMINATOR);
        self.depth -= 1;
        backpatch_length(self.buf, start)?;
        Ok(())
    }

    /// 长度前缀字符串: i32 长度(含结束符) + UTF-8 字节 + 0x00
    fn write_string(&mut self, s: &str) -> EncodeResult<()> {
        self.write_len(s.len() + 1)?;
        self.buf.put_slice(s.as_bytes());
        self.buf.put_u8(TERMINATOR);
        Ok(())
    }

    fn write_cstring(&mut self, field: &str, s: &str) -> EncodeResult<()> {
        if s.as_bytes().contains(&TERMINATOR) {
            return Err(EncodeError::InteriorNul {
                field: field.to_string(),
            });
        }
        self.buf.put_slice(s.as_bytes());
        self.buf.put_u8(TERMINATOR);
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> EncodeResult<()> {
        let len = i32::try_from(len).map_err(|_| EncodeError::DocumentTooLarge {
            size: len,
            max: i32::MAX as usize,
        })?;
        self.buf.put_i32_le(len);
        Ok(())
    }
}
