//! BSON 编解码入口
//!
//! [`Codec`] 持有一份 [`CodecConfig`]，提供编码、解码与流式解码。
//! 模块级自由函数使用默认配置。

use crate::decode::{Decoder, DocumentStream};
use crate::document::Document;
use crate::encode::Encoder;
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::value::Value;
use babybson_common::CodecConfig;
use bytes::BytesMut;
use tracing::{debug, trace};

/// BSON 编解码器
///
/// 无内部可变状态，可在线程间共享。
#[derive(Debug, Clone, Default)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// 编码文档
    ///
    /// # Arguments
    /// * `doc` - 要编码的文档
    ///
    /// # Returns
    /// 成功返回完整的 BSON 字节, 失败返回错误
    pub fn encode(&self, doc: &Document) -> EncodeResult<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(256);
        self.encode_into(doc, &mut buf)?;
        Ok(buf.to_vec())
    }

    /// 编码文档并追加到缓冲区末尾
    ///
    /// # Brief
    /// 失败时缓冲区恢复到调用前的长度，不留下半个文档
    pub fn encode_into(&self, doc: &Document, buf: &mut BytesMut) -> EncodeResult<()> {
        let start = buf.len();
        let written = Encoder::new(buf, &self.config).write_document(doc);
        match written.and_then(|()| self.check_size(buf.len() - start)) {
            Ok(()) => {
                trace!(size = buf.len() - start, fields = doc.len(), "Encoded document");
                Ok(())
            }
            Err(e) => {
                buf.truncate(start);
                Err(e)
            }
        }
    }

    /// 编码单个元素(类型标记 + 字段名 + 载荷)，不带外层文档
    pub fn encode_element(&self, key: &str, value: &Value, buf: &mut BytesMut) -> EncodeResult<()> {
        let start = buf.len();
        if let Err(e) = Encoder::new(buf, &self.config).write_element(key, value) {
            buf.truncate(start);
            return Err(e);
        }
        trace!(key, size = buf.len() - start, "Encoded element");
        Ok(())
    }

    /// 解码文档
    ///
    /// # Brief
    /// `require_exact_length` 打开时，文档之后的多余字节视为错误
    ///
    /// # Arguments
    /// * `data` - 以文档起始的字节切片
    ///
    /// # Returns
    /// 成功返回文档, 失败返回带偏移的解码错误
    pub fn decode(&self, data: &[u8]) -> DecodeResult<Document> {
        let (doc, consumed) = self.decode_at(data, 0)?;
        if self.config.require_exact_length && consumed != data.len() {
            let err = DecodeError::TrailingGarbage {
                offset: consumed,
                remaining: data.len() - consumed,
            };
            debug!(offset = err.offset(), kind = err.kind(), "Rejected document: {}", err);
            return Err(err);
        }
        Ok(doc)
    }

    /// 解码 `offset` 处的文档
    ///
    /// # Returns
    /// 成功返回文档与消费的字节数
    pub fn decode_at(&self, data: &[u8], offset: usize) -> DecodeResult<(Document, usize)> {
        match Decoder::new(data, &self.config).decode_top_level(offset) {
            Ok((doc, consumed)) => {
                trace!(offset, size = consumed, fields = doc.len(), "Decoded document");
                Ok((doc, consumed))
            }
            Err(e) => {
                debug!(offset = e.offset(), kind = e.kind(), "Rejected document: {}", e);
                Err(e)
            }
        }
    }

    /// 依次解码首尾相接的多个文档
    pub fn stream<'a>(&self, data: &'a [u8]) -> DocumentStream<'a> {
        DocumentStream::new(data, self.config.clone())
    }

    fn check_size(&self, size: usize) -> EncodeResult<()> {
        if size > self.config.max_document_size {
            return Err(EncodeError::DocumentTooLarge {
                size,
                max: self.config.max_document_size,
            });
        }
        Ok(())
    }
}

/// 使用默认配置编码文档
pub fn encode_document(doc: &Document) -> EncodeResult<Vec<u8>> {
    Codec::default().encode(doc)
}

/// 使用默认配置编码文档并追加到缓冲区
pub fn encode_document_into(doc: &Document, buf: &mut BytesMut) -> EncodeResult<()> {
    Codec::default().encode_into(doc, buf)
}

/// 使用默认配置编码单个元素
pub fn encode_element(key: &str, value: &Value, buf: &mut BytesMut) -> EncodeResult<()> {
    Codec::default().encode_element(key, value, buf)
}

/// 使用默认配置解码文档，要求恰好消费全部字节
pub fn decode_document(data: &[u8]) -> DecodeResult<Document> {
    Codec::default().decode(data)
}

/// 使用默认配置解码 `offset` 处的文档，返回文档与消费的字节数
pub fn decode_document_at(data: &[u8], offset: usize) -> DecodeResult<(Document, usize)> {
    Codec::default().decode_at(data, offset)
}

/// 使用默认配置迭代解码多个文档
pub fn decode_stream(data: &[u8]) -> DocumentStream<'_> {
    Codec::default().stream(data)
}
