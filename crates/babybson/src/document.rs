//! BSON 文档结构模块
//!
//! Document 是有序的 (字段名, 值) 序列。格式允许重复字段名，
//! 编解码器原样保留；按键查找时以首次出现者为准。
//!
//! 文档构建完成后只读：通过 [`DocumentBuilder`] 构建，
//! 需要修改时用 [`Document::into_builder`] 取回构建器。

use crate::codec::{decode_document, encode_document};
use crate::error::{DecodeResult, EncodeResult};
use crate::value::{Binary, DateTime, Value};
use compact_str::CompactString;
use std::fmt;

/// BSON 文档
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    elements: Vec<(CompactString, Value)>,
}

impl Document {
    /// 创建空文档
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建文档构建器
    ///
    /// # Example
    /// ```rust,ignore
    /// let doc = Document::builder()
    ///     .append("x", Document::builder().append("y", 1).build())
    ///     .build();
    /// ```
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    /// 取回构建器以便追加字段
    pub fn into_builder(self) -> DocumentBuilder {
        DocumentBuilder {
            elements: self.elements,
        }
    }

    /// 获取字段值
    ///
    /// # Brief
    /// 根据字段名获取值的引用；字段重复时返回首次出现者
    ///
    /// # Arguments
    /// * `key` - 字段名
    ///
    /// # Returns
    /// `Some(&Value)` 如果字段存在，否则 `None`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.elements
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    /// 获取同名字段的全部值，按出现顺序
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.elements
            .iter()
            .filter(move |(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.elements.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.elements.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(|v| v.as_i32())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_document(&self, key: &str) -> Option<&Document> {
        self.get(key).and_then(|v| v.as_document())
    }

    pub fn get_array(&self, key: &str) -> Option<&[Value]> {
        self.get(key).and_then(|v| v.as_array())
    }

    pub fn get_binary(&self, key: &str) -> Option<&Binary> {
        self.get(key).and_then(|v| v.as_binary())
    }

    pub fn get_datetime(&self, key: &str) -> Option<DateTime> {
        self.get(key).and_then(|v| v.as_datetime())
    }

    /// 按路径获取嵌套值
    ///
    /// # Brief
    /// 使用点分隔的路径访问嵌套文档与数组中的值
    ///
    /// # Arguments
    /// * `path` - 点分隔的路径，如 "user.tags.0"
    ///
    /// # Returns
    /// `Some(&Value)` 如果路径存在，否则 `None`
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// 编码为 BSON 字节（默认配置）
    pub fn to_bytes(&self) -> EncodeResult<Vec<u8>> {
        encode_document(self)
    }

    /// 从 BSON 字节解码（默认配置，要求恰好消费全部字节）
    pub fn from_bytes(data: &[u8]) -> DecodeResult<Self> {
        decode_document(data)
    }

    pub(crate) fn from_elements(elements: Vec<(CompactString, Value)>) -> Self {
        Self { elements }
    }
}

impl<K: Into<CompactString>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            elements: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (CompactString, Value);
    type IntoIter = std::vec::IntoIter<(CompactString, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {}", k.as_str(), v)?;
        }
        write!(f, "}}")
    }
}

/// 文档构建器
///
/// 按调用顺序追加字段，`build` 之后得到不可变的 [`Document`]。
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    elements: Vec<(CompactString, Value)>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加字段(不去重)
    pub fn append(mut self, key: impl Into<CompactString>, value: impl Into<Value>) -> Self {
        self.elements.push((key.into(), value.into()));
        self
    }

    /// 追加嵌入文档字段，文档内容由闭包构建
    pub fn append_document(
        self,
        key: impl Into<CompactString>,
        build: impl FnOnce(DocumentBuilder) -> DocumentBuilder,
    ) -> Self {
        let doc = build(DocumentBuilder::new()).build();
        self.append(key, Value::Document(doc))
    }

    /// 追加数组字段
    pub fn append_array<T: Into<Value>>(
        self,
        key: impl Into<CompactString>,
        items: impl IntoIterator<Item = T>,
    ) -> Self {
        let arr = items.into_iter().map(Into::into).collect();
        self.append(key, Value::Array(arr))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn build(self) -> Document {
        Document::from_elements(self.elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_order() {
        let doc = Document::builder()
            .append("b", 1)
            .append("a", "two")
            .append("c", true)
            .build();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(doc.get_i32("b"), Some(1));
        assert_eq!(doc.get_str("a"), Some("two"));
        assert_eq!(doc.get_bool("c"), Some(true));
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn test_duplicate_keys_first_wins() {
        let doc = Document::builder().append("k", 1).append("k", 2).build();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get_i32("k"), Some(1));
        assert_eq!(
            doc.get_all("k").collect::<Vec<_>>(),
            vec![&Value::Int32(1), &Value::Int32(2)]
        );
    }

    #[test]
    fn test_get_path() {
        let doc = Document::builder()
            .append_document("user", |b| {
                b.append("name", "ada")
                    .append_array("tags", ["a", "b"])
            })
            .build();
        assert_eq!(doc.get_path("user.name").and_then(Value::as_str), Some("ada"));
        assert_eq!(doc.get_path("user.tags.1").and_then(Value::as_str), Some("b"));
        assert!(doc.get_path("user.missing").is_none());
        assert!(doc.get_path("user.tags.9").is_none());
    }

    #[test]
    fn test_into_builder_appends() {
        let doc = Document::builder().append("a", 1).build();
        let doc = doc.into_builder().append("b", 2).build();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_from_iterator() {
        let doc: Document = vec![("x", 1), ("y", 2)].into_iter().collect();
        assert_eq!(doc.get_i32("y"), Some(2));
        assert!(!doc.contains_key("z"));
    }

    #[test]
    fn test_bytes_roundtrip() {
        let doc = Document::builder().append("x", 1.5).build();
        let bytes = doc.to_bytes().unwrap();
        assert_eq!(Document::from_bytes(&bytes).unwrap(), doc);
    }

    #[test]
    fn test_display() {
        let doc = Document::builder()
            .append_document("x", |b| b.append("y", 1))
            .build();
        assert_eq!(doc.to_string(), "{\"x\": {\"y\": 1}}");
    }
}
