//! 配置模块
//!
//! 本模块定义了 babybson 的所有配置选项:
//! - 编解码限制(文档体积上限、嵌套深度、数组下标校验、尾部字节策略)
//! - 日志配置(级别、JSON 输出)
//!
//! 支持从 TOML 文件加载配置，所有字段都有默认值。

use crate::error::{CommonError, CommonResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 最小文档长度: 4 字节长度前缀 + 1 字节结束符
pub const MIN_DOCUMENT_SIZE: usize = 5;

/// 嵌套层数的硬上限，解码递归深度不会超过此值
pub const MAX_NESTING_DEPTH_LIMIT: usize = 1024;

/// 编解码器配置
///
/// 限制解码器愿意处理的输入规模，同时约束编码器的输出。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// 单个顶层文档的最大字节数 (默认: 16 MiB)
    #[serde(default = "default_max_document_size")]
    pub max_document_size: usize,

    /// 文档/数组最大嵌套层数 (默认: 100, 上限: 1024)
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,

    /// 解码数组时要求键依次为 "0","1",... (默认: true)
    #[serde(default = "default_true")]
    pub strict_array_indices: bool,

    /// 解码顶层文档时要求恰好消费整个缓冲区 (默认: true)
    #[serde(default = "default_true")]
    pub require_exact_length: bool,
}

fn default_max_document_size() -> usize { 16 * 1024 * 1024 }
fn default_max_nesting_depth() -> usize { 100 }
fn default_true() -> bool { true }

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_document_size: default_max_document_size(),
            max_nesting_depth: default_max_nesting_depth(),
            strict_array_indices: true,
            require_exact_length: true,
        }
    }
}

impl CodecConfig {
    /// 实际生效的嵌套层数，超过硬上限的配置按上限处理
    pub fn nesting_limit(&self) -> usize {
        self.max_nesting_depth.min(MAX_NESTING_DEPTH_LIMIT)
    }

    /// 验证编解码配置是否有效
    pub fn validate(&self) -> CommonResult<()> {
        if self.max_document_size < MIN_DOCUMENT_SIZE {
            return Err(CommonError::Config(format!(
                "max_document_size must be at least {} bytes, got {}",
                MIN_DOCUMENT_SIZE, self.max_document_size
            )));
        }
        if self.max_document_size > i32::MAX as usize {
            return Err(CommonError::Config(format!(
                "max_document_size must fit in a 32-bit length prefix, got {}",
                self.max_document_size
            )));
        }
        if self.max_nesting_depth == 0 {
            return Err(CommonError::Config(
                "max_nesting_depth must be greater than zero".to_string(),
            ));
        }
        if self.max_nesting_depth > MAX_NESTING_DEPTH_LIMIT {
            return Err(CommonError::Config(format!(
                "max_nesting_depth must be at most {}, got {}",
                MAX_NESTING_DEPTH_LIMIT, self.max_nesting_depth
            )));
        }
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别或 EnvFilter 指令 (默认: info)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 输出 JSON 格式日志 (默认: false)
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// 顶层配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BabyBsonConfig {
    #[serde(default)]
    pub codec: CodecConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl BabyBsonConfig {
    /// # Brief
    /// 从 TOML 文件加载配置
    ///
    /// # Arguments
    /// * `path` - 配置文件路径
    ///
    /// # Returns
    /// 解析并验证后的配置实例
    pub fn from_file(path: &Path) -> CommonResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// # Brief
    /// 从 TOML 字符串解析配置
    ///
    /// # Arguments
    /// * `content` - TOML 文本
    ///
    /// # Returns
    /// 解析并验证后的配置实例
    pub fn from_toml_str(content: &str) -> CommonResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| CommonError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// # Brief
    /// 将配置序列化为 TOML 字符串
    ///
    /// # Returns
    /// TOML 格式的配置字符串
    pub fn to_toml(&self) -> CommonResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CommonError::Config(format!("Failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> CommonResult<()> {
        self.codec.validate()
    }
}
