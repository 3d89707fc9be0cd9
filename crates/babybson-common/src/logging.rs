//! 日志初始化模块
//!
//! 基于 tracing-subscriber 安装全局日志订阅者。
//! 环境变量 `RUST_LOG` 优先于配置文件中的级别。

use crate::config::LogConfig;
use crate::error::{CommonError, CommonResult};

/// 初始化全局日志
///
/// # Brief
/// 安装 EnvFilter + fmt 层(文本或 JSON)。进程内只能成功一次，
/// 重复初始化返回 `CommonError::Config` 而不是 panic。
///
/// # Arguments
/// * `config` - 日志配置
///
/// # Returns
/// 成功返回 Ok(()), 过滤指令非法或已初始化返回错误
pub fn init_logging(config: &LogConfig) -> CommonResult<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| {
            CommonError::Config(format!("Invalid log filter '{}': {}", config.level, e))
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true))
            .try_init()
    };

    result.map_err(|e| CommonError::Config(format!("Failed to install logger: {}", e)))?;
    tracing::debug!("Logging initialised at level {}", config.level);
    Ok(())
}
