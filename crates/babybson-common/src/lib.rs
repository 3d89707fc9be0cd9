//! babybson 公共模块
//!
//! 编解码器与调用方共享的基础设施：配置、日志初始化、错误类型以及 ObjectId。

pub mod error;
pub mod types;
pub mod config;
pub mod logging;

pub use config::{BabyBsonConfig, CodecConfig, LogConfig, MAX_NESTING_DEPTH_LIMIT};
pub use error::{CommonError, CommonResult};
pub use logging::init_logging;
pub use types::ObjectId;
