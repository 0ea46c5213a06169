//! OA Console Core 公共库
//!
//! 提供统一的配置加载、错误类型、日志初始化与通用工具

pub mod config;
pub mod error;
pub mod tracing;
pub mod utils;

pub use config::{
    ConfigManager, ConsoleAppConfig, LoggingConfig, SidebarServiceConfig, app_config, load_config,
};
pub use error::*;
pub use utils::*;
