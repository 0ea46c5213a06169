//! OA Console Core 错误工具模块
//!
//! - 统一对外暴露控制台各模块共享的错误类型
//! - 事件解码、侧边栏刷新、快照持久化等失败都在本地处理，不向全局抛出

use thiserror::Error;

/// 控制台错误类型
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 推送事件格式错误（缺少必需字段等）
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// 未知的会话状态
    #[error("Unknown conversation status: {0}")]
    UnknownStatus(String),

    /// 侧边栏刷新失败
    #[error("Sidebar refresh failed: {0}")]
    Refresh(String),

    /// 计时器快照读写失败
    #[error("Timer snapshot error: {0}")]
    Snapshot(String),

    /// 实时通道错误
    #[error("Realtime transport error: {0}")]
    Transport(String),

    /// 其他错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 控制台结果类型
pub type ConsoleResult<T> = Result<T, ConsoleError>;

impl ConsoleError {
    /// 是否为可忽略的事件级错误（丢弃事件即可，不影响会话状态）
    pub fn is_event_level(&self) -> bool {
        matches!(
            self,
            ConsoleError::MalformedEvent(_) | ConsoleError::UnknownStatus(_)
        )
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::MalformedEvent(err.to_string())
    }
}

/// 便捷宏：构造事件格式错误并提前返回
#[macro_export]
macro_rules! bail_malformed {
    ($($arg:tt)*) => {
        return Err($crate::error::ConsoleError::MalformedEvent(format!($($arg)*)))
    };
}
