//! OA 控制台会话侧边栏
//!
//! 实时推送事件协调、未读计时与会话列表模型

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod service;

pub use config::SidebarConfig;
pub use service::{ApplicationBootstrap, RunMode};
