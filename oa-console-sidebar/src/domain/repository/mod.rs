use async_trait::async_trait;
use oa_console_core::ConsoleResult;

use crate::domain::model::{
    ChannelCommand, ConversationKey, ConversationSummary, RawEvent, RenderFrame, StatusFilter,
    TimerSnapshot,
};

/// 侧边栏列表查询
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SidebarQuery {
    pub filter: StatusFilter,
    pub page: u32,
    pub group_ids: Vec<i64>,
}

/// 实时通道（需要作为 trait 对象使用，保留 async-trait）
///
/// `next_event` 会在 `select!` 中被取消，实现必须保证取消安全。
#[async_trait]
pub trait RealtimeChannel: Send {
    /// 下一条推送帧；通道关闭返回 `Ok(None)`
    async fn next_event(&mut self) -> ConsoleResult<Option<RawEvent>>;

    async fn emit(&mut self, command: &ChannelCommand) -> ConsoleResult<()>;
}

/// 渲染输出（计时显示、线程加载）
#[async_trait]
pub trait RenderSink: Send {
    async fn render(&mut self, frame: &RenderFrame) -> ConsoleResult<()>;
}

/// 侧边栏整页数据源
#[async_trait]
pub trait SidebarSource: Send + Sync {
    async fn fetch_page(&self, query: &SidebarQuery) -> ConsoleResult<Vec<ConversationSummary>>;
}

/// 冻结计时快照存储
#[async_trait]
pub trait TimerSnapshotStore: Send + Sync {
    async fn load(&self) -> ConsoleResult<Option<TimerSnapshot>>;
    async fn save(&self, snapshot: &TimerSnapshot) -> ConsoleResult<()>;
}

/// 新消息提醒（声音/桌面通知）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageNotification {
    pub key: ConversationKey,
    pub title: String,
    pub body: String,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &MessageNotification);
}
