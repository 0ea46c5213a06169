use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::domain::model::{
    ConversationKey, ConversationSummary, SidebarViewState, TimerUpdate,
};
use crate::domain::service::SidebarDomainService;

/// 侧边栏快照查询
#[derive(Debug, Clone, Default)]
pub struct SidebarSnapshotQuery;

/// 单个会话计时显示查询
#[derive(Debug, Clone)]
pub struct TimerDisplayQuery {
    pub key: ConversationKey,
}

/// 渲染方可见的全部状态
#[derive(Debug, Clone, Serialize)]
pub struct SidebarSnapshot {
    pub conversations: Vec<ConversationSummary>,
    pub timers: Vec<TimerUpdate>,
    pub view: SidebarViewState,
    pub open_conversation: Option<ConversationKey>,
}

/// 侧边栏查询处理器
#[derive(Clone)]
pub struct SidebarQueryHandler {
    domain_service: Arc<Mutex<SidebarDomainService>>,
}

impl SidebarQueryHandler {
    pub fn new(domain_service: Arc<Mutex<SidebarDomainService>>) -> Self {
        Self { domain_service }
    }

    pub async fn handle_sidebar_snapshot(&self, _query: SidebarSnapshotQuery) -> SidebarSnapshot {
        let service = self.domain_service.lock().await;
        SidebarSnapshot {
            conversations: service.conversations().to_vec(),
            timers: service.timer_displays(),
            view: service.view().clone(),
            open_conversation: service.open_key().cloned(),
        }
    }

    pub async fn handle_timer_display(&self, query: TimerDisplayQuery) -> Option<String> {
        self.domain_service
            .lock()
            .await
            .timer_display(&query.key)
            .map(str::to_string)
    }
}
