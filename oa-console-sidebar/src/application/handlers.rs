use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::commands::{
    ChangeFilterCommand, ChangeStatusCommand, OpenConversationCommand, SidebarCommand,
};
use crate::domain::model::{InboundEvent, RawEvent, StatusFilter, TimerUpdate};
use crate::domain::service::{OpenConversationOutput, SidebarDomainService, SidebarEffects};

/// 侧边栏命令处理器（推送事件、本地命令、tick）
#[derive(Clone)]
pub struct SidebarCommandHandler {
    domain_service: Arc<Mutex<SidebarDomainService>>,
}

impl SidebarCommandHandler {
    pub fn new(domain_service: Arc<Mutex<SidebarDomainService>>) -> Self {
        Self { domain_service }
    }

    /// 处理通道原始帧；格式错误的事件记录后丢弃
    pub async fn handle_raw_event(&self, raw: RawEvent) -> SidebarEffects {
        match InboundEvent::decode(&raw) {
            Ok(Some(event)) => self.handle_event(event).await,
            Ok(None) => {
                debug!(event = %raw.name, "Ignoring unhandled realtime event");
                SidebarEffects::default()
            }
            Err(err) => {
                warn!(event = %raw.name, error = %err, "Dropping malformed realtime event");
                SidebarEffects::default()
            }
        }
    }

    pub async fn handle_event(&self, event: InboundEvent) -> SidebarEffects {
        debug!(event = event.kind(), "Handling realtime event");
        self.domain_service.lock().await.handle_event(event).await
    }

    /// 处理本地命令
    pub async fn handle_command(&self, command: SidebarCommand) -> Result<SidebarEffects> {
        debug!(command = command.name(), "Handling local command");

        let effects = match command {
            SidebarCommand::OpenConversation(cmd) => {
                let key = cmd.key();
                let output = self.handle_open_conversation(cmd).await;
                SidebarEffects::opened(key, output)
            }
            SidebarCommand::CloseConversation => {
                let commands = self.domain_service.lock().await.close_conversation();
                SidebarEffects {
                    commands,
                    list_changed: true,
                    ..Default::default()
                }
            }
            SidebarCommand::ChangeStatus(cmd) => self.handle_change_status(cmd).await,
            SidebarCommand::ChangeFilter(cmd) => self.handle_change_filter(cmd).await?,
            SidebarCommand::ChangePage(cmd) => {
                self.domain_service.lock().await.set_page(cmd.page).await
            }
            SidebarCommand::SetSearchActive(cmd) => {
                self.domain_service
                    .lock()
                    .await
                    .set_search_active(cmd.active)
                    .await
            }
            SidebarCommand::UpdateActiveGroups(cmd) => {
                info!(group_ids = ?cmd.group_ids, "Active OA groups changed");
                self.domain_service
                    .lock()
                    .await
                    .set_active_groups(cmd.group_ids)
                    .await
            }
            SidebarCommand::RememberThreadMessages(cmd) => {
                self.domain_service
                    .lock()
                    .await
                    .remember_thread_messages(cmd.message_ids);
                SidebarEffects::default()
            }
        };
        Ok(effects)
    }

    /// 处理打开会话命令
    pub async fn handle_open_conversation(
        &self,
        command: OpenConversationCommand,
    ) -> OpenConversationOutput {
        self.domain_service
            .lock()
            .await
            .open_conversation(command.key())
            .await
    }

    /// 处理本地状态修改命令
    pub async fn handle_change_status(&self, command: ChangeStatusCommand) -> SidebarEffects {
        let key = command.key();
        self.domain_service
            .lock()
            .await
            .change_status(&key, command.status)
            .await
    }

    /// 处理切换筛选命令
    pub async fn handle_change_filter(&self, command: ChangeFilterCommand) -> Result<SidebarEffects> {
        let filter: StatusFilter = command
            .filter
            .parse()
            .with_context(|| format!("invalid status filter `{}`", command.filter))?;
        Ok(self.domain_service.lock().await.set_filter(filter).await)
    }

    /// 固定周期 tick
    pub async fn handle_tick(&self) -> Vec<TimerUpdate> {
        self.domain_service.lock().await.tick()
    }

    /// 启动：恢复冻结快照并加载首页
    pub async fn handle_startup(&self) -> SidebarEffects {
        let mut service = self.domain_service.lock().await;
        service.restore_snapshot().await;
        service.refresh().await
    }

    /// 退出前保存快照
    pub async fn handle_shutdown(&self) {
        self.domain_service.lock().await.persist_snapshot().await;
    }
}
