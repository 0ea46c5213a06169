//! 侧边栏领域服务 - 持有会话状态并执行所有业务规则
//!
//! 单一所有者：列表、计时器、打开的会话与视图状态都在这里，由运行时串行驱动。

use std::sync::Arc;

use oa_console_core::utils::Clock;
use tracing::{debug, info, warn};

use crate::domain::model::{
    AdminIdentity, ChannelCommand, ChatSession, ConnectionState, ConversationKey,
    ConversationList, ConversationStatus, ConversationSummary, ConversationUpdate, InboundEvent,
    NewMessage, RenderFrame, SidebarViewState, StatusFilter, ThreadLoad, TimerRegistry, TimerUpdate,
    UpdatesNotice,
};
use crate::domain::repository::{
    MessageNotification, Notifier, SidebarQuery, SidebarSource, TimerSnapshotStore,
};
use crate::domain::service::reconciler::{
    MessageDecision, apply_plan, plan_conversation_update, plan_new_message,
};

/// 领域服务初始参数
#[derive(Clone, Debug, Default)]
pub struct SidebarDomainConfig {
    pub status_filter: StatusFilter,
    pub page: u32,
    pub admin_email: Option<String>,
    pub active_group_ids: Vec<i64>,
}

/// 一次操作产生的副作用，由应用层转交给通道与渲染方
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SidebarEffects {
    pub commands: Vec<ChannelCommand>,
    pub timer_updates: Vec<TimerUpdate>,
    /// 需要追加到当前线程的消息
    pub thread_appends: Vec<NewMessage>,
    /// 打开会话后需要加载的线程
    pub load_thread: Option<ThreadLoad>,
    pub list_changed: bool,
}

impl SidebarEffects {
    /// 打开会话的副作用：房间命令、冻结显示重绘、线程加载
    pub fn opened(key: ConversationKey, output: OpenConversationOutput) -> Self {
        let timer_updates = output
            .frozen_display
            .iter()
            .map(|display| TimerUpdate {
                key: key.clone(),
                display: display.clone(),
            })
            .collect();
        Self {
            commands: output.commands,
            timer_updates,
            load_thread: Some(ThreadLoad {
                key,
                frozen_time: output.frozen_display,
            }),
            list_changed: true,
            ..Default::default()
        }
    }

    /// 交给渲染方的输出帧
    pub fn render_frames(&self) -> Vec<RenderFrame> {
        let mut frames = Vec::new();
        if !self.timer_updates.is_empty() {
            frames.push(RenderFrame::Timers(self.timer_updates.clone()));
        }
        if let Some(load) = &self.load_thread {
            frames.push(RenderFrame::LoadThread(load.clone()));
        }
        frames
    }

    fn merge(&mut self, other: SidebarEffects) {
        self.commands.extend(other.commands);
        self.timer_updates.extend(other.timer_updates);
        self.thread_appends.extend(other.thread_appends);
        if other.load_thread.is_some() {
            self.load_thread = other.load_thread;
        }
        self.list_changed |= other.list_changed;
    }
}

/// 打开会话的结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OpenConversationOutput {
    pub previous: Option<ConversationKey>,
    /// 打开时冻结的计时显示，线程加载请求会带上它
    pub frozen_display: Option<String>,
    pub commands: Vec<ChannelCommand>,
}

pub struct SidebarDomainService {
    list: ConversationList,
    timers: TimerRegistry,
    session: ChatSession,
    view: SidebarViewState,
    admin: AdminIdentity,
    clock: Arc<dyn Clock>,
    source: Arc<dyn SidebarSource>,
    snapshot_store: Option<Arc<dyn TimerSnapshotStore>>,
    notifier: Arc<dyn Notifier>,
}

impl SidebarDomainService {
    pub fn new(
        config: SidebarDomainConfig,
        clock: Arc<dyn Clock>,
        source: Arc<dyn SidebarSource>,
        snapshot_store: Option<Arc<dyn TimerSnapshotStore>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let view = SidebarViewState {
            filter: config.status_filter,
            page: config.page.max(1),
            active_group_ids: config.active_group_ids,
            ..Default::default()
        };

        Self {
            list: ConversationList::new(),
            timers: TimerRegistry::new(),
            session: ChatSession::new(),
            view,
            admin: AdminIdentity::new(config.admin_email),
            clock,
            source,
            snapshot_store,
            notifier,
        }
    }

    // ---------------------------------------------------------------------
    // 推送事件
    // ---------------------------------------------------------------------

    pub async fn handle_event(&mut self, event: InboundEvent) -> SidebarEffects {
        match event {
            InboundEvent::Connected => self.on_connected(),
            InboundEvent::Disconnected { reason } => {
                warn!(reason = %reason, "Realtime channel disconnected");
                self.view.connection = ConnectionState::Disconnected { reason };
                SidebarEffects::default()
            }
            InboundEvent::ConnectError { message } => {
                warn!(error = %message, "Realtime channel connect error");
                self.view.connection = ConnectionState::Failed { message };
                SidebarEffects::default()
            }
            InboundEvent::NewMessage(message) => self.handle_new_message(message),
            InboundEvent::ConversationUpdate(update) => {
                self.apply_conversation_update(*update).await
            }
            InboundEvent::ResortSignal => self.handle_resort_signal().await,
        }
    }

    fn on_connected(&mut self) -> SidebarEffects {
        info!(
            group_count = self.view.active_group_ids.len(),
            "Realtime channel connected"
        );
        self.view.connection = ConnectionState::Connected;

        let mut commands = vec![ChannelCommand::UpdateActiveGroups {
            group_ids: self.view.active_group_ids.clone(),
        }];
        // 重连后重新加入当前会话房间
        if let Some(key) = self.session.open_key() {
            commands.push(ChannelCommand::Join {
                room: key.room_name(),
            });
        }

        SidebarEffects {
            commands,
            ..Default::default()
        }
    }

    /// 会话更新：整体替换条目并按状态重新放置
    pub async fn apply_conversation_update(&mut self, update: ConversationUpdate) -> SidebarEffects {
        if self.view.search_active {
            debug!(
                user_id = %update.key.user_id,
                oa_id = %update.key.oa_id,
                "Search active, conversation update deferred"
            );
            self.view.updates_available = Some(UpdatesNotice::ClearSearch);
            return SidebarEffects::default();
        }

        let plan = plan_conversation_update(
            &self.list,
            &self.timers,
            &update,
            self.view.filter,
            self.session.open_key(),
        );
        debug!(
            user_id = %update.key.user_id,
            oa_id = %update.key.oa_id,
            status = %update.status,
            visible = plan.visible,
            list_ops = plan.list_ops.len(),
            timer_ops = plan.timer_ops.len(),
            "Applying conversation update"
        );

        let frozen = apply_plan(&mut self.list, &mut self.timers, plan);
        if !frozen.is_empty() {
            self.persist_snapshot().await;
        }

        SidebarEffects {
            timer_updates: frozen
                .into_iter()
                .map(|(key, display)| TimerUpdate { key, display })
                .collect(),
            list_changed: true,
            ..Default::default()
        }
    }

    /// 新消息：只做去重、线程追加与提醒，不改变侧边栏顺序
    pub fn handle_new_message(&mut self, message: NewMessage) -> SidebarEffects {
        match plan_new_message(&self.session, &self.admin, &message) {
            MessageDecision::Duplicate => {
                debug!(
                    user_id = %message.key.user_id,
                    message_id = ?message.id,
                    "Duplicate message in open thread, ignored"
                );
                SidebarEffects::default()
            }
            MessageDecision::Deliver {
                append_to_thread,
                notify,
            } => {
                if notify {
                    let notification = self.notification_for(&message);
                    self.notifier.notify(&notification);
                }

                let mut effects = SidebarEffects::default();
                if append_to_thread {
                    if let Some(id) = &message.id {
                        self.session.record_message(id);
                    }
                    effects.thread_appends.push(message);
                }
                effects
            }
        }
    }

    fn notification_for(&self, message: &NewMessage) -> MessageNotification {
        let name = self
            .list
            .get(&message.key)
            .map(|s| s.display_name.as_str())
            .unwrap_or(message.key.user_id.as_str());
        MessageNotification {
            key: message.key.clone(),
            title: format!("New message from {name}"),
            body: message.content.clone(),
        }
    }

    /// 无负载的重排信号
    pub async fn handle_resort_signal(&mut self) -> SidebarEffects {
        if self.view.search_active {
            self.view.updates_available = Some(UpdatesNotice::ClearSearch);
            return SidebarEffects::default();
        }
        if !self.view.on_first_page() {
            debug!(page = self.view.page, "Resort signal outside first page");
            self.view.updates_available = Some(UpdatesNotice::NotOnFirstPage);
            return SidebarEffects::default();
        }
        self.refresh().await
    }

    // ---------------------------------------------------------------------
    // 刷新
    // ---------------------------------------------------------------------

    /// 重新拉取当前页并整表替换；失败时保留原列表并设置错误提示
    pub async fn refresh(&mut self) -> SidebarEffects {
        let query = SidebarQuery {
            filter: self.view.filter,
            page: self.view.page,
            group_ids: self.view.active_group_ids.clone(),
        };

        let rows = match self.source.fetch_page(&query).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(
                    error = %err,
                    filter = %query.filter,
                    page = query.page,
                    "Sidebar refresh failed"
                );
                self.view.refresh_error = Some(err.to_string());
                return SidebarEffects::default();
            }
        };

        let frozen_changed = self.replace_list(rows);
        if frozen_changed {
            self.persist_snapshot().await;
        }
        self.view.refresh_error = None;
        self.view.updates_available = None;
        info!(
            filter = %query.filter,
            page = query.page,
            conversations = self.list.len(),
            "Sidebar refreshed"
        );

        // 冻结显示重新覆盖刷新后的条目，计时条目立即渲染一次
        let mut timer_updates = self.timers.frozen_displays();
        timer_updates.retain(|u| self.list.contains(&u.key));
        timer_updates.extend(self.timers.tick(self.clock.now_epoch_seconds()));

        SidebarEffects {
            timer_updates,
            list_changed: true,
            ..Default::default()
        }
    }

    /// 整表替换；返回冻结计时是否有变化（需要重新保存快照）
    fn replace_list(&mut self, rows: Vec<ConversationSummary>) -> bool {
        self.list.replace_all(rows);
        self.list.mark_active(self.session.open_key());

        let mut frozen_changed = false;
        for summary in self.list.iter() {
            let frozen = self
                .timers
                .get(&summary.key)
                .is_some_and(|entry| entry.is_frozen());
            match summary.unread_since_epoch_seconds {
                // 新的未读周期覆盖冻结显示
                Some(since) if summary.status.is_unread() => {
                    frozen_changed |= frozen;
                    self.timers.start(summary.key.clone(), since);
                }
                _ if frozen => {}
                _ => {
                    self.timers.remove(&summary.key);
                }
            }
        }
        let keys: Vec<ConversationKey> = self.list.keys().cloned().collect();
        let pruned = self.timers.retain_keys(keys.iter());
        if pruned > 0 {
            debug!(pruned, "Timer entries dropped with their conversations");
        }
        frozen_changed || pruned > 0
    }

    // ---------------------------------------------------------------------
    // 本地操作
    // ---------------------------------------------------------------------

    /// 打开会话：切换房间，按当前时间冻结计时，清除未读标记
    pub async fn open_conversation(&mut self, key: ConversationKey) -> OpenConversationOutput {
        let previous = self.session.open(key.clone());

        let mut commands = Vec::new();
        if previous.as_ref() != Some(&key) {
            if let Some(prev) = &previous {
                commands.push(ChannelCommand::Leave {
                    room: prev.room_name(),
                });
            }
            commands.push(ChannelCommand::Join {
                room: key.room_name(),
            });
        }

        let now = self.clock.now_epoch_seconds();
        let frozen_display = self.timers.freeze_at(&key, now);

        if let Some(summary) = self.list.get_mut(&key) {
            summary.mark_opened();
        }
        self.list.mark_active(Some(&key));

        if frozen_display.is_some() {
            self.persist_snapshot().await;
        }

        info!(
            user_id = %key.user_id,
            oa_id = %key.oa_id,
            frozen_display = ?frozen_display,
            "Conversation opened"
        );

        OpenConversationOutput {
            previous,
            frozen_display,
            commands,
        }
    }

    /// 关闭当前会话（离开房间）
    pub fn close_conversation(&mut self) -> Vec<ChannelCommand> {
        let Some(key) = self.session.close() else {
            return Vec::new();
        };
        self.list.mark_active(None);
        vec![ChannelCommand::Leave {
            room: key.room_name(),
        }]
    }

    /// 线程加载器返回的已渲染消息 ID
    pub fn remember_thread_messages(&mut self, ids: Vec<String>) {
        self.session.remember_messages(ids);
    }

    /// 本地修改会话状态；离开 unread 时冻结计时
    pub async fn change_status(
        &mut self,
        key: &ConversationKey,
        status: ConversationStatus,
    ) -> SidebarEffects {
        let Some(summary) = self.list.get_mut(key) else {
            warn!(
                user_id = %key.user_id,
                oa_id = %key.oa_id,
                "Status change for conversation not in sidebar"
            );
            return SidebarEffects::default();
        };
        let previous = summary.status;
        summary.set_status(status);

        let mut effects = SidebarEffects {
            list_changed: previous != status,
            ..Default::default()
        };

        if !status.is_unread() && self.timers.is_ticking(key) {
            let now = self.clock.now_epoch_seconds();
            if let Some(display) = self.timers.freeze_at(key, now) {
                effects.timer_updates.push(TimerUpdate {
                    key: key.clone(),
                    display,
                });
                self.persist_snapshot().await;
            }
        }

        debug!(
            user_id = %key.user_id,
            oa_id = %key.oa_id,
            from = %previous,
            to = %status,
            "Local status change applied"
        );
        effects
    }

    pub async fn set_filter(&mut self, filter: StatusFilter) -> SidebarEffects {
        info!(filter = %filter, "Sidebar filter changed");
        self.view.filter = filter;
        self.view.page = 1;
        self.view.updates_available = None;
        self.refresh().await
    }

    pub async fn set_page(&mut self, page: u32) -> SidebarEffects {
        self.view.page = page.max(1);
        self.view.updates_available = None;
        self.refresh().await
    }

    /// 搜索开关；结束搜索时刷新列表以显示被搁置的更新
    pub async fn set_search_active(&mut self, active: bool) -> SidebarEffects {
        let was_active = self.view.search_active;
        self.view.search_active = active;
        if was_active && !active {
            self.view.updates_available = None;
            return self.refresh().await;
        }
        SidebarEffects::default()
    }

    pub async fn set_active_groups(&mut self, group_ids: Vec<i64>) -> SidebarEffects {
        self.view.active_group_ids = group_ids.clone();
        let mut effects = SidebarEffects {
            commands: vec![ChannelCommand::UpdateActiveGroups { group_ids }],
            ..Default::default()
        };
        effects.merge(self.refresh().await);
        effects
    }

    /// 固定周期 tick
    pub fn tick(&mut self) -> Vec<TimerUpdate> {
        self.timers.tick(self.clock.now_epoch_seconds())
    }

    // ---------------------------------------------------------------------
    // 快照
    // ---------------------------------------------------------------------

    pub async fn restore_snapshot(&mut self) -> usize {
        let Some(store) = &self.snapshot_store else {
            return 0;
        };
        match store.load().await {
            Ok(Some(snapshot)) => {
                let restored = self.timers.restore(&snapshot);
                info!(restored, "Frozen timer displays restored");
                restored
            }
            Ok(None) => 0,
            Err(err) => {
                warn!(error = %err, "Failed to load timer snapshot");
                0
            }
        }
    }

    pub async fn persist_snapshot(&self) {
        let Some(store) = &self.snapshot_store else {
            return;
        };
        let snapshot = self.timers.snapshot();
        if let Err(err) = store.save(&snapshot).await {
            warn!(error = %err, "Failed to persist timer snapshot");
        }
    }

    // ---------------------------------------------------------------------
    // 查询
    // ---------------------------------------------------------------------

    pub fn conversations(&self) -> &[ConversationSummary] {
        self.list.as_slice()
    }

    pub fn conversation(&self, key: &ConversationKey) -> Option<&ConversationSummary> {
        self.list.get(key)
    }

    pub fn timer_display(&self, key: &ConversationKey) -> Option<&str> {
        self.timers.display(key)
    }

    /// 列表中每个有计时显示的条目
    pub fn timer_displays(&self) -> Vec<TimerUpdate> {
        self.list
            .iter()
            .filter_map(|s| {
                self.timers.display(&s.key).map(|display| TimerUpdate {
                    key: s.key.clone(),
                    display: display.to_string(),
                })
            })
            .collect()
    }

    pub fn is_timer_ticking(&self, key: &ConversationKey) -> bool {
        self.timers.is_ticking(key)
    }

    pub fn view(&self) -> &SidebarViewState {
        &self.view
    }

    pub fn open_key(&self) -> Option<&ConversationKey> {
        self.session.open_key()
    }
}
