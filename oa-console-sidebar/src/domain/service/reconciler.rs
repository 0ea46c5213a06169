//! 协调器：纯决策逻辑
//!
//! 输入当前列表、计时器与事件，输出列表操作与计时器操作，不产生任何副作用。
//! 执行由 `apply_plan` 完成。

use crate::domain::model::{
    AdminIdentity, ChatSession, ConversationKey, ConversationList, ConversationSummary,
    ConversationUpdate, InsertPosition, ListOp, NewMessage, StatusFilter, TimerRegistry,
};

/// 计时器操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerOp {
    Start {
        key: ConversationKey,
        since_epoch_seconds: i64,
    },
    /// 固定最后一次渲染的显示
    Freeze { key: ConversationKey },
    Remove { key: ConversationKey },
}

/// 单个事件的执行计划
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub visible: bool,
    pub list_ops: Vec<ListOp>,
    pub timer_ops: Vec<TimerOp>,
}

/// 新消息的处理决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDecision {
    /// 打开的会话中已渲染过该消息 ID
    Duplicate,
    Deliver {
        append_to_thread: bool,
        notify: bool,
    },
}

/// 会话更新的执行计划
///
/// 已存在的条目总是先移除；不可见时到此为止。可见时整体重建条目并按状态放置：
/// closed 插到第一个 closed 条目之前（没有则追加到末尾），其余状态插到最前。
pub fn plan_conversation_update(
    list: &ConversationList,
    timers: &TimerRegistry,
    update: &ConversationUpdate,
    filter: StatusFilter,
    open_key: Option<&ConversationKey>,
) -> ReconcilePlan {
    let key = &update.key;
    let visible = filter.admits(update.status);
    let mut plan = ReconcilePlan {
        visible,
        ..Default::default()
    };

    if list.contains(key) {
        plan.list_ops.push(ListOp::Remove { key: key.clone() });
    }

    if !visible {
        if timers.contains(key) {
            plan.timer_ops.push(TimerOp::Remove { key: key.clone() });
        }
        return plan;
    }

    let mut summary = ConversationSummary::from_update(update);
    summary.is_active = open_key == Some(key);

    match summary.unread_since_epoch_seconds {
        Some(since) if summary.status.is_unread() => plan.timer_ops.push(TimerOp::Start {
            key: key.clone(),
            since_epoch_seconds: since,
        }),
        // 离开 unread：计时中的条目冻结，已冻结的保持显示
        _ if timers.is_ticking(key) => {
            plan.timer_ops.push(TimerOp::Freeze { key: key.clone() })
        }
        _ => {}
    }

    let position = placement(list, &summary);
    plan.list_ops.push(ListOp::Insert {
        position,
        summary: Box::new(summary),
    });
    plan
}

/// 放置规则
pub fn placement(list: &ConversationList, summary: &ConversationSummary) -> InsertPosition {
    if !summary.status.is_closed() {
        return InsertPosition::Front;
    }
    match list.first_closed_except(&summary.key) {
        Some(anchor) => InsertPosition::Before(anchor.clone()),
        None => InsertPosition::Back,
    }
}

/// 执行计划，返回被冻结的键及其显示
pub fn apply_plan(
    list: &mut ConversationList,
    timers: &mut TimerRegistry,
    plan: ReconcilePlan,
) -> Vec<(ConversationKey, String)> {
    list.apply_all(plan.list_ops);

    let mut frozen = Vec::new();
    for op in plan.timer_ops {
        match op {
            TimerOp::Start {
                key,
                since_epoch_seconds,
            } => timers.start(key, since_epoch_seconds),
            TimerOp::Freeze { key } => {
                if let Some(display) = timers.freeze(&key) {
                    frozen.push((key, display));
                }
            }
            TimerOp::Remove { key } => {
                timers.remove(&key);
            }
        }
    }
    frozen
}

/// 新消息决策
///
/// 事件类消息与本地管理员发出的消息不提醒；打开的会话中重复的消息 ID 静默丢弃。
pub fn plan_new_message(
    session: &ChatSession,
    admin: &AdminIdentity,
    message: &NewMessage,
) -> MessageDecision {
    let open = session.is_open(&message.key);
    if open
        && message
            .id
            .as_deref()
            .is_some_and(|id| session.is_materialized(id))
    {
        return MessageDecision::Duplicate;
    }

    MessageDecision::Deliver {
        append_to_thread: open,
        notify: should_notify(admin, message),
    }
}

pub fn should_notify(admin: &AdminIdentity, message: &NewMessage) -> bool {
    !message.is_event_kind() && !admin.is_local_author(message)
}
