//! 会话与视图状态
//!
//! 取代页面级全局变量：当前打开的会话、已渲染消息 ID、筛选/分页/搜索状态、连接状态，
//! 全部归属于一个显式的会话对象。

use std::collections::HashSet;

use serde::Serialize;

use super::{ConversationKey, NewMessage, StatusFilter};

/// 本地管理员身份，用于判断消息是否由自己发出
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminIdentity {
    pub email: Option<String>,
}

impl AdminIdentity {
    pub fn new(email: Option<String>) -> Self {
        Self {
            email: email.filter(|e| !e.trim().is_empty()),
        }
    }

    /// 消息是否由本地管理员发出
    ///
    /// 未配置邮箱或消息未携带邮箱时，所有 admin 消息都视为本地发出。
    pub fn is_local_author(&self, message: &NewMessage) -> bool {
        if !message.is_from_admin() {
            return false;
        }
        match (&self.email, &message.admin_email) {
            (Some(mine), Some(theirs)) => mine.trim().eq_ignore_ascii_case(theirs.trim()),
            _ => true,
        }
    }
}

/// 当前打开的聊天
#[derive(Debug, Default)]
pub struct ChatSession {
    open_key: Option<ConversationKey>,
    materialized_ids: HashSet<String>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_key(&self) -> Option<&ConversationKey> {
        self.open_key.as_ref()
    }

    pub fn is_open(&self, key: &ConversationKey) -> bool {
        self.open_key.as_ref() == Some(key)
    }

    /// 切换到新会话，返回之前打开的会话；切换时清空已渲染消息集合
    pub fn open(&mut self, key: ConversationKey) -> Option<ConversationKey> {
        if self.open_key.as_ref() != Some(&key) {
            self.materialized_ids.clear();
        }
        self.open_key.replace(key)
    }

    pub fn close(&mut self) -> Option<ConversationKey> {
        self.materialized_ids.clear();
        self.open_key.take()
    }

    /// 记录已渲染的消息；返回 false 表示重复
    pub fn record_message(&mut self, id: &str) -> bool {
        self.materialized_ids.insert(id.to_string())
    }

    pub fn is_materialized(&self, id: &str) -> bool {
        self.materialized_ids.contains(id)
    }

    /// 线程加载器返回的历史消息
    pub fn remember_messages<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.materialized_ids
            .extend(ids.into_iter().map(Into::into));
    }

    pub fn materialized_count(&self) -> usize {
        self.materialized_ids.len()
    }
}

/// "有更新" 提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatesNotice {
    /// 不在第一页，未自动刷新
    NotOnFirstPage,
    /// 搜索中，推送未应用
    ClearSearch,
}

impl UpdatesNotice {
    pub fn message(&self) -> &'static str {
        match self {
            UpdatesNotice::NotOnFirstPage => "New updates available. Go to page 1 to see them.",
            UpdatesNotice::ClearSearch => "New updates available. Clear search to see them.",
        }
    }
}

/// 实时通道连接状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected { reason: String },
    Failed { message: String },
}

/// 侧边栏视图状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarViewState {
    #[serde(serialize_with = "serialize_filter")]
    pub filter: StatusFilter,
    pub page: u32,
    pub search_active: bool,
    pub updates_available: Option<UpdatesNotice>,
    pub refresh_error: Option<String>,
    pub connection: ConnectionState,
    pub active_group_ids: Vec<i64>,
}

impl Default for SidebarViewState {
    fn default() -> Self {
        Self {
            filter: StatusFilter::All,
            page: 1,
            search_active: false,
            updates_available: None,
            refresh_error: None,
            connection: ConnectionState::default(),
            active_group_ids: Vec::new(),
        }
    }
}

impl SidebarViewState {
    pub fn on_first_page(&self) -> bool {
        self.page <= 1
    }
}

fn serialize_filter<S>(filter: &StatusFilter, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(filter.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin_message(email: Option<&str>) -> NewMessage {
        NewMessage {
            id: Some("1".into()),
            key: ConversationKey::new("U1", "1"),
            sender_type: "admin".into(),
            message_type: "text".into(),
            content: "hi".into(),
            admin_email: email.map(str::to_string),
        }
    }

    #[test]
    fn test_local_author_matching() {
        let me = AdminIdentity::new(Some("Ops@Shop.test".into()));
        assert!(me.is_local_author(&admin_message(Some("ops@shop.test"))));
        assert!(!me.is_local_author(&admin_message(Some("other@shop.test"))));
        assert!(me.is_local_author(&admin_message(None)));

        let anonymous = AdminIdentity::new(Some("  ".into()));
        assert!(anonymous.email.is_none());
        assert!(anonymous.is_local_author(&admin_message(Some("other@shop.test"))));

        let mut customer = admin_message(None);
        customer.sender_type = "user".into();
        assert!(!me.is_local_author(&customer));
    }

    #[test]
    fn test_session_switch_clears_materialized() {
        let mut session = ChatSession::new();
        let a = ConversationKey::new("A", "1");
        let b = ConversationKey::new("B", "1");

        assert_eq!(session.open(a.clone()), None);
        assert!(session.record_message("m1"));
        assert!(!session.record_message("m1"));

        // 重复打开同一会话不清空
        assert_eq!(session.open(a.clone()), Some(a.clone()));
        assert_eq!(session.materialized_count(), 1);

        assert_eq!(session.open(b.clone()), Some(a));
        assert_eq!(session.materialized_count(), 0);
        assert!(session.is_open(&b));

        session.remember_messages(["x", "y"]);
        assert!(!session.record_message("x"));
        assert_eq!(session.close(), Some(b));
        assert!(session.open_key().is_none());
    }

    #[test]
    fn test_view_state_serialization() {
        let view = SidebarViewState {
            updates_available: Some(UpdatesNotice::ClearSearch),
            connection: ConnectionState::Disconnected {
                reason: "ping timeout".into(),
            },
            ..Default::default()
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["filter"], "all");
        assert_eq!(json["page"], 1);
        assert_eq!(json["updates_available"], "clear_search");
        assert_eq!(json["connection"]["state"], "disconnected");
        assert_eq!(
            UpdatesNotice::ClearSearch.message(),
            "New updates available. Clear search to see them."
        );
    }
}
