//! 会话侧边栏领域模型

pub mod conversation_list;
pub mod events;
pub mod session;
pub mod timer;

use std::fmt;
use std::str::FromStr;

use oa_console_core::ConsoleError;
use serde::{Deserialize, Serialize};

pub use conversation_list::{ConversationList, InsertPosition, ListOp};
pub use events::{
    ChannelCommand, ConversationUpdate, ConversationUpdatePayload, InboundEvent, NewMessage, RawEvent,
    RenderFrame, TagPayload, ThreadLoad,
};
pub use session::{
    AdminIdentity, ChatSession, ConnectionState, SidebarViewState, UpdatesNotice,
};
pub use timer::{FrozenTimer, TimerEntry, TimerRegistry, TimerSnapshot, TimerUpdate};

/// 会话键：(userId, oaId) 唯一确定一个客户与一个官方账号之间的会话
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    pub user_id: String,
    pub oa_id: String,
}

impl ConversationKey {
    pub fn new(user_id: impl Into<String>, oa_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            oa_id: oa_id.into(),
        }
    }

    /// 实时通道房间名
    pub fn room_name(&self) -> String {
        format!("chat_{}_{}", self.user_id, self.oa_id)
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user_id, self.oa_id)
    }
}

/// 会话状态（互斥），决定排序分组与展示样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Unread,
    Read,
    Deposit,
    Withdraw,
    Issue,
    Closed,
}

impl ConversationStatus {
    pub const ALL: [ConversationStatus; 6] = [
        ConversationStatus::Unread,
        ConversationStatus::Read,
        ConversationStatus::Deposit,
        ConversationStatus::Withdraw,
        ConversationStatus::Issue,
        ConversationStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Unread => "unread",
            ConversationStatus::Read => "read",
            ConversationStatus::Deposit => "deposit",
            ConversationStatus::Withdraw => "withdraw",
            ConversationStatus::Issue => "issue",
            ConversationStatus::Closed => "closed",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConversationStatus::Closed)
    }

    pub fn is_unread(&self) -> bool {
        matches!(self, ConversationStatus::Unread)
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationStatus {
    type Err = ConsoleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unread" => Ok(Self::Unread),
            "read" => Ok(Self::Read),
            "deposit" => Ok(Self::Deposit),
            "withdraw" => Ok(Self::Withdraw),
            "issue" => Ok(Self::Issue),
            "closed" => Ok(Self::Closed),
            other => Err(ConsoleError::UnknownStatus(other.to_string())),
        }
    }
}

/// 侧边栏状态筛选
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ConversationStatus),
}

impl StatusFilter {
    /// 指定状态在当前筛选下是否可见
    pub fn admits(&self, status: ConversationStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(expected) => *expected == status,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Only(status) => status.as_str(),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = ConsoleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        trimmed.parse().map(StatusFilter::Only)
    }
}

/// 会话标签
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color_hex: String,
}

/// 最后一条消息预览
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessagePreview {
    /// 前缀（如 "คุณ:" / "ลูกค้า:"）
    pub prefix: String,
    pub content: String,
    pub iso_timestamp: Option<String>,
}

/// 侧边栏会话条目
///
/// `unread_since_epoch_seconds` 仅在状态为 unread 时存在。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub key: ConversationKey,
    pub status: ConversationStatus,
    pub unread_count: u32,
    pub unread_since_epoch_seconds: Option<i64>,
    pub last_message: MessagePreview,
    pub tags: Vec<Tag>,
    pub display_name: String,
    pub picture_url: Option<String>,
    pub oa_name: Option<String>,
    /// 已读管理员标记
    pub read_by: Option<String>,
    pub is_active: bool,
}

impl ConversationSummary {
    /// 由推送负载整体构建（不做字段级合并）
    pub fn from_update(update: &ConversationUpdate) -> Self {
        let unread_since = if update.status.is_unread() {
            update.last_unread_timestamp
        } else {
            None
        };

        Self {
            key: update.key.clone(),
            status: update.status,
            unread_count: update.unread_count,
            unread_since_epoch_seconds: unread_since,
            last_message: update.last_message.clone(),
            tags: update.tags.clone(),
            display_name: update.display_name.clone(),
            picture_url: update.picture_url.clone(),
            oa_name: update.oa_name.clone(),
            read_by: update.read_by.clone(),
            is_active: false,
        }
    }

    /// 标记为已打开：清除未读时间与未读状态
    pub fn mark_opened(&mut self) {
        self.unread_since_epoch_seconds = None;
        if self.status.is_unread() {
            self.status = ConversationStatus::Read;
        }
    }

    /// 本地修改状态；离开 unread 时清除未读时间
    pub fn set_status(&mut self, status: ConversationStatus) {
        self.status = status;
        if !status.is_unread() {
            self.unread_since_epoch_seconds = None;
        }
    }

    pub fn has_unread_timer(&self) -> bool {
        self.status.is_unread() && self.unread_since_epoch_seconds.is_some()
    }
}
