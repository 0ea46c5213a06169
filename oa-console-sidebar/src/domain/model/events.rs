//! 实时通道事件契约
//!
//! 入站事件在这里完成解码与校验：缺少必需字段或状态未知的事件在解码阶段即被拒绝，
//! 不会进入协调器，从而保证"要么整体应用，要么完全不应用"。
//!
//! 同一逻辑事件在后端不同版本中有多个名字，统一归并为
//! `conversation_update` / `resort_signal` 一对。

use oa_console_core::utils::lenient::{value_to_epoch_seconds, value_to_id};
use oa_console_core::{
    ConsoleError, ConsoleResult, bail_malformed, deserialize_opt_epoch_seconds, deserialize_opt_id,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{ConversationKey, ConversationStatus, MessagePreview, Tag, TimerUpdate};

/// 会话更新事件的全部别名
pub const CONVERSATION_UPDATE_EVENTS: [&str; 3] = [
    "conversation_update",
    "update_conversation_list",
    "render_conversation_update",
];

/// 重排信号的别名（无负载时为纯信号，带 user_id 负载时按会话更新处理）
pub const RESORT_EVENTS: [&str; 2] = ["resort_signal", "resort_sidebar"];

/// 通道上的原始帧：`{"event": "...", "data": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "event")]
    pub name: String,
    #[serde(rename = "data", default)]
    pub payload: Value,
}

impl RawEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// 新消息事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub id: Option<String>,
    pub key: ConversationKey,
    pub sender_type: String,
    pub message_type: String,
    pub content: String,
    pub admin_email: Option<String>,
}

impl NewMessage {
    pub fn is_event_kind(&self) -> bool {
        self.message_type.eq_ignore_ascii_case("event")
    }

    pub fn is_from_admin(&self) -> bool {
        self.sender_type.eq_ignore_ascii_case("admin")
    }
}

/// 会话更新事件（整体替换语义）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationUpdate {
    pub key: ConversationKey,
    pub status: ConversationStatus,
    pub unread_count: u32,
    pub last_unread_timestamp: Option<i64>,
    pub display_name: String,
    pub picture_url: Option<String>,
    pub oa_name: Option<String>,
    pub tags: Vec<Tag>,
    pub last_message: MessagePreview,
    pub read_by: Option<String>,
}

/// 入站事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Connected,
    Disconnected { reason: String },
    ConnectError { message: String },
    NewMessage(NewMessage),
    ConversationUpdate(Box<ConversationUpdate>),
    ResortSignal,
}

impl InboundEvent {
    /// 解码原始帧
    ///
    /// 未知事件名返回 `Ok(None)`；负载不合法返回事件级错误。
    pub fn decode(raw: &RawEvent) -> ConsoleResult<Option<Self>> {
        let name = raw.name.trim();
        let event = match name {
            "connect" => InboundEvent::Connected,
            "disconnect" => InboundEvent::Disconnected {
                reason: text_or_field(&raw.payload, "reason"),
            },
            "connect_error" => InboundEvent::ConnectError {
                message: text_or_field(&raw.payload, "message"),
            },
            "new_message" => InboundEvent::NewMessage(decode_new_message(&raw.payload)?),
            n if CONVERSATION_UPDATE_EVENTS.contains(&n) => {
                InboundEvent::ConversationUpdate(Box::new(decode_conversation_update(
                    &raw.payload,
                )?))
            }
            n if RESORT_EVENTS.contains(&n) => {
                if carries_conversation(&raw.payload) {
                    InboundEvent::ConversationUpdate(Box::new(decode_conversation_update(
                        &raw.payload,
                    )?))
                } else {
                    InboundEvent::ResortSignal
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Connected => "connect",
            InboundEvent::Disconnected { .. } => "disconnect",
            InboundEvent::ConnectError { .. } => "connect_error",
            InboundEvent::NewMessage(_) => "new_message",
            InboundEvent::ConversationUpdate(_) => "conversation_update",
            InboundEvent::ResortSignal => "resort_signal",
        }
    }
}

/// 客户端发往通道的命令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "snake_case")]
pub enum ChannelCommand {
    Join { room: String },
    Leave { room: String },
    UpdateActiveGroups { group_ids: Vec<i64> },
}

impl ChannelCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelCommand::Join { .. } => "join",
            ChannelCommand::Leave { .. } => "leave",
            ChannelCommand::UpdateActiveGroups { .. } => "update_active_groups",
        }
    }
}

/// 打开会话时交给线程加载器的参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadLoad {
    pub key: ConversationKey,
    /// 打开时冻结的计时显示，随线程请求一起发给后端
    pub frozen_time: Option<String>,
}

/// 写给渲染方的输出帧：`{"timers": [...]}` / `{"load_thread": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderFrame {
    Timers(Vec<TimerUpdate>),
    LoadThread(ThreadLoad),
}

/// `new_message` 负载
#[derive(Debug, Default, Deserialize)]
struct NewMessagePayload {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    user_id: Option<String>,
    #[serde(default, alias = "line_account_id", deserialize_with = "deserialize_opt_id")]
    oa_id: Option<String>,
    #[serde(default)]
    sender_type: Option<String>,
    #[serde(default)]
    message_type: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    admin_email: Option<String>,
}

/// 标签负载
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagPayload {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "color_hex")]
    pub color: Option<String>,
}

impl TagPayload {
    fn into_tag(self) -> Option<Tag> {
        let name = self.name.filter(|n| !n.trim().is_empty())?;
        Some(Tag {
            id: self.id.unwrap_or_else(|| name.clone()),
            name,
            color_hex: self.color.unwrap_or_default(),
        })
    }
}

/// 会话更新负载，同时用作侧边栏列表接口的行格式
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationUpdatePayload {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub user_id: Option<String>,
    #[serde(default, alias = "oa_id", deserialize_with = "deserialize_opt_id")]
    pub line_account_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_count")]
    pub unread_count: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_epoch_seconds")]
    pub last_unread_timestamp: Option<i64>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub oa_name: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<TagPayload>>,
    #[serde(default)]
    pub last_message_prefix: Option<String>,
    #[serde(default)]
    pub last_message_content: Option<String>,
    #[serde(default)]
    pub last_message_iso_timestamp: Option<String>,
    #[serde(default)]
    pub read_by: Option<String>,
}

impl ConversationUpdatePayload {
    /// 校验并转换为领域事件
    pub fn into_update(self) -> ConsoleResult<ConversationUpdate> {
        let Some(user_id) = self.user_id else {
            bail_malformed!("conversation update without user_id");
        };
        let Some(oa_id) = self.line_account_id else {
            bail_malformed!("conversation update for {} without line_account_id", user_id);
        };
        let status = match self.status.as_deref() {
            Some(status) => status.parse::<ConversationStatus>()?,
            None => bail_malformed!("conversation update for {} without status", user_id),
        };

        let display_name = self
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| user_id.clone());
        let tags = self
            .tags
            .unwrap_or_default()
            .into_iter()
            .filter_map(TagPayload::into_tag)
            .collect();

        Ok(ConversationUpdate {
            key: ConversationKey::new(user_id, oa_id),
            status,
            unread_count: self.unread_count.unwrap_or(0),
            last_unread_timestamp: self.last_unread_timestamp,
            display_name,
            picture_url: self.picture_url.filter(|u| !u.is_empty()),
            oa_name: self.oa_name,
            tags,
            last_message: MessagePreview {
                prefix: self.last_message_prefix.unwrap_or_default(),
                content: self.last_message_content.unwrap_or_default(),
                iso_timestamp: self.last_message_iso_timestamp,
            },
            read_by: self.read_by.filter(|r| !r.is_empty()),
        })
    }
}

fn decode_new_message(payload: &Value) -> ConsoleResult<NewMessage> {
    if !payload.is_object() {
        bail_malformed!("new_message payload is not an object");
    }
    let payload: NewMessagePayload = serde_json::from_value(payload.clone())?;
    let Some(user_id) = payload.user_id else {
        bail_malformed!("new_message without user_id");
    };
    let Some(oa_id) = payload.oa_id else {
        bail_malformed!("new_message for {} without oa_id", user_id);
    };

    Ok(NewMessage {
        id: payload.id,
        key: ConversationKey::new(user_id, oa_id),
        sender_type: payload.sender_type.unwrap_or_default(),
        message_type: payload.message_type.unwrap_or_else(|| "text".to_string()),
        content: payload.content.unwrap_or_default(),
        admin_email: payload.admin_email.filter(|e| !e.is_empty()),
    })
}

fn decode_conversation_update(payload: &Value) -> ConsoleResult<ConversationUpdate> {
    if !payload.is_object() {
        return Err(ConsoleError::MalformedEvent(
            "conversation update payload is not an object".to_string(),
        ));
    }
    let payload: ConversationUpdatePayload = serde_json::from_value(payload.clone())?;
    payload.into_update()
}

fn carries_conversation(payload: &Value) -> bool {
    payload
        .get("user_id")
        .and_then(value_to_id)
        .is_some()
}

fn text_or_field(payload: &Value, field: &str) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn deserialize_opt_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| value_to_epoch_seconds(&v))
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX)))
}
