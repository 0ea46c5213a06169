use serde::Deserialize;

use crate::domain::model::{ConversationKey, ConversationStatus};

/// 打开会话命令
#[derive(Debug, Clone, Deserialize)]
pub struct OpenConversationCommand {
    pub user_id: String,
    pub oa_id: String,
}

impl OpenConversationCommand {
    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(self.user_id.clone(), self.oa_id.clone())
    }
}

/// 本地修改状态命令
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeStatusCommand {
    pub user_id: String,
    pub oa_id: String,
    pub status: ConversationStatus,
}

impl ChangeStatusCommand {
    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(self.user_id.clone(), self.oa_id.clone())
    }
}

/// 切换状态筛选命令
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeFilterCommand {
    pub filter: String,
}

/// 翻页命令
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePageCommand {
    pub page: u32,
}

/// 搜索开关命令
#[derive(Debug, Clone, Deserialize)]
pub struct SetSearchActiveCommand {
    pub active: bool,
}

/// 切换 OA 分组命令
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateActiveGroupsCommand {
    #[serde(default)]
    pub group_ids: Vec<i64>,
}

/// 线程加载完成后登记已渲染消息
#[derive(Debug, Clone, Deserialize)]
pub struct RememberThreadMessagesCommand {
    #[serde(default)]
    pub message_ids: Vec<String>,
}

/// 本地命令（界面操作）
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "local", rename_all = "snake_case")]
pub enum SidebarCommand {
    OpenConversation(OpenConversationCommand),
    CloseConversation,
    ChangeStatus(ChangeStatusCommand),
    ChangeFilter(ChangeFilterCommand),
    ChangePage(ChangePageCommand),
    SetSearchActive(SetSearchActiveCommand),
    UpdateActiveGroups(UpdateActiveGroupsCommand),
    RememberThreadMessages(RememberThreadMessagesCommand),
}

impl SidebarCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SidebarCommand::OpenConversation(_) => "open_conversation",
            SidebarCommand::CloseConversation => "close_conversation",
            SidebarCommand::ChangeStatus(_) => "change_status",
            SidebarCommand::ChangeFilter(_) => "change_filter",
            SidebarCommand::ChangePage(_) => "change_page",
            SidebarCommand::SetSearchActive(_) => "set_search_active",
            SidebarCommand::UpdateActiveGroups(_) => "update_active_groups",
            SidebarCommand::RememberThreadMessages(_) => "remember_thread_messages",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let cmd: SidebarCommand =
            serde_json::from_str(r#"{"local":"open_conversation","user_id":"U1","oa_id":"3"}"#)
                .unwrap();
        let SidebarCommand::OpenConversation(open) = cmd else {
            panic!("expected open_conversation");
        };
        assert_eq!(open.key().room_name(), "chat_U1_3");

        let cmd: SidebarCommand = serde_json::from_str(
            r#"{"local":"change_status","user_id":"U1","oa_id":"3","status":"deposit"}"#,
        )
        .unwrap();
        assert_eq!(cmd.name(), "change_status");

        let cmd: SidebarCommand = serde_json::from_str(r#"{"local":"close_conversation"}"#).unwrap();
        assert!(matches!(cmd, SidebarCommand::CloseConversation));

        assert!(serde_json::from_str::<SidebarCommand>(r#"{"local":"reboot"}"#).is_err());
    }
}
