use tracing::info;

use crate::domain::repository::{MessageNotification, Notifier};

/// 以结构化日志输出提醒（无桌面环境时的默认实现）
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &MessageNotification) {
        info!(
            user_id = %notification.key.user_id,
            oa_id = %notification.key.oa_id,
            title = %notification.title,
            body = %notification.body,
            "New message notification"
        );
    }
}
