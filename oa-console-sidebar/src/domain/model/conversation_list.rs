//! 会话列表模型
//!
//! 有序列表，每个会话键至多出现一次。排序规则由协调器决定，
//! 这里只负责按操作执行。

use super::{ConversationKey, ConversationSummary};

/// 插入位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPosition {
    Front,
    /// 插到指定键之前；该键不存在时退化为追加到末尾
    Before(ConversationKey),
    Back,
}

/// 列表操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOp {
    Remove {
        key: ConversationKey,
    },
    Insert {
        position: InsertPosition,
        summary: Box<ConversationSummary>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationList {
    entries: Vec<ConversationSummary>,
}

impl ConversationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由接口返回的整页数据构建；重复键只保留第一次出现
    pub fn from_summaries(summaries: impl IntoIterator<Item = ConversationSummary>) -> Self {
        let mut list = Self::new();
        for summary in summaries {
            if !list.contains(&summary.key) {
                list.entries.push(summary);
            }
        }
        list
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[ConversationSummary] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationSummary> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ConversationKey> {
        self.entries.iter().map(|s| &s.key)
    }

    pub fn position(&self, key: &ConversationKey) -> Option<usize> {
        self.entries.iter().position(|s| &s.key == key)
    }

    pub fn contains(&self, key: &ConversationKey) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &ConversationKey) -> Option<&ConversationSummary> {
        self.entries.iter().find(|s| &s.key == key)
    }

    pub fn get_mut(&mut self, key: &ConversationKey) -> Option<&mut ConversationSummary> {
        self.entries.iter_mut().find(|s| &s.key == key)
    }

    /// 第一个 closed 条目的键，可排除某个键（该键即将被移除）
    pub fn first_closed_except(&self, excluded: &ConversationKey) -> Option<&ConversationKey> {
        self.entries
            .iter()
            .find(|s| s.status.is_closed() && &s.key != excluded)
            .map(|s| &s.key)
    }

    pub fn apply(&mut self, op: ListOp) {
        match op {
            ListOp::Remove { key } => {
                self.entries.retain(|s| s.key != key);
            }
            ListOp::Insert { position, summary } => {
                // 保证键唯一
                self.entries.retain(|s| s.key != summary.key);
                let index = match position {
                    InsertPosition::Front => 0,
                    InsertPosition::Back => self.entries.len(),
                    InsertPosition::Before(anchor) => {
                        self.position(&anchor).unwrap_or(self.entries.len())
                    }
                };
                self.entries.insert(index, *summary);
            }
        }
    }

    pub fn apply_all(&mut self, ops: impl IntoIterator<Item = ListOp>) {
        for op in ops {
            self.apply(op);
        }
    }

    /// 整表替换
    pub fn replace_all(&mut self, summaries: impl IntoIterator<Item = ConversationSummary>) {
        *self = Self::from_summaries(summaries);
    }

    /// 按当前打开的会话重新计算高亮
    pub fn mark_active(&mut self, open_key: Option<&ConversationKey>) {
        for entry in self.entries.iter_mut() {
            entry.is_active = open_key == Some(&entry.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ConversationStatus, MessagePreview};

    fn summary(user: &str, status: ConversationStatus) -> ConversationSummary {
        ConversationSummary {
            key: ConversationKey::new(user, "1"),
            status,
            unread_count: 0,
            unread_since_epoch_seconds: None,
            last_message: MessagePreview::default(),
            tags: Vec::new(),
            display_name: user.to_string(),
            picture_url: None,
            oa_name: None,
            read_by: None,
            is_active: false,
        }
    }

    fn order(list: &ConversationList) -> Vec<&str> {
        list.iter().map(|s| s.key.user_id.as_str()).collect()
    }

    #[test]
    fn test_insert_positions() {
        let mut list = ConversationList::from_summaries([
            summary("X", ConversationStatus::Unread),
            summary("Y", ConversationStatus::Closed),
        ]);

        list.apply(ListOp::Insert {
            position: InsertPosition::Before(ConversationKey::new("Y", "1")),
            summary: Box::new(summary("Z", ConversationStatus::Closed)),
        });
        list.apply(ListOp::Insert {
            position: InsertPosition::Front,
            summary: Box::new(summary("W", ConversationStatus::Read)),
        });
        list.apply(ListOp::Insert {
            position: InsertPosition::Back,
            summary: Box::new(summary("V", ConversationStatus::Closed)),
        });

        assert_eq!(order(&list), vec!["W", "X", "Z", "Y", "V"]);
    }

    #[test]
    fn test_insert_keeps_key_unique() {
        let mut list = ConversationList::from_summaries([
            summary("A", ConversationStatus::Read),
            summary("B", ConversationStatus::Read),
        ]);
        list.apply(ListOp::Insert {
            position: InsertPosition::Front,
            summary: Box::new(summary("B", ConversationStatus::Unread)),
        });
        assert_eq!(order(&list), vec!["B", "A"]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_before_missing_anchor_appends() {
        let mut list = ConversationList::from_summaries([summary("A", ConversationStatus::Read)]);
        list.apply(ListOp::Insert {
            position: InsertPosition::Before(ConversationKey::new("gone", "1")),
            summary: Box::new(summary("B", ConversationStatus::Closed)),
        });
        assert_eq!(order(&list), vec!["A", "B"]);
    }

    #[test]
    fn test_remove_and_mark_active() {
        let mut list = ConversationList::from_summaries([
            summary("A", ConversationStatus::Read),
            summary("A", ConversationStatus::Unread),
            summary("B", ConversationStatus::Closed),
        ]);
        assert_eq!(list.len(), 2);

        let b = ConversationKey::new("B", "1");
        list.mark_active(Some(&b));
        assert!(list.get(&b).unwrap().is_active);
        assert!(!list.get(&ConversationKey::new("A", "1")).unwrap().is_active);

        list.apply(ListOp::Remove { key: b.clone() });
        list.apply(ListOp::Remove { key: b.clone() });
        assert!(!list.contains(&b));
        assert_eq!(list.first_closed_except(&b), None);
    }
}
