//! 未读计时器注册表
//!
//! 每个会话键最多一个条目。未冻结条目随 tick 重新计算显示字符串；
//! 冻结后显示字符串固定，tick 跳过。

use std::collections::{BTreeMap, BTreeSet};

use oa_console_core::format_elapsed;
use serde::{Deserialize, Serialize};

use super::ConversationKey;

/// 计时器条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEntry {
    /// 从快照恢复的冻结条目没有起始时间
    pub since_epoch_seconds: Option<i64>,
    pub last_display: Option<String>,
    pub frozen_display: Option<String>,
}

impl TimerEntry {
    pub fn is_frozen(&self) -> bool {
        self.frozen_display.is_some()
    }

    /// 当前应展示的字符串
    pub fn display(&self) -> Option<&str> {
        self.frozen_display
            .as_deref()
            .or(self.last_display.as_deref())
    }
}

/// 单条显示更新
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerUpdate {
    pub key: ConversationKey,
    pub display: String,
}

#[derive(Debug, Default)]
pub struct TimerRegistry {
    entries: BTreeMap<ConversationKey, TimerEntry>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始计时；覆盖已有条目（包括冻结条目）
    pub fn start(&mut self, key: ConversationKey, since_epoch_seconds: i64) {
        self.entries.insert(
            key,
            TimerEntry {
                since_epoch_seconds: Some(since_epoch_seconds),
                last_display: None,
                frozen_display: None,
            },
        );
    }

    /// 重新计算所有未冻结条目，返回本次写出的显示
    pub fn tick(&mut self, now_epoch_seconds: i64) -> Vec<TimerUpdate> {
        let mut updates = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            if entry.is_frozen() {
                continue;
            }
            let Some(since) = entry.since_epoch_seconds else {
                continue;
            };
            let display = format_elapsed(now_epoch_seconds.saturating_sub(since));
            entry.last_display = Some(display.clone());
            updates.push(TimerUpdate {
                key: key.clone(),
                display,
            });
        }
        updates
    }

    /// 冻结：固定最后一次渲染的显示；从未渲染过则为空字符串
    ///
    /// 已冻结条目保持原值。条目不存在返回 `None`。
    pub fn freeze(&mut self, key: &ConversationKey) -> Option<String> {
        let entry = self.entries.get_mut(key)?;
        if let Some(frozen) = &entry.frozen_display {
            return Some(frozen.clone());
        }
        let frozen = entry.last_display.clone().unwrap_or_default();
        entry.frozen_display = Some(frozen.clone());
        Some(frozen)
    }

    /// 先按 `now` 做最后一次计算再冻结（打开会话时使用）
    pub fn freeze_at(&mut self, key: &ConversationKey, now_epoch_seconds: i64) -> Option<String> {
        let entry = self.entries.get_mut(key)?;
        if let (false, Some(since)) = (entry.is_frozen(), entry.since_epoch_seconds) {
            entry.last_display = Some(format_elapsed(now_epoch_seconds.saturating_sub(since)));
        }
        self.freeze(key)
    }

    pub fn remove(&mut self, key: &ConversationKey) -> Option<TimerEntry> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &ConversationKey) -> Option<&TimerEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ConversationKey) -> bool {
        self.entries.contains_key(key)
    }

    /// 是否处于计时中（存在且未冻结）
    pub fn is_ticking(&self, key: &ConversationKey) -> bool {
        self.entries.get(key).is_some_and(|e| !e.is_frozen())
    }

    pub fn display(&self, key: &ConversationKey) -> Option<&str> {
        self.entries.get(key).and_then(TimerEntry::display)
    }

    /// 所有冻结显示，刷新列表后用于重新覆盖
    pub fn frozen_displays(&self) -> Vec<TimerUpdate> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| {
                entry.frozen_display.as_ref().map(|display| TimerUpdate {
                    key: key.clone(),
                    display: display.clone(),
                })
            })
            .collect()
    }

    /// 整表替换后清理：不在列表中的条目一律删除（包括冻结条目），返回删除数量
    pub fn retain_keys<'a>(&mut self, keys: impl IntoIterator<Item = &'a ConversationKey>) -> usize {
        let keep: BTreeSet<&ConversationKey> = keys.into_iter().collect();
        let before = self.entries.len();
        self.entries.retain(|key, _| keep.contains(key));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            frozen: self
                .frozen_displays()
                .into_iter()
                .map(|update| FrozenTimer {
                    user_id: update.key.user_id,
                    oa_id: update.key.oa_id,
                    display: update.display,
                })
                .collect(),
        }
    }

    /// 从快照恢复冻结显示；不覆盖已存在的条目
    pub fn restore(&mut self, snapshot: &TimerSnapshot) -> usize {
        let mut restored = 0;
        for frozen in &snapshot.frozen {
            let key = ConversationKey::new(frozen.user_id.clone(), frozen.oa_id.clone());
            if self.entries.contains_key(&key) {
                continue;
            }
            self.entries.insert(
                key,
                TimerEntry {
                    since_epoch_seconds: None,
                    last_display: None,
                    frozen_display: Some(frozen.display.clone()),
                },
            );
            restored += 1;
        }
        restored
    }
}

/// 可持久化的冻结计时快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    #[serde(default)]
    pub frozen: Vec<FrozenTimer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenTimer {
    pub user_id: String,
    pub oa_id: String,
    pub display: String,
}
