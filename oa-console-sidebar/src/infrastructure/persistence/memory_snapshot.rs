use std::sync::Mutex;

use async_trait::async_trait;
use oa_console_core::{ConsoleError, ConsoleResult};

use crate::domain::model::TimerSnapshot;
use crate::domain::repository::TimerSnapshotStore;

/// 进程内快照存储（未配置快照路径时使用）
#[derive(Debug, Default)]
pub struct InMemoryTimerSnapshotStore {
    snapshot: Mutex<Option<TimerSnapshot>>,
}

impl InMemoryTimerSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TimerSnapshotStore for InMemoryTimerSnapshotStore {
    async fn load(&self) -> ConsoleResult<Option<TimerSnapshot>> {
        self.snapshot
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| ConsoleError::Snapshot("snapshot lock poisoned".to_string()))
    }

    async fn save(&self, snapshot: &TimerSnapshot) -> ConsoleResult<()> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|_| ConsoleError::Snapshot("snapshot lock poisoned".to_string()))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }
}
