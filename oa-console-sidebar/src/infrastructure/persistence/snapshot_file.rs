use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use oa_console_core::{ConsoleError, ConsoleResult};
use tokio::fs;
use tracing::debug;

use crate::domain::model::TimerSnapshot;
use crate::domain::repository::TimerSnapshotStore;

/// JSON 文件快照存储；先写临时文件再重命名
#[derive(Clone, Debug)]
pub struct FileTimerSnapshotStore {
    path: PathBuf,
}

impl FileTimerSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "timers.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl TimerSnapshotStore for FileTimerSnapshotStore {
    async fn load(&self) -> ConsoleResult<Option<TimerSnapshot>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(ConsoleError::Snapshot(format!(
                    "read {}: {err}",
                    self.path.display()
                )));
            }
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| ConsoleError::Snapshot(format!("parse {}: {err}", self.path.display())))
    }

    async fn save(&self, snapshot: &TimerSnapshot) -> ConsoleResult<()> {
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|err| ConsoleError::Snapshot(err.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| ConsoleError::Snapshot(format!("create {}: {err}", parent.display())))?;
        }

        let temp = self.temp_path();
        fs::write(&temp, &json)
            .await
            .map_err(|err| ConsoleError::Snapshot(format!("write {}: {err}", temp.display())))?;
        fs::rename(&temp, &self.path)
            .await
            .map_err(|err| ConsoleError::Snapshot(format!("rename {}: {err}", self.path.display())))?;

        debug!(
            path = %self.path.display(),
            frozen = snapshot.frozen.len(),
            "Timer snapshot saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::FrozenTimer;

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTimerSnapshotStore::new(dir.path().join("absent.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTimerSnapshotStore::new(dir.path().join("state/timers.json"));
        let snapshot = TimerSnapshot {
            frozen: vec![FrozenTimer {
                user_id: "U1".into(),
                oa_id: "2".into(),
                display: "12:34".into(),
            }],
        };

        store.save(&snapshot).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(snapshot));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileTimerSnapshotStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, ConsoleError::Snapshot(_)));
    }
}
