pub mod memory_snapshot;
pub mod snapshot_file;

pub use memory_snapshot::InMemoryTimerSnapshotStore;
pub use snapshot_file::FileTimerSnapshotStore;
