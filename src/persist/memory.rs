// In-process store, mostly for tests and one-shot runs.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::persist::snapshot;
use crate::persist::types::{PersistResult, PersistanceError, Snapshot, SnapshotFilter, SnapshotSummary};
use crate::persist::SnapshotStore;

#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<String, Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save_snapshot(&self, snap: &Snapshot) -> PersistResult<()> {
        snapshot::check_version(snap.schema_version)?;
        let mut guard = self.snapshots.write();
        if guard.contains_key(&snap.id) {
            return Err(PersistanceError::DuplicateId(snap.id.clone()));
        }
        guard.insert(snap.id.clone(), snap.clone());
        Ok(())
    }

    async fn get_snapshot(&self, id: &str) -> PersistResult<Option<Snapshot>> {
        Ok(self.snapshots.read().get(id).cloned())
    }

    async fn list_snapshots(&self, filter: &SnapshotFilter) -> PersistResult<Vec<SnapshotSummary>> {
        let rows: Vec<SnapshotSummary> = self.snapshots.read().values().map(snapshot::summarize).collect();
        Ok(snapshot::select(rows, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::snapshot::tests::snapshot_at;

    #[tokio::test]
    async fn test_save_get_list() {
        let store = MemorySnapshotStore::new();
        store.save_snapshot(&snapshot_at("BTC", "obs_1", 10)).await.unwrap();
        store.save_snapshot(&snapshot_at("BTC", "obs_2", 20)).await.unwrap();

        assert_eq!(store.get_snapshot("obs_1").await.unwrap().unwrap().timestamp_ms, 10);
        assert!(store.get_snapshot("missing").await.unwrap().is_none());

        let listed = store.list_snapshots(&SnapshotFilter::default()).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["obs_2", "obs_1"]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_saved_snapshots_are_never_overwritten() {
        let store = MemorySnapshotStore::new();
        store.save_snapshot(&snapshot_at("BTC", "same", 1)).await.unwrap();
        let err = store.save_snapshot(&snapshot_at("ETH", "same", 2)).await.unwrap_err();
        assert!(matches!(err, PersistanceError::DuplicateId(id) if id == "same"));
        assert_eq!(store.get_snapshot("same").await.unwrap().unwrap().symbol, "BTC");
    }
}
