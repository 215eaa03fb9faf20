// Embedded on-disk store. One sled tree holds id -> full snapshot JSON, a
// second holds id -> summary JSON so listing never decodes a book.

use std::path::Path;

use async_trait::async_trait;
use sled::transaction::{abort, TransactionError};
use sled::Transactional;
use tracing::{debug, info, warn};

use crate::persist::snapshot;
use crate::persist::types::{PersistResult, PersistanceError, Snapshot, SnapshotFilter, SnapshotSummary};
use crate::persist::SnapshotStore;

const TREE: &str = "snapshots";
const SUMMARY_TREE: &str = "snapshot_summaries";

pub struct SledSnapshotStore {
    tree: sled::Tree,
    summaries: sled::Tree,
}

impl SledSnapshotStore {
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let db = sled::open(path.as_ref())?;
        Self::from_db(&db)
    }

    pub fn from_db(db: &sled::Db) -> PersistResult<Self> {
        let store = Self { tree: db.open_tree(TREE)?, summaries: db.open_tree(SUMMARY_TREE)? };
        store.backfill_summaries()?;
        Ok(store)
    }

    // Snapshots written before the summary tree existed get a row now.
    fn backfill_summaries(&self) -> PersistResult<()> {
        let mut added = 0usize;
        for entry in self.tree.iter() {
            let (key, bytes) = entry?;
            if self.summaries.contains_key(&key)? {
                continue;
            }
            match snapshot::from_json(&bytes) {
                Ok(snap) => {
                    self.summaries.insert(&key, snapshot::summary_to_json(&snapshot::summarize(&snap))?)?;
                    added += 1;
                }
                Err(err) => warn!(key = %String::from_utf8_lossy(&key), %err, "not indexing snapshot"),
            }
        }
        if added > 0 {
            info!(added, "indexed existing snapshots");
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for SledSnapshotStore {
    async fn save_snapshot(&self, snap: &Snapshot) -> PersistResult<()> {
        snapshot::check_version(snap.schema_version)?;
        let full = snapshot::to_json(snap)?;
        let summary = snapshot::summary_to_json(&snapshot::summarize(snap))?;
        let key = snap.id.as_bytes();

        // both rows or neither; an existing id aborts
        let outcome = (&self.tree, &self.summaries).transaction(|(snaps, sums)| {
            if snaps.get(key)?.is_some() {
                return abort(());
            }
            snaps.insert(key, full.as_slice())?;
            sums.insert(key, summary.as_slice())?;
            Ok(())
        });
        match outcome {
            Ok(()) => {}
            Err(TransactionError::Abort(())) => return Err(PersistanceError::DuplicateId(snap.id.clone())),
            Err(TransactionError::Storage(err)) => return Err(err.into()),
        }

        self.tree.flush_async().await?;
        debug!(id = %snap.id, symbol = %snap.symbol, "snapshot written to sled");
        Ok(())
    }

    async fn get_snapshot(&self, id: &str) -> PersistResult<Option<Snapshot>> {
        match self.tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(snapshot::from_json(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_snapshots(&self, filter: &SnapshotFilter) -> PersistResult<Vec<SnapshotSummary>> {
        let mut rows = Vec::new();
        for entry in self.summaries.iter() {
            let (key, bytes) = entry?;
            if let Some(summary) = snapshot::listable_summary(&key, &bytes) {
                if snapshot::matches(filter, &summary.symbol) {
                    rows.push(summary);
                }
            }
        }
        Ok(snapshot::select(rows, filter))
    }
}
