pub mod types;
pub use types::*;
pub mod memory;
pub mod postgres;
pub mod sled_store;
pub mod snapshot;

use async_trait::async_trait;

/// Append-only snapshot storage. Backends never rewrite a saved snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save_snapshot(&self, snapshot: &Snapshot) -> PersistResult<()>;

    /// `Ok(None)` when no snapshot has this id.
    async fn get_snapshot(&self, id: &str) -> PersistResult<Option<Snapshot>>;

    /// Newest first.
    async fn list_snapshots(&self, filter: &SnapshotFilter) -> PersistResult<Vec<SnapshotSummary>>;
}
