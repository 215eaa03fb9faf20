use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::market_data::unified_book::AggregatedBook;

#[derive(Error, Debug)]
pub enum PersistanceError {
    #[error("I/O failure: {0}")]
    IoFailure(String),

    #[error("serialization error: {0}")]
    SerializationFailure(#[from] serde_json::Error),

    #[error("snapshot schema version {found}, expected {expected}")]
    FormatMismatch { found: u32, expected: u32 },

    #[error("snapshot id `{0}` already exists")]
    DuplicateId(String),

    #[error("other error: {0}")]
    Other(String),
}

impl From<sled::Error> for PersistanceError {
    fn from(err: sled::Error) -> Self {
        PersistanceError::IoFailure(err.to_string())
    }
}

impl From<sqlx::Error> for PersistanceError {
    fn from(err: sqlx::Error) -> Self {
        PersistanceError::IoFailure(err.to_string())
    }
}

pub type PersistResult<T> = Result<T, PersistanceError>;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// A saved aggregation. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub symbol: String,
    pub timestamp_ms: u64,
    pub schema_version: u32,
    pub book: AggregatedBook,
}

/// Listing row; the book itself stays in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: String,
    pub symbol: String,
    pub timestamp_ms: u64,
    pub schema_version: u32,
    pub exchanges: usize,
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub crossed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFilter {
    pub symbol: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for SnapshotFilter {
    fn default() -> Self {
        Self { symbol: None, limit: 20, offset: 0 }
    }
}

/// Returned by a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSnapshot {
    pub id: String,
    pub symbol: String,
    pub timestamp_ms: u64,
}
