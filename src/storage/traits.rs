//! Storage traits and error types
//!
//! The crawl engine talks to persistence through three narrow capabilities:
//! a per-source [`StateStore`], a [`RecordSink`] for finished records and a
//! [`CycleLog`] for cycle history. [`HarvestQuery`] serves the reporting side.

use crate::record::{DetailRecord, Provenance};
use crate::state::CrawlState;
use crate::storage::CycleRecord;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Record rejected: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persisted crawl state, one entry per source
///
/// Entries are partitioned by source name, so concurrent cycles of
/// different sources never touch the same entry.
pub trait StateStore: Send + Sync {
    /// Loads the state of `source`
    ///
    /// A source that never completed a cycle has an empty state. Unreadable
    /// timestamps load as `None`.
    fn load_state(&self, source: &str) -> StorageResult<CrawlState>;

    /// Merges a completed cycle into the stored state
    ///
    /// # Arguments
    ///
    /// * `source` - The source name
    /// * `new_ids` - Identifiers handled during the cycle; added, never replacing
    /// * `cycle_started` - Start time of the cycle; the stored last-run never
    ///   moves backwards
    fn merge_state(
        &self,
        source: &str,
        new_ids: &HashSet<String>,
        cycle_started: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Forgets everything about `source`
    fn reset_state(&self, source: &str) -> StorageResult<()>;
}

/// Destination of finished records
pub trait RecordSink: Send + Sync {
    /// Inserts or replaces the record keyed by its unique id
    fn upsert(&self, record: &DetailRecord) -> StorageResult<()>;
}

/// History of crawl cycles
pub trait CycleLog: Send + Sync {
    fn record_cycle(&self, cycle: &CycleRecord) -> StorageResult<()>;
}

/// Read side used by reports
pub trait HarvestQuery {
    /// Total number of stored records
    fn count_offers(&self) -> StorageResult<u64>;

    /// Loads one stored record of `source`
    fn get_offer(&self, source: &str, unique_id: &str) -> StorageResult<Option<DetailRecord>>;

    /// Record counts per source, sorted by source
    fn offers_by_source(&self) -> StorageResult<Vec<(String, u64)>>;

    /// Record counts per category, sorted by category
    fn offers_by_category(&self) -> StorageResult<Vec<(String, u64)>>;

    /// Number of field values per provenance tag, over all records
    fn provenance_distribution(&self) -> StorageResult<BTreeMap<Provenance, u64>>;

    /// Most recent cycle of every source, sorted by source
    fn latest_cycles(&self) -> StorageResult<Vec<CycleRecord>>;
}
