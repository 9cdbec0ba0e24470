//! Storage module for persisting crawl data
//!
//! This module handles all persistence for the harvester:
//! - SQLite database initialization and schema management
//! - Per-source crawl state (seen identifiers, last run)
//! - Upserts of finished records
//! - Crawl cycle history
//!
//! An in-memory backend implements the same traits for tests.

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStorage;
pub use traits::{CycleLog, HarvestQuery, RecordSink, StateStore, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// One finished crawl cycle of one source
#[derive(Debug, Clone, PartialEq)]
pub struct CycleRecord {
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: CycleStatus,
    pub pages_visited: u32,
    pub new_items: u32,
    pub exported: u32,
    pub expired: u32,
    pub errors: u32,
    pub config_hash: String,
}

/// Status of a crawl cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Completed,
    Failed,
}

impl CycleStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
