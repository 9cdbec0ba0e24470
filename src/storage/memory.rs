//! In-memory storage backend

use crate::record::{DetailRecord, Provenance};
use crate::state::CrawlState;
use crate::storage::traits::{
    CycleLog, HarvestQuery, RecordSink, StateStore, StorageError, StorageResult,
};
use crate::storage::CycleRecord;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    states: HashMap<String, CrawlState>,
    offers: BTreeMap<(String, String), DetailRecord>,
    cycles: Vec<CycleRecord>,
    rejected: HashSet<String>,
    upserts: usize,
}

/// Storage held entirely in memory
///
/// Implements every storage trait with the same semantics as
/// [`SqliteStorage`](crate::storage::SqliteStorage). Ids registered with
/// [`MemoryStore::reject`] make `upsert` fail, which lets callers exercise
/// sink errors.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every upsert of `unique_id` fail
    pub fn reject(&self, unique_id: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.rejected.insert(unique_id.to_string());
        }
    }

    /// Number of upsert calls that succeeded
    pub fn upsert_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.upserts).unwrap_or(0)
    }

    /// All recorded cycles, oldest first
    pub fn cycles(&self) -> Vec<CycleRecord> {
        self.inner
            .lock()
            .map(|inner| inner.cycles.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Database("memory store mutex poisoned".to_string()))
    }
}

impl StateStore for MemoryStore {
    fn load_state(&self, source: &str) -> StorageResult<CrawlState> {
        Ok(self.lock()?.states.get(source).cloned().unwrap_or_default())
    }

    fn merge_state(
        &self,
        source: &str,
        new_ids: &HashSet<String>,
        cycle_started: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.lock()?
            .states
            .entry(source.to_string())
            .or_default()
            .merge(new_ids.iter().cloned(), cycle_started);
        Ok(())
    }

    fn reset_state(&self, source: &str) -> StorageResult<()> {
        self.lock()?.states.remove(source);
        Ok(())
    }
}

impl RecordSink for MemoryStore {
    fn upsert(&self, record: &DetailRecord) -> StorageResult<()> {
        if record.unique_id.trim().is_empty() {
            return Err(StorageError::Rejected("empty unique id".to_string()));
        }
        let mut inner = self.lock()?;
        if inner.rejected.contains(&record.unique_id) {
            return Err(StorageError::Rejected(record.unique_id.clone()));
        }
        inner
            .offers
            .insert((record.source.clone(), record.unique_id.clone()), record.clone());
        inner.upserts += 1;
        Ok(())
    }
}

impl CycleLog for MemoryStore {
    fn record_cycle(&self, cycle: &CycleRecord) -> StorageResult<()> {
        self.lock()?.cycles.push(cycle.clone());
        Ok(())
    }
}

impl HarvestQuery for MemoryStore {
    fn count_offers(&self) -> StorageResult<u64> {
        Ok(self.lock()?.offers.len() as u64)
    }

    fn get_offer(&self, source: &str, unique_id: &str) -> StorageResult<Option<DetailRecord>> {
        let key = (source.to_string(), unique_id.to_string());
        Ok(self.lock()?.offers.get(&key).cloned())
    }

    fn offers_by_source(&self) -> StorageResult<Vec<(String, u64)>> {
        let inner = self.lock()?;
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for record in inner.offers.values() {
            *counts.entry(record.source.clone()).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    fn offers_by_category(&self) -> StorageResult<Vec<(String, u64)>> {
        let inner = self.lock()?;
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for record in inner.offers.values() {
            let category = record
                .category
                .clone()
                .unwrap_or_else(|| "uncategorized".to_string());
            *counts.entry(category).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    fn provenance_distribution(&self) -> StorageResult<BTreeMap<Provenance, u64>> {
        let inner = self.lock()?;
        let mut distribution = BTreeMap::new();
        for tag in inner.offers.values().flat_map(|r| r.provenance.values()) {
            *distribution.entry(*tag).or_insert(0) += 1;
        }
        Ok(distribution)
    }

    fn latest_cycles(&self) -> StorageResult<Vec<CycleRecord>> {
        let inner = self.lock()?;
        let mut latest: BTreeMap<String, CycleRecord> = BTreeMap::new();
        for cycle in &inner.cycles {
            latest.insert(cycle.source.clone(), cycle.clone());
        }
        Ok(latest.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_ids_fail() {
        let store = MemoryStore::new();
        store.reject("b");

        assert!(store.upsert(&DetailRecord::new("s", "a", None)).is_ok());
        assert!(store.upsert(&DetailRecord::new("s", "b", None)).is_err());
        assert_eq!(store.count_offers().unwrap(), 1);
        assert_eq!(store.upsert_count(), 1);
    }

    #[test]
    fn test_upsert_overwrites() {
        let store = MemoryStore::new();
        let mut record = DetailRecord::new("s", "a", None);
        store.upsert(&record).unwrap();
        record.category = Some("job".to_string());
        store.upsert(&record).unwrap();

        assert_eq!(store.count_offers().unwrap(), 1);
        assert_eq!(
            store.get_offer("s", "a").unwrap().unwrap().category.as_deref(),
            Some("job")
        );
    }

    #[test]
    fn test_offers_are_keyed_per_source() {
        let store = MemoryStore::new();
        store.upsert(&DetailRecord::new("board_a", "123", None)).unwrap();
        store.upsert(&DetailRecord::new("board_b", "123", None)).unwrap();

        assert_eq!(store.count_offers().unwrap(), 2);
        assert!(store.get_offer("board_a", "123").unwrap().is_some());
        assert!(store.get_offer("board_b", "123").unwrap().is_some());
    }

    #[test]
    fn test_state_merge_and_reset() {
        let store = MemoryStore::new();
        let ids: HashSet<String> = ["x".to_string()].into_iter().collect();
        store.merge_state("s", &ids, Utc::now()).unwrap();
        assert!(store.load_state("s").unwrap().has_seen("x"));

        store.reset_state("s").unwrap();
        assert_eq!(store.load_state("s").unwrap(), CrawlState::new());
    }
}
