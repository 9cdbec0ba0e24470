//! SQLite storage implementation
//!
//! One database backs the state store, the record sink and the cycle log.

use crate::record::{DetailRecord, FieldValue, GeoInfo, Provenance};
use crate::state::CrawlState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    CycleLog, HarvestQuery, RecordSink, StateStore, StorageError, StorageResult,
};
use crate::storage::{CycleRecord, CycleStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// SQLite storage backend
///
/// The connection sits behind a mutex so one handle can be shared by the
/// concurrent per-source cycles.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))
    }
}

fn to_db_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn from_db_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn row_to_cycle(row: &Row<'_>) -> rusqlite::Result<CycleRecord> {
    let started_at: String = row.get(1)?;
    let finished_at: String = row.get(2)?;
    let status: String = row.get(3)?;
    Ok(CycleRecord {
        source: row.get(0)?,
        started_at: from_db_time(&started_at).unwrap_or_default(),
        finished_at: from_db_time(&finished_at).unwrap_or_default(),
        status: CycleStatus::from_db_string(&status).unwrap_or(CycleStatus::Failed),
        pages_visited: row.get(4)?,
        new_items: row.get(5)?,
        exported: row.get(6)?,
        expired: row.get(7)?,
        errors: row.get(8)?,
        config_hash: row.get(9)?,
    })
}

impl StateStore for SqliteStorage {
    fn load_state(&self, source: &str) -> StorageResult<CrawlState> {
        let conn = self.lock()?;

        let last_run_raw: Option<Option<String>> = conn
            .query_row(
                "SELECT last_run_at FROM source_state WHERE source = ?1",
                params![source],
                |row| row.get(0),
            )
            .optional()?;
        let last_run = match last_run_raw.flatten() {
            Some(raw) => {
                let parsed = from_db_time(&raw);
                if parsed.is_none() {
                    warn!("Ignoring unreadable last run '{}' for {}", raw, source);
                }
                parsed
            }
            None => None,
        };

        let mut stmt = conn.prepare("SELECT item_id FROM seen_ids WHERE source = ?1")?;
        let seen_ids = stmt
            .query_map(params![source], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(CrawlState { seen_ids, last_run })
    }

    fn merge_state(
        &self,
        source: &str,
        new_ids: &HashSet<String>,
        cycle_started: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = to_db_time(Utc::now());

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO seen_ids (source, item_id, first_seen_at) VALUES (?1, ?2, ?3)",
            )?;
            for id in new_ids {
                stmt.execute(params![source, id, now])?;
            }
        }

        // RFC 3339 in UTC with a fixed precision sorts chronologically
        tx.execute(
            "INSERT INTO source_state (source, last_run_at) VALUES (?1, ?2)
             ON CONFLICT(source) DO UPDATE SET last_run_at =
                 CASE WHEN last_run_at IS NULL OR last_run_at < excluded.last_run_at
                      THEN excluded.last_run_at ELSE last_run_at END",
            params![source, to_db_time(cycle_started)],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn reset_state(&self, source: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM seen_ids WHERE source = ?1", params![source])?;
        conn.execute("DELETE FROM source_state WHERE source = ?1", params![source])?;
        Ok(())
    }
}

impl RecordSink for SqliteStorage {
    fn upsert(&self, record: &DetailRecord) -> StorageResult<()> {
        if record.unique_id.trim().is_empty() {
            return Err(StorageError::Rejected("empty unique id".to_string()));
        }
        let fields_json = serde_json::to_string(&record.fields)?;
        let provenance_json = serde_json::to_string(&record.provenance)?;
        let now = to_db_time(Utc::now());

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO job_offers (
                 item_id, source, url, title, company_name, date_posted, category,
                 city, region, latitude, longitude, is_remote,
                 fields_json, provenance_json, scraped_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(source, item_id) DO UPDATE SET
                 url = excluded.url,
                 title = excluded.title,
                 company_name = excluded.company_name,
                 date_posted = excluded.date_posted,
                 category = excluded.category,
                 city = excluded.city,
                 region = excluded.region,
                 latitude = excluded.latitude,
                 longitude = excluded.longitude,
                 is_remote = excluded.is_remote,
                 fields_json = excluded.fields_json,
                 provenance_json = excluded.provenance_json,
                 scraped_at = excluded.scraped_at,
                 updated_at = excluded.updated_at",
            params![
                record.unique_id,
                record.source,
                record.url,
                record.text("title"),
                record.text("company_name"),
                record.text("date_posted"),
                record.category,
                record.geo.city,
                record.geo.region,
                record.geo.latitude,
                record.geo.longitude,
                record.geo.is_remote,
                fields_json,
                provenance_json,
                to_db_time(record.scraped_at),
                now,
            ],
        )?;
        Ok(())
    }
}

impl CycleLog for SqliteStorage {
    fn record_cycle(&self, cycle: &CycleRecord) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO crawl_cycles (
                 source, started_at, finished_at, status, pages_visited,
                 new_items, exported, expired, errors, config_hash
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                cycle.source,
                to_db_time(cycle.started_at),
                to_db_time(cycle.finished_at),
                cycle.status.to_db_string(),
                cycle.pages_visited,
                cycle.new_items,
                cycle.exported,
                cycle.expired,
                cycle.errors,
                cycle.config_hash,
            ],
        )?;
        Ok(())
    }
}

impl HarvestQuery for SqliteStorage {
    fn count_offers(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM job_offers", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn get_offer(&self, source: &str, unique_id: &str) -> StorageResult<Option<DetailRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT source, url, category, city, region, latitude, longitude, is_remote,
                        fields_json, provenance_json, scraped_at
                 FROM job_offers WHERE source = ?1 AND item_id = ?2",
                params![source, unique_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        GeoInfo {
                            city: row.get(3)?,
                            region: row.get(4)?,
                            latitude: row.get(5)?,
                            longitude: row.get(6)?,
                            is_remote: row.get(7)?,
                        },
                        row.get::<_, String>(8)?,
                        row.get::<_, String>(9)?,
                        row.get::<_, String>(10)?,
                    ))
                },
            )
            .optional()?;

        let Some((source, url, category, geo, fields_json, provenance_json, scraped_at)) = row
        else {
            return Ok(None);
        };

        let fields: BTreeMap<String, Option<FieldValue>> = serde_json::from_str(&fields_json)?;
        let provenance: BTreeMap<String, Provenance> = serde_json::from_str(&provenance_json)?;

        Ok(Some(DetailRecord {
            source,
            unique_id: unique_id.to_string(),
            url,
            fields,
            provenance,
            category,
            geo,
            scraped_at: from_db_time(&scraped_at).unwrap_or_default(),
        }))
    }

    fn offers_by_source(&self) -> StorageResult<Vec<(String, u64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT source, COUNT(*) FROM job_offers GROUP BY source ORDER BY source",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn offers_by_category(&self) -> StorageResult<Vec<(String, u64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT COALESCE(category, 'uncategorized'), COUNT(*) FROM job_offers
             GROUP BY 1 ORDER BY 1",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn provenance_distribution(&self) -> StorageResult<BTreeMap<Provenance, u64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT provenance_json FROM job_offers")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut distribution = BTreeMap::new();
        for raw in rows {
            let tags: BTreeMap<String, Provenance> = serde_json::from_str(&raw)?;
            for tag in tags.into_values() {
                *distribution.entry(tag).or_insert(0) += 1;
            }
        }
        Ok(distribution)
    }

    fn latest_cycles(&self) -> StorageResult<Vec<CycleRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT source, started_at, finished_at, status, pages_visited,
                    new_items, exported, expired, errors, config_hash
             FROM crawl_cycles c
             WHERE id = (SELECT MAX(id) FROM crawl_cycles WHERE source = c.source)
             ORDER BY source",
        )?;
        let cycles = stmt
            .query_map([], row_to_cycle)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn record(id: &str, title: &str) -> DetailRecord {
        let mut record = DetailRecord::new("emploi_tg", id, Some(id.to_string()));
        record.set("title", Some(title.into()), Provenance::Structural);
        record.set("remote_possible", Some(FieldValue::Flag(false)), Provenance::Heuristic);
        record.set("salary", None, Provenance::Unresolved);
        record.category = Some("job".to_string());
        record
    }

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_file_database_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harvest.db");
        let started = Utc::now();

        {
            let storage = SqliteStorage::new(&path).unwrap();
            storage.merge_state("emploi_tg", &ids(&["a"]), started).unwrap();
        }

        let storage = SqliteStorage::new(&path).unwrap();
        let state = storage.load_state("emploi_tg").unwrap();
        assert!(state.has_seen("a"));
    }

    #[test]
    fn test_unknown_source_has_empty_state() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert_eq!(storage.load_state("nope").unwrap(), CrawlState::new());
    }

    #[test]
    fn test_merge_state_is_additive_and_partitioned() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let first = Utc::now() - Duration::hours(2);
        let second = Utc::now();

        storage.merge_state("a", &ids(&["1", "2"]), first).unwrap();
        storage.merge_state("a", &ids(&["2", "3"]), second).unwrap();
        storage.merge_state("b", &ids(&["9"]), first).unwrap();

        let a = storage.load_state("a").unwrap();
        assert_eq!(a.seen_ids, ids(&["1", "2", "3"]));
        assert_eq!(a.last_run.map(to_db_time), Some(to_db_time(second)));

        let b = storage.load_state("b").unwrap();
        assert_eq!(b.seen_ids, ids(&["9"]));
    }

    #[test]
    fn test_last_run_never_moves_backwards() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let later = Utc::now();
        storage.merge_state("a", &HashSet::new(), later).unwrap();
        storage
            .merge_state("a", &HashSet::new(), later - Duration::days(1))
            .unwrap();

        let state = storage.load_state("a").unwrap();
        assert_eq!(state.last_run.map(to_db_time), Some(to_db_time(later)));
    }

    #[test]
    fn test_corrupt_timestamp_loads_as_none() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO source_state (source, last_run_at) VALUES ('a', 'hier soir')",
                [],
            )
            .unwrap();

        let state = storage.load_state("a").unwrap();
        assert_eq!(state.last_run, None);
    }

    #[test]
    fn test_reset_state() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.merge_state("a", &ids(&["1"]), Utc::now()).unwrap();
        storage.merge_state("b", &ids(&["2"]), Utc::now()).unwrap();

        storage.reset_state("a").unwrap();

        assert_eq!(storage.load_state("a").unwrap(), CrawlState::new());
        assert!(storage.load_state("b").unwrap().has_seen("2"));
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.upsert(&record("https://x.tg/1", "Comptable")).unwrap();
        storage.upsert(&record("https://x.tg/1", "Comptable")).unwrap();
        assert_eq!(storage.count_offers().unwrap(), 1);

        storage.upsert(&record("https://x.tg/1", "Comptable senior")).unwrap();
        let stored = storage.get_offer("emploi_tg", "https://x.tg/1").unwrap().unwrap();
        assert_eq!(stored.text("title"), Some("Comptable senior"));
        assert_eq!(storage.count_offers().unwrap(), 1);
    }

    #[test]
    fn test_same_id_in_two_sources_is_kept_twice() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let mut first = DetailRecord::new("board_a", "123", None);
        first.set("title", Some("Comptable".into()), Provenance::Structural);
        let mut second = DetailRecord::new("board_b", "123", None);
        second.set("title", Some("Chauffeur".into()), Provenance::Structural);

        storage.upsert(&first).unwrap();
        storage.upsert(&second).unwrap();

        assert_eq!(storage.count_offers().unwrap(), 2);
        let stored_a = storage.get_offer("board_a", "123").unwrap().unwrap();
        let stored_b = storage.get_offer("board_b", "123").unwrap().unwrap();
        assert_eq!(stored_a.text("title"), Some("Comptable"));
        assert_eq!(stored_b.text("title"), Some("Chauffeur"));
        assert_eq!(storage.get_offer("board_c", "123").unwrap(), None);
    }

    #[test]
    fn test_stored_record_keeps_values_and_tags() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.upsert(&record("https://x.tg/1", "Comptable")).unwrap();

        let stored = storage.get_offer("emploi_tg", "https://x.tg/1").unwrap().unwrap();
        assert_eq!(stored.get("remote_possible"), Some(&FieldValue::Flag(false)));
        assert_eq!(stored.get("salary"), None);
        assert_eq!(stored.provenance_of("salary"), Some(Provenance::Unresolved));
        assert_eq!(stored.provenance_of("remote_possible"), Some(Provenance::Heuristic));
        assert_eq!(stored.category.as_deref(), Some("job"));
    }

    #[test]
    fn test_upsert_rejects_empty_id() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.upsert(&record("  ", "Comptable")),
            Err(StorageError::Rejected(_))
        ));
    }

    #[test]
    fn test_report_queries() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.upsert(&record("https://x.tg/1", "A")).unwrap();
        storage.upsert(&record("https://x.tg/2", "B")).unwrap();

        assert_eq!(
            storage.offers_by_source().unwrap(),
            vec![("emploi_tg".to_string(), 2)]
        );
        assert_eq!(
            storage.offers_by_category().unwrap(),
            vec![("job".to_string(), 2)]
        );

        let distribution = storage.provenance_distribution().unwrap();
        assert_eq!(distribution.get(&Provenance::Structural), Some(&2));
        assert_eq!(distribution.get(&Provenance::Heuristic), Some(&2));
        assert_eq!(distribution.get(&Provenance::Unresolved), Some(&2));
    }

    #[test]
    fn test_latest_cycle_per_source() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let now = Utc::now();
        let cycle = |source: &str, exported: u32| CycleRecord {
            source: source.to_string(),
            started_at: now,
            finished_at: now,
            status: CycleStatus::Completed,
            pages_visited: 1,
            new_items: exported,
            exported,
            expired: 0,
            errors: 0,
            config_hash: "abc".to_string(),
        };

        storage.record_cycle(&cycle("a", 1)).unwrap();
        storage.record_cycle(&cycle("a", 5)).unwrap();
        storage.record_cycle(&cycle("b", 2)).unwrap();

        let latest = storage.latest_cycles().unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].source, "a");
        assert_eq!(latest[0].exported, 5);
        assert_eq!(latest[1].source, "b");
    }
}
