//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the harvester
//! database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Crawl state, one row per source
CREATE TABLE IF NOT EXISTS source_state (
    source TEXT PRIMARY KEY,
    last_run_at TEXT
);

-- Identifiers already handled, per source
CREATE TABLE IF NOT EXISTS seen_ids (
    source TEXT NOT NULL,
    item_id TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    PRIMARY KEY (source, item_id)
);

-- Exported records; ids are unique within one source
CREATE TABLE IF NOT EXISTS job_offers (
    source TEXT NOT NULL,
    item_id TEXT NOT NULL,
    url TEXT,
    title TEXT,
    company_name TEXT,
    date_posted TEXT,
    category TEXT,
    city TEXT,
    region TEXT,
    latitude REAL,
    longitude REAL,
    is_remote INTEGER NOT NULL DEFAULT 0,
    fields_json TEXT NOT NULL,
    provenance_json TEXT NOT NULL,
    scraped_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (source, item_id)
);

CREATE INDEX IF NOT EXISTS idx_job_offers_category ON job_offers(category);

-- Crawl cycle history
CREATE TABLE IF NOT EXISTS crawl_cycles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_visited INTEGER NOT NULL,
    new_items INTEGER NOT NULL,
    exported INTEGER NOT NULL,
    expired INTEGER NOT NULL,
    errors INTEGER NOT NULL,
    config_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crawl_cycles_source ON crawl_cycles(source);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
