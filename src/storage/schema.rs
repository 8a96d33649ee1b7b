//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Exile Tracker database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Player accounts on the game site
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_name TEXT NOT NULL UNIQUE,
    player TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

-- Characters belonging to accounts
CREATE TABLE IF NOT EXISTS characters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL REFERENCES accounts(id),
    character_name TEXT NOT NULL,
    died INTEGER NOT NULL DEFAULT 0,
    current_league TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT,
    UNIQUE(account_id, character_name)
);

CREATE INDEX IF NOT EXISTS idx_characters_account ON characters(account_id);

-- Characters polled by the fetch cycle
CREATE TABLE IF NOT EXISTS characters_to_fetch (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    character_id INTEGER NOT NULL UNIQUE REFERENCES characters(id),
    last_fetch TEXT,
    should_skip INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Path of Building exports, one row per distinct build state
CREATE TABLE IF NOT EXISTS pob_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    character_id INTEGER NOT NULL REFERENCES characters(id),
    export_string TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pob_snapshots_character ON pob_snapshots(character_id, id);

-- Public references returned by build-sharing sites
CREATE TABLE IF NOT EXISTS snapshot_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    snapshot_id INTEGER NOT NULL REFERENCES pob_snapshots(id),
    site TEXT NOT NULL,
    url TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snapshot_links_snapshot ON snapshot_links(snapshot_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
