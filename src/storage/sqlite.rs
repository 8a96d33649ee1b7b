//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{AccountRecord, CharacterRecord, SnapshotLink, SnapshotRecord, TrackedCharacter};
use crate::TrackerError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const SNAPSHOT_COLUMNS: &str = "id, character_id, export_string, created_at, updated_at";

const CHARACTER_COLUMNS: &str =
    "id, account_id, character_name, died, current_league, created_at, updated_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> Result<Self, TrackerError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, TrackerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRecord> {
    Ok(SnapshotRecord {
        id: row.get(0)?,
        character_id: row.get(1)?,
        export_string: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn character_from_row(row: &Row<'_>) -> rusqlite::Result<CharacterRecord> {
    Ok(CharacterRecord {
        id: row.get(0)?,
        account_id: row.get(1)?,
        character_name: row.get(2)?,
        died: row.get(3)?,
        current_league: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<AccountRecord> {
    Ok(AccountRecord {
        id: row.get(0)?,
        account_name: row.get(1)?,
        player: row.get(2)?,
        created_at: row.get(3)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Accounts =====

    fn create_account(&mut self, account_name: &str, player: Option<&str>) -> StorageResult<i64> {
        let now = now();
        self.conn.execute(
            "INSERT INTO accounts (account_name, player, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![account_name, player, now, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_account(&self, account_id: i64) -> StorageResult<AccountRecord> {
        self.conn
            .query_row(
                "SELECT id, account_name, player, created_at FROM accounts WHERE id = ?1",
                params![account_id],
                account_from_row,
            )
            .optional()?
            .ok_or(StorageError::AccountNotFound(account_id))
    }

    fn find_account_by_name(&self, account_name: &str) -> StorageResult<Option<AccountRecord>> {
        let account = self
            .conn
            .query_row(
                "SELECT id, account_name, player, created_at FROM accounts
                 WHERE account_name = ?1 AND deleted_at IS NULL",
                params![account_name],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    // ===== Characters =====

    fn create_character(
        &mut self,
        account_id: i64,
        character_name: &str,
        league: Option<&str>,
    ) -> StorageResult<i64> {
        let now = now();
        self.conn.execute(
            "INSERT INTO characters (account_id, character_name, current_league, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![account_id, character_name, league, now, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_character(&self, character_id: i64) -> StorageResult<CharacterRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM characters WHERE id = ?1", CHARACTER_COLUMNS),
                params![character_id],
                character_from_row,
            )
            .optional()?
            .ok_or(StorageError::CharacterNotFound(character_id))
    }

    fn find_character(
        &self,
        account_id: i64,
        character_name: &str,
    ) -> StorageResult<Option<CharacterRecord>> {
        let character = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM characters
                     WHERE account_id = ?1 AND character_name = ?2 AND deleted_at IS NULL",
                    CHARACTER_COLUMNS
                ),
                params![account_id, character_name],
                character_from_row,
            )
            .optional()?;
        Ok(character)
    }

    fn update_died_status(&mut self, character_id: i64, died: bool) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE characters SET died = ?1, updated_at = ?2 WHERE id = ?3",
            params![died, now(), character_id],
        )?;
        if updated == 0 {
            return Err(StorageError::CharacterNotFound(character_id));
        }
        Ok(())
    }

    // ===== Tracking =====

    fn track_character(&mut self, character_id: i64) -> StorageResult<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM characters_to_fetch WHERE character_id = ?1",
                params![character_id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let now = now();
        self.conn.execute(
            "INSERT INTO characters_to_fetch (character_id, created_at, updated_at) VALUES (?1, ?2, ?3)",
            params![character_id, now, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_tracked_characters(&self) -> StorageResult<Vec<TrackedCharacter>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, character_id, last_fetch, should_skip FROM characters_to_fetch ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(TrackedCharacter {
                id: row.get(0)?,
                character_id: row.get(1)?,
                last_fetch: row.get(2)?,
                should_skip: row.get(3)?,
            })
        })?;

        let mut tracked = Vec::new();
        for row in rows {
            tracked.push(row?);
        }
        Ok(tracked)
    }

    fn mark_should_skip(&mut self, tracked_id: i64, should_skip: bool) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE characters_to_fetch SET should_skip = ?1, updated_at = ?2 WHERE id = ?3",
            params![should_skip, now(), tracked_id],
        )?;
        if updated == 0 {
            return Err(StorageError::TrackedNotFound(tracked_id));
        }
        Ok(())
    }

    fn record_fetch(&mut self, tracked_id: i64, at: DateTime<Utc>) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE characters_to_fetch SET last_fetch = ?1, updated_at = ?2 WHERE id = ?3",
            params![at.to_rfc3339(), now(), tracked_id],
        )?;
        if updated == 0 {
            return Err(StorageError::TrackedNotFound(tracked_id));
        }
        Ok(())
    }

    // ===== Snapshots =====

    fn get_latest_snapshot(&self, character_id: i64) -> StorageResult<Option<SnapshotRecord>> {
        // Row IDs increase with insertion order
        let snapshot = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM pob_snapshots WHERE character_id = ?1
                     ORDER BY id DESC LIMIT 1",
                    SNAPSHOT_COLUMNS
                ),
                params![character_id],
                snapshot_from_row,
            )
            .optional()?;
        Ok(snapshot)
    }

    fn create_snapshot(
        &mut self,
        character_id: i64,
        export_string: &str,
    ) -> StorageResult<SnapshotRecord> {
        let now = now();
        self.conn.execute(
            "INSERT INTO pob_snapshots (character_id, export_string, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![character_id, export_string, now, now],
        )?;

        Ok(SnapshotRecord {
            id: self.conn.last_insert_rowid(),
            character_id,
            export_string: export_string.to_string(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    fn list_snapshots(&self, character_id: i64) -> StorageResult<Vec<SnapshotRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pob_snapshots WHERE character_id = ?1 ORDER BY id ASC",
            SNAPSHOT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![character_id], snapshot_from_row)?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?);
        }
        Ok(snapshots)
    }

    fn count_snapshots(&self, character_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pob_snapshots WHERE character_id = ?1",
            params![character_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn record_snapshot_link(
        &mut self,
        snapshot_id: i64,
        site: &str,
        url: &str,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO snapshot_links (snapshot_id, site, url, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![snapshot_id, site, url, now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_snapshot_links(&self, snapshot_id: i64) -> StorageResult<Vec<SnapshotLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, snapshot_id, site, url, created_at FROM snapshot_links
             WHERE snapshot_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![snapshot_id], |row| {
            Ok(SnapshotLink {
                id: row.get(0)?,
                snapshot_id: row.get(1)?,
                site: row.get(2)?,
                url: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut links = Vec::new();
        for row in rows {
            links.push(row?);
        }
        Ok(links)
    }
}
