//! Storage module for accounts, tracked characters and build snapshots
//!
//! This module handles all database operations for the tracker, including:
//! - SQLite database initialization and schema management
//! - Account and character lookup
//! - Tracking rows with skip and last-fetch metadata
//! - Append-only snapshot history and published links

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::TrackerError;
use std::path::Path;

/// Initializes or opens a storage database
///
/// Missing parent directories of `path` are created.
pub fn open_storage(path: &Path) -> Result<SqliteStorage, TrackerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqliteStorage::new(path)
}

/// Represents an account in the database
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: i64,
    pub account_name: String,
    pub player: Option<String>,
    pub created_at: String,
}

/// Represents a character in the database
#[derive(Debug, Clone)]
pub struct CharacterRecord {
    pub id: i64,
    pub account_id: i64,
    pub character_name: String,
    pub died: bool,
    pub current_league: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A character registered for periodic fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedCharacter {
    pub id: i64,
    pub character_id: i64,
    pub last_fetch: Option<String>,
    pub should_skip: bool,
}

/// A persisted build export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub id: i64,
    pub character_id: i64,
    pub export_string: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A public reference to a snapshot on a sharing site
#[derive(Debug, Clone)]
pub struct SnapshotLink {
    pub id: i64,
    pub snapshot_id: i64,
    pub site: String,
    pub url: String,
    pub created_at: String,
}
