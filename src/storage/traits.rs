//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{AccountRecord, CharacterRecord, SnapshotLink, SnapshotRecord, TrackedCharacter};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    #[error("Character not found: {0}")]
    CharacterNotFound(i64),

    #[error("Tracked character not found: {0}")]
    TrackedNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// True for lookups of rows that do not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::AccountNotFound(_) | Self::CharacterNotFound(_) | Self::TrackedNotFound(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Snapshots are append-only: there is no operation that modifies or deletes one.
pub trait Storage {
    // ===== Accounts =====

    /// Creates an account, returning its ID
    fn create_account(&mut self, account_name: &str, player: Option<&str>) -> StorageResult<i64>;

    /// Gets an account by ID
    fn get_account(&self, account_id: i64) -> StorageResult<AccountRecord>;

    /// Gets an account by its game-site name
    fn find_account_by_name(&self, account_name: &str) -> StorageResult<Option<AccountRecord>>;

    // ===== Characters =====

    /// Creates a character under an account, returning its ID
    fn create_character(
        &mut self,
        account_id: i64,
        character_name: &str,
        league: Option<&str>,
    ) -> StorageResult<i64>;

    /// Gets a character by ID
    fn get_character(&self, character_id: i64) -> StorageResult<CharacterRecord>;

    /// Gets a character of an account by name
    fn find_character(
        &self,
        account_id: i64,
        character_name: &str,
    ) -> StorageResult<Option<CharacterRecord>>;

    /// Sets or clears the died flag of a character
    fn update_died_status(&mut self, character_id: i64, died: bool) -> StorageResult<()>;

    // ===== Tracking =====

    /// Registers a character for periodic fetching
    ///
    /// Registering an already tracked character returns the existing row ID.
    fn track_character(&mut self, character_id: i64) -> StorageResult<i64>;

    /// Lists every tracked character, skipped ones included, in ID order
    fn list_tracked_characters(&self) -> StorageResult<Vec<TrackedCharacter>>;

    /// Sets or clears the skip flag of a tracked row
    fn mark_should_skip(&mut self, tracked_id: i64, should_skip: bool) -> StorageResult<()>;

    /// Records a successful fetch of a tracked row
    fn record_fetch(&mut self, tracked_id: i64, at: DateTime<Utc>) -> StorageResult<()>;

    // ===== Snapshots =====

    /// Gets the most recent snapshot of a character, if any
    fn get_latest_snapshot(&self, character_id: i64) -> StorageResult<Option<SnapshotRecord>>;

    /// Persists a new snapshot
    fn create_snapshot(
        &mut self,
        character_id: i64,
        export_string: &str,
    ) -> StorageResult<SnapshotRecord>;

    /// Lists all snapshots of a character, oldest first
    fn list_snapshots(&self, character_id: i64) -> StorageResult<Vec<SnapshotRecord>>;

    /// Counts the snapshots of a character
    fn count_snapshots(&self, character_id: i64) -> StorageResult<u64>;

    /// Records the public reference a sharing site returned for a snapshot
    fn record_snapshot_link(&mut self, snapshot_id: i64, site: &str, url: &str)
        -> StorageResult<i64>;

    /// Lists the public references of a snapshot
    fn list_snapshot_links(&self, snapshot_id: i64) -> StorageResult<Vec<SnapshotLink>>;
}
