//! Snapshot change detection
//!
//! A rendered export is stored only when it differs from the most recent
//! snapshot of the same character. Comparison is exact: two exports that
//! differ in a single byte are different builds.

use crate::storage::{SnapshotRecord, Storage, StorageResult};

/// Result of offering a rendered export to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// The export was new and has been persisted
    Created(SnapshotRecord),

    /// The export matches the latest stored snapshot; nothing was written
    Unchanged,
}

impl SnapshotOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Persists `export` for `character_id` unless it equals the latest snapshot
///
/// # Arguments
///
/// * `storage` - Storage backend holding the snapshot history
/// * `character_id` - Character the export belongs to
/// * `export` - Build export produced by the renderer
///
/// # Returns
///
/// * `Ok(SnapshotOutcome::Created)` - No baseline existed or the export changed
/// * `Ok(SnapshotOutcome::Unchanged)` - Identical to the latest snapshot
/// * `Err(StorageError)` - Reading or writing the history failed
pub fn record_if_changed<S: Storage + ?Sized>(
    storage: &mut S,
    character_id: i64,
    export: &str,
) -> StorageResult<SnapshotOutcome> {
    match storage.get_latest_snapshot(character_id)? {
        Some(latest) if latest.export_string == export => {
            tracing::info!("No changes detected for character {}", character_id);
            return Ok(SnapshotOutcome::Unchanged);
        }
        Some(latest) => {
            tracing::debug!(
                "Export differs from snapshot {} of character {}",
                latest.id,
                character_id
            );
        }
        None => {
            tracing::warn!("No baseline snapshot for character {}", character_id);
        }
    }

    let snapshot = storage.create_snapshot(character_id, export)?;
    tracing::info!(
        "Stored snapshot {} for character {}",
        snapshot.id,
        character_id
    );
    Ok(SnapshotOutcome::Created(snapshot))
}
