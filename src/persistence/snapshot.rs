//! The store snapshot file.
//!
//! `snapshot.json` holds every run, character and item as of journal
//! sequence `next_seq`, so opening the store only has to replay what the
//! journal recorded after that point.
//!
//! Writes go to `snapshot.json.tmp` first. The temp file is synced, renamed
//! over the old snapshot, and the directory is synced, so a crash at any
//! step leaves either the previous snapshot or the new one in place.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fsync::{fsync_file, fsync_parent};
use crate::store::StoreState;

/// Bumped on any incompatible change to [`PersistedStoreSnapshot`].
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Written by a build with a different snapshot layout.
    #[error("unsupported snapshot schema {got} (this build reads {expected})")]
    SchemaMismatch { expected: u32, got: u32 },
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedStoreSnapshot {
    pub schema_version: u32,

    pub snapshot_at: DateTime<Utc>,

    /// Sequence number of the first journal event not contained in this
    /// snapshot. Replay skips every event below it.
    pub next_seq: u64,

    pub state: StoreState,
}

impl PersistedStoreSnapshot {
    pub fn new(next_seq: u64, state: StoreState) -> Self {
        PersistedStoreSnapshot {
            schema_version: SCHEMA_VERSION,
            snapshot_at: Utc::now(),
            next_seq,
            state,
        }
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    fsync_file(&file)
}

/// Replaces the snapshot at `path`, creating its directory if needed.
pub fn save_snapshot_atomic(path: &Path, snapshot: &PersistedStoreSnapshot) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let staged = path.with_extension("json.tmp");
    write_synced(&staged, &serde_json::to_vec_pretty(snapshot)?)?;
    std::fs::rename(&staged, path)?;
    fsync_parent(path)?;
    Ok(())
}

/// Reads and checks the snapshot at `path`. A missing file is an
/// [`SnapshotError::Io`] error; see [`try_load_snapshot`].
pub fn load_snapshot(path: &Path) -> Result<PersistedStoreSnapshot> {
    let snapshot: PersistedStoreSnapshot = serde_json::from_slice(&std::fs::read(path)?)?;
    match snapshot.schema_version {
        SCHEMA_VERSION => Ok(snapshot),
        got => Err(SnapshotError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got,
        }),
    }
}

/// Like [`load_snapshot`], but a store that never wrote a snapshot yields
/// `None`.
pub fn try_load_snapshot(path: &Path) -> Result<Option<PersistedStoreSnapshot>> {
    match load_snapshot(path) {
        Err(SnapshotError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        other => other.map(Some),
    }
}
