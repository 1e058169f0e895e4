//! Persistence layer for the durable run store.
//!
//! This module provides crash-safe event journaling with replay capability
//! and atomic snapshot files.
//!
//! # File Layout
//!
//! ```text
//! <state_dir>/
//!   snapshot.json   # full store state up to `next_seq`
//!   events.log      # journal of events since the snapshot (JSON Lines)
//! ```
//!
//! # Recovery
//!
//! On startup:
//! 1. Load `snapshot.json` if present
//! 2. Replay `events.log`, skipping events the snapshot already contains
//! 3. Write a fresh snapshot and empty the journal
//!
//! # Crash Safety
//!
//! - Journal: partial writes detected and truncated on replay
//! - Snapshots: written atomically using write-to-temp-then-rename
//! - Compaction: the snapshot's `next_seq` makes a crash between snapshot
//!   write and journal reset harmless
//! - All critical operations use fsync on both files and directories

pub mod event;
pub mod fsync;
pub mod log;
pub mod snapshot;

pub use event::{StoreEvent, StoreEventPayload};
pub use fsync::{fsync_dir, fsync_file, fsync_parent, truncate_durably};
pub use log::{EventLog, EventLogError, Replay};
pub use snapshot::{
    PersistedStoreSnapshot, SCHEMA_VERSION, SnapshotError, load_snapshot, save_snapshot_atomic,
    try_load_snapshot,
};
