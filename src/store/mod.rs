//! Storage for runs and catalogs.
//!
//! The engine talks to storage only through [`RunStore`]: it reads a
//! versioned roster snapshot, decides, and submits one [`RosterChange`] naming
//! the version its decision was based on. The store applies the change
//! atomically if that version is still current and returns
//! [`StoreError::Conflict`] otherwise, writing nothing.

pub mod file;
pub mod memory;
pub mod state;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::persistence::{EventLogError, SnapshotError, StoreEventPayload};
use crate::types::{
    ActorId, Character, CharacterId, Item, ItemId, Participant, ParticipantId, Reservation, Roster,
    Run, RunId, ScheduleWindow,
};

pub use file::FileRunStore;
pub use memory::MemoryRunStore;
pub use state::{RunRecord, StoreState};

/// Per-run version counter.
pub type Version = u64;

/// Errors returned by a [`RunStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run {0} not found")]
    RunNotFound(RunId),

    /// The run changed since the snapshot the change was based on.
    #[error("run {run_id} changed: expected version {expected}, found {found}")]
    Conflict {
        run_id: RunId,
        expected: Version,
        found: Version,
    },

    /// A record names a character or item the store does not hold.
    #[error("run {run_id} references missing {what}")]
    DanglingReference { run_id: RunId, what: String },

    /// An id is already taken.
    #[error("{0} already exists")]
    Duplicate(String),

    #[error("journal error: {0}")]
    Journal(#[from] EventLogError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A thread panicked while holding the journal.
    #[error("journal lock poisoned")]
    Poisoned,

    /// The task running a mutation panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// Whether retrying the whole operation from a fresh snapshot may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// A roster together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedRoster {
    pub roster: Roster,
    pub version: Version,
}

/// One atomic transaction against a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterChange {
    /// Insert a new run with its creator's seat and reservations.
    CreateRun {
        run: Run,
        participant: Participant,
        reservations: Vec<Reservation>,
    },

    /// Seat a participant (and set the leader field if they lead).
    Join {
        expected: Version,
        participant: Participant,
        reservations: Vec<Reservation>,
    },

    /// Remove a participant, their reservations and, if they led, the
    /// leader field.
    Leave {
        run_id: RunId,
        expected: Version,
        participant_id: ParticipantId,
    },

    /// Remove a run and everything it owns.
    Delete { run_id: RunId, expected: Version },
}

impl RosterChange {
    pub fn run_id(&self) -> &RunId {
        match self {
            RosterChange::CreateRun { run, .. } => &run.id,
            RosterChange::Join { participant, .. } => &participant.run_id,
            RosterChange::Leave { run_id, .. } | RosterChange::Delete { run_id, .. } => run_id,
        }
    }

    /// The version this change expects, or `None` for a creation.
    pub fn expected(&self) -> Option<Version> {
        match self {
            RosterChange::CreateRun { .. } => None,
            RosterChange::Join { expected, .. }
            | RosterChange::Leave { expected, .. }
            | RosterChange::Delete { expected, .. } => Some(*expected),
        }
    }

    /// The journal event recording this change against `record`, the run's
    /// current state (`None` for a creation).
    pub(crate) fn into_payload(self, record: Option<&RunRecord>) -> StoreEventPayload {
        match self {
            RosterChange::CreateRun {
                run,
                participant,
                reservations,
            } => StoreEventPayload::RunCreated {
                run,
                participant,
                reservations,
            },
            RosterChange::Join {
                participant,
                reservations,
                ..
            } => StoreEventPayload::ParticipantJoined {
                participant,
                reservations,
            },
            RosterChange::Leave {
                run_id,
                participant_id,
                ..
            } => {
                let cleared_leader = record
                    .is_some_and(|r| r.run.leader.as_ref() == Some(&participant_id));
                StoreEventPayload::ParticipantLeft {
                    run_id,
                    participant_id,
                    cleared_leader,
                }
            }
            RosterChange::Delete { run_id, .. } => StoreEventPayload::RunDeleted { run_id },
        }
    }
}

/// Storage collaborator for the engine and the catalog endpoints.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Reads one run with its current version.
    async fn load_roster(&self, run_id: &RunId) -> Result<Option<VersionedRoster>, StoreError>;

    /// Reads every run, optionally restricted to those scheduled inside
    /// `window`, ordered by schedule ascending.
    async fn list_rosters(&self, window: Option<ScheduleWindow>) -> Result<Vec<Roster>, StoreError>;

    /// Applies one change atomically, returning the run's new version.
    ///
    /// A change whose expected version is stale fails with
    /// [`StoreError::Conflict`] and writes nothing.
    async fn commit(&self, change: RosterChange) -> Result<Version, StoreError>;

    async fn character(&self, id: &CharacterId) -> Result<Option<Character>, StoreError>;

    /// Characters owned by `owner`, newest first.
    async fn characters_of(&self, owner: &ActorId) -> Result<Vec<Character>, StoreError>;

    async fn register_character(&self, character: Character) -> Result<(), StoreError>;

    /// The subset of `ids` present in the item catalog.
    async fn find_items(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, Item>, StoreError>;

    /// The whole item catalog, by name ascending.
    async fn items(&self) -> Result<Vec<Item>, StoreError>;

    async fn register_item(&self, item: Item) -> Result<(), StoreError>;
}
