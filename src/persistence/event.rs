//! Event types for the store journal.
//!
//! Every committed change to the store is appended to the journal as one
//! event in JSON Lines format. Each event has a monotonic sequence number and
//! timestamp. Replaying the events in order over the last snapshot rebuilds
//! the store exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Character, Item, Participant, ParticipantId, Reservation, Run, RunId};

/// An event in the journal.
///
/// The payload is flattened into the event object.
///
/// Example JSON:
/// ```json
/// {"seq":4,"ts":"2024-01-15T10:00:00Z","type":"participant_left","run_id":"9f2c...","participant_id":"71ab...","cleared_leader":false}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEvent {
    /// Monotonic sequence number, global across all runs.
    pub seq: u64,

    /// When the event was appended (UTC).
    pub ts: DateTime<Utc>,

    #[serde(flatten)]
    pub payload: StoreEventPayload,
}

impl StoreEvent {
    pub fn new(seq: u64, payload: StoreEventPayload) -> Self {
        StoreEvent {
            seq,
            ts: Utc::now(),
            payload,
        }
    }
}

/// Journal payloads.
///
/// Roster events each describe one whole transaction: a run event never
/// needs a companion event to be consistent on replay.
///
/// Serialized with internal tagging: `{"type": "run_created", "run": {...}, ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEventPayload {
    // ─── Roster transactions ───
    /// A run was created together with its first participant.
    RunCreated {
        run: Run,
        participant: Participant,
        reservations: Vec<Reservation>,
    },

    /// A participant joined, with its reservations.
    ParticipantJoined {
        participant: Participant,
        reservations: Vec<Reservation>,
    },

    /// A participant left. Their reservations in the run go with them.
    ParticipantLeft {
        run_id: RunId,
        participant_id: ParticipantId,
        /// Whether the run's leader field was cleared.
        cleared_leader: bool,
    },

    /// A run was deleted, cascading to its participants and reservations.
    RunDeleted { run_id: RunId },

    // ─── Catalog ───
    CharacterRegistered { character: Character },

    ItemRegistered { item: Item },
}

impl StoreEventPayload {
    /// The run this event belongs to, for roster events.
    pub fn run_id(&self) -> Option<&RunId> {
        match self {
            StoreEventPayload::RunCreated { run, .. } => Some(&run.id),
            StoreEventPayload::ParticipantJoined { participant, .. } => Some(&participant.run_id),
            StoreEventPayload::ParticipantLeft { run_id, .. }
            | StoreEventPayload::RunDeleted { run_id } => Some(run_id),
            StoreEventPayload::CharacterRegistered { .. }
            | StoreEventPayload::ItemRegistered { .. } => None,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreEventPayload::RunCreated { .. } => "run_created",
            StoreEventPayload::ParticipantJoined { .. } => "participant_joined",
            StoreEventPayload::ParticipantLeft { .. } => "participant_left",
            StoreEventPayload::RunDeleted { .. } => "run_deleted",
            StoreEventPayload::CharacterRegistered { .. } => "character_registered",
            StoreEventPayload::ItemRegistered { .. } => "item_registered",
        }
    }
}
