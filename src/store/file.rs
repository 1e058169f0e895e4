//! Durable run store: an in-memory store fronted by a fsynced journal.
//!
//! Every commit is appended to `events.log` (and synced) before it is applied
//! in memory, so an acknowledged commit survives a crash and a failed append
//! changes nothing. Opening the store loads `snapshot.json`, replays the
//! journal over it, audits the recovered rosters, then folds everything into
//! a fresh snapshot and empties the journal.
//!
//! Journal writes run on the blocking pool. Each mutation runs as its own
//! task, so a caller that stops waiting cannot leave a journaled change
//! unapplied.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::memory::{Journal, MemoryRunStore};
use super::state::StoreState;
use super::{RosterChange, RunStore, StoreError, Version, VersionedRoster};
use crate::persistence::{
    EventLog, PersistedStoreSnapshot, StoreEventPayload, fsync_parent, save_snapshot_atomic,
    try_load_snapshot,
};
use crate::roster::check_roster;
use crate::types::{ActorId, Character, CharacterId, Item, ItemId, Roster, RunId, ScheduleWindow};

pub const SNAPSHOT_FILE: &str = "snapshot.json";
pub const EVENTS_FILE: &str = "events.log";

struct DurableJournal {
    log: Arc<Mutex<EventLog>>,
}

#[async_trait]
impl Journal for DurableJournal {
    async fn record(&self, payload: &StoreEventPayload) -> Result<(), StoreError> {
        let log = Arc::clone(&self.log);
        let owned = payload.clone();
        let event = tokio::task::spawn_blocking(move || {
            let mut log = log.lock().map_err(|_| StoreError::Poisoned)?;
            log.append(owned).map_err(StoreError::from)
        })
        .await??;
        debug!(seq = event.seq, kind = payload.kind(), "Journaled event");
        Ok(())
    }
}

pub struct FileRunStore {
    inner: Arc<MemoryRunStore>,
    journal: Arc<DurableJournal>,
}

impl FileRunStore {
    /// Opens (creating if needed) the store kept in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        fsync_parent(dir)?;

        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let events_path = dir.join(EVENTS_FILE);

        let (mut state, snapshot_seq) = match try_load_snapshot(&snapshot_path)? {
            Some(snapshot) => (snapshot.state, snapshot.next_seq),
            None => (StoreState::default(), 0),
        };

        let replay = EventLog::replay(&events_path)?;
        if replay.truncated_bytes > 0 {
            warn!(
                path = %events_path.display(),
                truncated_bytes = replay.truncated_bytes,
                "Truncated torn journal tail"
            );
        }

        let mut applied = 0usize;
        for event in replay
            .events
            .iter()
            .filter(|event| event.seq >= snapshot_seq)
        {
            state.apply(&event.payload);
            applied += 1;
        }
        let next_seq = replay.next_seq.max(snapshot_seq);

        audit(&state);

        let snapshot = PersistedStoreSnapshot::new(next_seq, state);
        save_snapshot_atomic(&snapshot_path, &snapshot)?;
        let mut log = EventLog::open(&events_path, next_seq)?;
        log.reset()?;

        info!(
            dir = %dir.display(),
            runs = snapshot.state.runs.len(),
            characters = snapshot.state.characters.len(),
            items = snapshot.state.items.len(),
            replayed = applied,
            next_seq,
            "Opened durable store"
        );

        Ok(FileRunStore {
            inner: Arc::new(MemoryRunStore::from_state(snapshot.state)),
            journal: Arc::new(DurableJournal {
                log: Arc::new(Mutex::new(log)),
            }),
        })
    }

    pub async fn export_state(&self) -> StoreState {
        self.inner.export_state().await
    }

    /// Runs a journaled mutation as a task of its own.
    async fn detached<T, F, Fut>(&self, mutation: F) -> Result<T, StoreError>
    where
        F: FnOnce(Arc<MemoryRunStore>, Arc<DurableJournal>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
        T: Send + 'static,
    {
        let task = mutation(Arc::clone(&self.inner), Arc::clone(&self.journal));
        tokio::spawn(task).await?
    }
}

/// Logs every roster invariant the recovered state violates.
fn audit(state: &StoreState) {
    for record in state.runs.values() {
        match record.resolve(&state.characters, &state.items) {
            Ok(roster) => {
                for violation in check_roster(&roster) {
                    warn!(
                        run_id = %record.run.id,
                        %violation,
                        "Recovered roster violates invariant"
                    );
                }
            }
            Err(e) => warn!(run_id = %record.run.id, error = %e, "Recovered run does not resolve"),
        }
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn load_roster(&self, run_id: &RunId) -> Result<Option<VersionedRoster>, StoreError> {
        self.inner.load_roster(run_id).await
    }

    async fn list_rosters(
        &self,
        window: Option<ScheduleWindow>,
    ) -> Result<Vec<Roster>, StoreError> {
        self.inner.list_rosters(window).await
    }

    async fn commit(&self, change: RosterChange) -> Result<Version, StoreError> {
        self.detached(|inner, journal| async move { inner.commit_with(change, &*journal).await })
            .await
    }

    async fn character(&self, id: &CharacterId) -> Result<Option<Character>, StoreError> {
        self.inner.character(id).await
    }

    async fn characters_of(&self, owner: &ActorId) -> Result<Vec<Character>, StoreError> {
        self.inner.characters_of(owner).await
    }

    async fn register_character(&self, character: Character) -> Result<(), StoreError> {
        self.detached(|inner, journal| async move {
            inner.register_character_with(character, &*journal).await
        })
        .await
    }

    async fn find_items(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, Item>, StoreError> {
        self.inner.find_items(ids).await
    }

    async fn items(&self) -> Result<Vec<Item>, StoreError> {
        self.inner.items().await
    }

    async fn register_item(&self, item: Item) -> Result<(), StoreError> {
        self.detached(|inner, journal| async move {
            inner.register_item_with(item, &*journal).await
        })
        .await
    }
}
