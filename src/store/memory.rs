//! In-memory run store.
//!
//! Each run sits behind its own mutex: commits to one run serialize, commits
//! to different runs proceed independently. The run map itself is only
//! locked long enough to look up or insert a slot.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::trace;

use super::state::{RunRecord, StoreState};
use super::{RosterChange, RunStore, StoreError, Version, VersionedRoster};
use crate::persistence::StoreEventPayload;
use crate::types::{
    ActorId, Character, CharacterId, Item, ItemId, Roster, RunId, ScheduleWindow,
};

/// Where committed events go before they are applied in memory.
///
/// Returning an error aborts the commit with nothing applied.
#[async_trait]
pub(crate) trait Journal: Send + Sync {
    async fn record(&self, payload: &StoreEventPayload) -> Result<(), StoreError>;
}

/// Journal for the purely in-memory store: records nothing.
pub(crate) struct Ephemeral;

#[async_trait]
impl Journal for Ephemeral {
    async fn record(&self, _payload: &StoreEventPayload) -> Result<(), StoreError> {
        Ok(())
    }
}

/// `None` once the run has been deleted.
type RunSlot = Arc<Mutex<Option<RunRecord>>>;

#[derive(Default)]
pub struct MemoryRunStore {
    runs: RwLock<HashMap<RunId, RunSlot>>,
    characters: RwLock<HashMap<CharacterId, Character>>,
    items: RwLock<HashMap<ItemId, Item>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        let runs = state
            .runs
            .into_iter()
            .map(|(id, record)| (id, Arc::new(Mutex::new(Some(record)))))
            .collect();
        MemoryRunStore {
            runs: RwLock::new(runs),
            characters: RwLock::new(state.characters),
            items: RwLock::new(state.items),
        }
    }

    /// Copies the whole store out as plain data.
    pub async fn export_state(&self) -> StoreState {
        let mut state = StoreState {
            characters: self.characters.read().await.clone(),
            items: self.items.read().await.clone(),
            ..StoreState::default()
        };
        for slot in self.slots().await {
            if let Some(record) = slot.lock().await.as_ref() {
                state.runs.insert(record.run.id.clone(), record.clone());
            }
        }
        state
    }

    async fn slot(&self, run_id: &RunId) -> Option<RunSlot> {
        self.runs.read().await.get(run_id).cloned()
    }

    async fn slots(&self) -> Vec<RunSlot> {
        self.runs.read().await.values().cloned().collect()
    }

    /// Every character and item a change refers to must exist.
    async fn check_references(&self, change: &RosterChange) -> Result<(), StoreError> {
        let (participant, reservations) = match change {
            RosterChange::CreateRun {
                participant,
                reservations,
                ..
            }
            | RosterChange::Join {
                participant,
                reservations,
                ..
            } => (participant, reservations),
            RosterChange::Leave { .. } | RosterChange::Delete { .. } => return Ok(()),
        };

        if !self
            .characters
            .read()
            .await
            .contains_key(&participant.character_id)
        {
            return Err(StoreError::DanglingReference {
                run_id: participant.run_id.clone(),
                what: format!("character {}", participant.character_id),
            });
        }

        let items = self.items.read().await;
        if let Some(missing) = reservations.iter().find(|r| !items.contains_key(&r.item_id)) {
            return Err(StoreError::DanglingReference {
                run_id: participant.run_id.clone(),
                what: format!("item {}", missing.item_id),
            });
        }
        Ok(())
    }

    /// Commits `change`, recording it in `journal` before applying it.
    pub(crate) async fn commit_with<J: Journal + ?Sized>(
        &self,
        change: RosterChange,
        journal: &J,
    ) -> Result<Version, StoreError> {
        self.check_references(&change).await?;

        if let RosterChange::CreateRun {
            run,
            participant,
            reservations,
        } = change
        {
            // The new slot is claimed before it becomes visible, so the map
            // lock is released before the journal write.
            let run_id = run.id.clone();
            let slot: RunSlot = Arc::new(Mutex::new(None));
            let mut guard = Arc::clone(&slot).lock_owned().await;
            {
                let mut runs = self.runs.write().await;
                if runs.contains_key(&run_id) {
                    return Err(StoreError::Duplicate(format!("run {run_id}")));
                }
                runs.insert(run_id.clone(), slot);
            }

            let record = RunRecord::created(run.clone(), participant.clone(), reservations.clone());
            let payload = StoreEventPayload::RunCreated {
                run,
                participant,
                reservations,
            };
            if let Err(e) = journal.record(&payload).await {
                drop(guard);
                self.runs.write().await.remove(&run_id);
                return Err(e);
            }
            let version = record.version;
            *guard = Some(record);
            return Ok(version);
        }

        let run_id = change.run_id().clone();
        let slot = self
            .slot(&run_id)
            .await
            .ok_or_else(|| StoreError::RunNotFound(run_id.clone()))?;
        let mut guard = slot.lock().await;
        let Some(record) = guard.as_mut() else {
            return Err(StoreError::RunNotFound(run_id));
        };

        let expected = change.expected().unwrap_or_default();
        if record.version != expected {
            trace!(run_id = %run_id, expected, found = record.version, "Stale commit");
            return Err(StoreError::Conflict {
                run_id,
                expected,
                found: record.version,
            });
        }

        let deleting = matches!(change, RosterChange::Delete { .. });
        let payload = change.into_payload(Some(&*record));
        journal.record(&payload).await?;

        if deleting {
            let version = record.version + 1;
            *guard = None;
            drop(guard);
            self.runs.write().await.remove(&run_id);
            return Ok(version);
        }

        record.apply(&payload);
        Ok(record.version)
    }

    pub(crate) async fn register_character_with<J: Journal + ?Sized>(
        &self,
        character: Character,
        journal: &J,
    ) -> Result<(), StoreError> {
        let mut characters = self.characters.write().await;
        if characters.contains_key(&character.id) {
            return Err(StoreError::Duplicate(format!("character {}", character.id)));
        }
        let payload = StoreEventPayload::CharacterRegistered { character };
        journal.record(&payload).await?;
        if let StoreEventPayload::CharacterRegistered { character } = payload {
            characters.insert(character.id.clone(), character);
        }
        Ok(())
    }

    pub(crate) async fn register_item_with<J: Journal + ?Sized>(
        &self,
        item: Item,
        journal: &J,
    ) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        if items.contains_key(&item.id) {
            return Err(StoreError::Duplicate(format!("item {}", item.id)));
        }
        let payload = StoreEventPayload::ItemRegistered { item };
        journal.record(&payload).await?;
        if let StoreEventPayload::ItemRegistered { item } = payload {
            items.insert(item.id.clone(), item);
        }
        Ok(())
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn load_roster(&self, run_id: &RunId) -> Result<Option<VersionedRoster>, StoreError> {
        let Some(slot) = self.slot(run_id).await else {
            return Ok(None);
        };
        let guard = slot.lock().await;
        let Some(record) = guard.as_ref() else {
            return Ok(None);
        };

        let characters = self.characters.read().await;
        let items = self.items.read().await;
        let roster = record.resolve(&characters, &items)?;
        Ok(Some(VersionedRoster {
            roster,
            version: record.version,
        }))
    }

    async fn list_rosters(
        &self,
        window: Option<ScheduleWindow>,
    ) -> Result<Vec<Roster>, StoreError> {
        let mut rosters = Vec::new();
        for slot in self.slots().await {
            let guard = slot.lock().await;
            let Some(record) = guard.as_ref() else {
                continue;
            };
            if window.is_some_and(|w| !w.contains(record.run.scheduled_at)) {
                continue;
            }
            let characters = self.characters.read().await;
            let items = self.items.read().await;
            rosters.push(record.resolve(&characters, &items)?);
        }

        rosters.sort_by(|a, b| {
            (a.run.scheduled_at, a.run.created_at, &a.run.id)
                .cmp(&(b.run.scheduled_at, b.run.created_at, &b.run.id))
        });
        Ok(rosters)
    }

    async fn commit(&self, change: RosterChange) -> Result<Version, StoreError> {
        self.commit_with(change, &Ephemeral).await
    }

    async fn character(&self, id: &CharacterId) -> Result<Option<Character>, StoreError> {
        Ok(self.characters.read().await.get(id).cloned())
    }

    async fn characters_of(&self, owner: &ActorId) -> Result<Vec<Character>, StoreError> {
        let mut owned: Vec<Character> = self
            .characters
            .read()
            .await
            .values()
            .filter(|c| c.is_owned_by(owner))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(owned)
    }

    async fn register_character(&self, character: Character) -> Result<(), StoreError> {
        self.register_character_with(character, &Ephemeral).await
    }

    async fn find_items(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, Item>, StoreError> {
        let items = self.items.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| items.get(id).map(|item| (id.clone(), item.clone())))
            .collect())
    }

    async fn items(&self) -> Result<Vec<Item>, StoreError> {
        let mut items: Vec<Item> = self.items.read().await.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn register_item(&self, item: Item) -> Result<(), StoreError> {
        self.register_item_with(item, &Ephemeral).await
    }
}
