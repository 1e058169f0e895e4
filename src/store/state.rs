//! Plain store state and the event application rules.
//!
//! Both stores apply committed events through [`RunRecord::apply`] and
//! [`StoreState::apply`], so live commits and journal replay produce the same
//! records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::{StoreError, Version};
use crate::persistence::StoreEventPayload;
use crate::types::{
    Character, CharacterId, Claim, Item, ItemId, Member, Participant, Reservation, Run,
    RunId, Roster,
};

/// One run with everything it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run: Run,
    pub participants: Vec<Participant>,
    pub reservations: Vec<Reservation>,
    /// Bumped by every committed change to this run.
    pub version: Version,
}

impl RunRecord {
    /// A freshly created run whose creator is its only participant.
    pub fn created(mut run: Run, participant: Participant, reservations: Vec<Reservation>) -> Self {
        if participant.is_leader {
            run.leader = Some(participant.id.clone());
        }
        RunRecord {
            run,
            participants: vec![participant],
            reservations,
            version: 0,
        }
    }

    /// Applies a join or leave event to this run and bumps the version.
    ///
    /// Events for other runs, creation, deletion and catalog events are
    /// ignored (the caller handles those at the map level).
    pub fn apply(&mut self, payload: &StoreEventPayload) {
        match payload {
            StoreEventPayload::ParticipantJoined {
                participant,
                reservations,
            } if participant.run_id == self.run.id => {
                if participant.is_leader {
                    self.run.leader = Some(participant.id.clone());
                }
                self.participants.push(participant.clone());
                self.reservations.extend(reservations.iter().cloned());
                self.version += 1;
            }

            StoreEventPayload::ParticipantLeft {
                run_id,
                participant_id,
                cleared_leader,
            } if run_id == &self.run.id => {
                let Some(pos) = self
                    .participants
                    .iter()
                    .position(|p| &p.id == participant_id)
                else {
                    trace!(
                        run_id = %run_id,
                        participant_id = %participant_id,
                        "Leave for unknown participant"
                    );
                    return;
                };
                let departed = self.participants.remove(pos);
                self.reservations
                    .retain(|r| r.actor_id != departed.actor_id);
                let led = self.run.leader.as_ref() == Some(&departed.id);
                if led != *cleared_leader {
                    warn!(
                        run_id = %run_id,
                        participant_id = %participant_id,
                        recorded = *cleared_leader,
                        "Leave event disagrees with the recorded leader"
                    );
                }
                if led {
                    self.run.leader = None;
                }
                self.version += 1;
            }

            _ => {}
        }
    }

    /// Resolves participants and reservations against the catalogs.
    pub fn resolve(
        &self,
        characters: &HashMap<CharacterId, Character>,
        items: &HashMap<ItemId, Item>,
    ) -> Result<Roster, StoreError> {
        let members = self
            .participants
            .iter()
            .map(|participant| {
                let character = characters
                    .get(&participant.character_id)
                    .ok_or_else(|| StoreError::DanglingReference {
                        run_id: self.run.id.clone(),
                        what: format!("character {}", participant.character_id),
                    })?;
                Ok(Member {
                    participant: participant.clone(),
                    character: character.clone(),
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let claims = self
            .reservations
            .iter()
            .map(|reservation| {
                let item = items.get(&reservation.item_id).ok_or_else(|| {
                    StoreError::DanglingReference {
                        run_id: self.run.id.clone(),
                        what: format!("item {}", reservation.item_id),
                    }
                })?;
                Ok(Claim {
                    reservation: reservation.clone(),
                    item: item.clone(),
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Roster {
            run: self.run.clone(),
            members,
            claims,
        })
    }
}

/// Everything the store holds, as plain data.
///
/// This is the snapshot body and the target of journal replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    pub runs: HashMap<RunId, RunRecord>,
    pub characters: HashMap<CharacterId, Character>,
    pub items: HashMap<ItemId, Item>,
}

impl StoreState {
    /// Applies a committed event.
    ///
    /// Events whose run no longer exists are skipped, so replaying a journal
    /// over a snapshot that already absorbed part of it is harmless.
    pub fn apply(&mut self, payload: &StoreEventPayload) {
        match payload {
            StoreEventPayload::RunCreated {
                run,
                participant,
                reservations,
            } => {
                self.runs.insert(
                    run.id.clone(),
                    RunRecord::created(run.clone(), participant.clone(), reservations.clone()),
                );
            }

            StoreEventPayload::RunDeleted { run_id } => {
                self.runs.remove(run_id);
            }

            StoreEventPayload::ParticipantJoined { .. }
            | StoreEventPayload::ParticipantLeft { .. } => {
                match payload.run_id().and_then(|id| self.runs.get_mut(id)) {
                    Some(record) => record.apply(payload),
                    None => trace!(kind = payload.kind(), "Event for unknown run skipped"),
                }
            }

            StoreEventPayload::CharacterRegistered { character } => {
                self.characters
                    .insert(character.id.clone(), character.clone());
            }

            StoreEventPayload::ItemRegistered { item } => {
                self.items.insert(item.id.clone(), item.clone());
            }
        }
    }

    /// Resolves one run into a roster.
    pub fn roster(&self, run_id: &RunId) -> Result<Option<Roster>, StoreError> {
        self.runs
            .get(run_id)
            .map(|record| record.resolve(&self.characters, &self.items))
            .transpose()
    }
}
