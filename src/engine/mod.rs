//! The roster allocation engine.
//!
//! Every mutating operation follows the same shape: read a versioned roster
//! snapshot, run the pure validators against it, and submit exactly one
//! [`RosterChange`] conditioned on the snapshot's version. A rejection writes
//! nothing. A version conflict discards the decision and the operation is
//! run again from a fresh snapshot (see [`retry`]).

mod catalog;
pub mod error;
pub mod retry;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::roster::{JoinProposal, check_reservations, validate_join};
use crate::store::{RosterChange, RunStore};
use crate::types::{
    ActorId, Character, CharacterId, Claim, Item, ItemId, JoinOutcome, Member, Participant,
    ParticipantView, Reservation, ReservationView, Role, Roster, Run, RunId, RunView,
    ScheduleWindow,
};

pub use error::{EngineError, ErrorKind};
pub use retry::{RetryConfig, retry_on_conflict};

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Default activity label for new runs.
pub const DEFAULT_ACTIVITY: &str = "Upper Blackrock Spire";

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Label given to every run this engine creates.
    pub activity: String,
    pub retry: RetryConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            activity: DEFAULT_ACTIVITY.to_string(),
            retry: RetryConfig::DEFAULT,
        }
    }
}

/// A seat someone is asking for, with the items they want to reserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub character_id: CharacterId,
    pub role: Role,
    pub is_leader: bool,
    pub item_ids: Vec<ItemId>,
}

/// A join that passed validation, ready to commit.
struct Admission {
    participant: Participant,
    character: Character,
    reservations: Vec<Reservation>,
    items: Vec<Item>,
}

impl Admission {
    fn member(&self) -> Member {
        Member {
            participant: self.participant.clone(),
            character: self.character.clone(),
        }
    }

    fn claims(&self) -> Vec<Claim> {
        self.reservations
            .iter()
            .cloned()
            .zip(self.items.iter().cloned())
            .map(|(reservation, item)| Claim { reservation, item })
            .collect()
    }
}

pub struct RosterEngine {
    store: Arc<dyn RunStore>,
    settings: EngineSettings,
}

impl RosterEngine {
    pub fn new(store: Arc<dyn RunStore>, settings: EngineSettings) -> Self {
        RosterEngine { store, settings }
    }

    /// Creates a run with `actor` as its first participant.
    ///
    /// The creator's seat is validated exactly like a join against an empty
    /// roster. The run, the seat and its reservations are committed together.
    #[instrument(skip(self, request), fields(actor = %actor, role = %request.role))]
    pub async fn create_run(
        &self,
        actor: &ActorId,
        scheduled_at: DateTime<Utc>,
        request: JoinRequest,
    ) -> Result<RunView> {
        let mut run = Run::new(self.settings.activity.clone(), scheduled_at, actor.clone());
        let admission = self.admit(&run.id, &[], actor, &request).await?;
        if admission.participant.is_leader {
            run.leader = Some(admission.participant.id.clone());
        }

        let roster = Roster {
            run: run.clone(),
            members: vec![admission.member()],
            claims: admission.claims(),
        };
        self.store
            .commit(RosterChange::CreateRun {
                run,
                participant: admission.participant,
                reservations: admission.reservations,
            })
            .await?;

        info!(run_id = %roster.run.id, scheduled_at = %scheduled_at, "Run created");
        Ok(RunView::from(&roster))
    }

    /// Seats `actor` in a run.
    #[instrument(
        skip(self, request),
        fields(run_id = %run_id, actor = %actor, role = %request.role)
    )]
    pub async fn join_run(
        &self,
        run_id: &RunId,
        actor: &ActorId,
        request: JoinRequest,
    ) -> Result<JoinOutcome> {
        retry_on_conflict(&self.settings.retry, "join_run", || {
            self.try_join(run_id, actor, &request)
        })
        .await
    }

    async fn try_join(
        &self,
        run_id: &RunId,
        actor: &ActorId,
        request: &JoinRequest,
    ) -> Result<JoinOutcome> {
        let current = self
            .store
            .load_roster(run_id)
            .await?
            .ok_or_else(|| EngineError::RunNotFound(run_id.clone()))?;

        let admission = self
            .admit(run_id, &current.roster.members, actor, request)
            .await?;
        let outcome = JoinOutcome {
            participant: ParticipantView::from(&admission.member()),
            reservations: admission.claims().iter().map(ReservationView::from).collect(),
        };

        let version = self
            .store
            .commit(RosterChange::Join {
                expected: current.version,
                participant: admission.participant,
                reservations: admission.reservations,
            })
            .await?;

        info!(
            participant_id = %outcome.participant.id,
            is_leader = outcome.participant.is_leader,
            reservations = outcome.reservations.len(),
            version,
            "Participant joined"
        );
        Ok(outcome)
    }

    /// Looks up the character and the items, then runs both validators.
    async fn admit(
        &self,
        run_id: &RunId,
        members: &[Member],
        actor: &ActorId,
        request: &JoinRequest,
    ) -> Result<Admission> {
        let character = self.owned_character(actor, &request.character_id).await?;

        validate_join(
            members,
            &JoinProposal {
                actor,
                role: request.role,
                is_leader: request.is_leader,
                class: character.class,
            },
        )?;

        let catalog = if request.item_ids.is_empty() {
            Default::default()
        } else {
            self.store.find_items(&request.item_ids).await?
        };
        let items = check_reservations(request.role, &request.item_ids, &catalog)?;

        let participant = Participant::new(
            run_id.clone(),
            actor.clone(),
            character.id.clone(),
            request.role,
            request.is_leader,
        );
        let reservations = items
            .iter()
            .map(|item| Reservation::new(run_id.clone(), item.id.clone(), actor.clone()))
            .collect();

        Ok(Admission {
            participant,
            character,
            reservations,
            items,
        })
    }

    async fn owned_character(&self, actor: &ActorId, id: &CharacterId) -> Result<Character> {
        self.store
            .character(id)
            .await?
            .filter(|c| c.is_owned_by(actor))
            .ok_or(EngineError::CharacterNotFound)
    }

    /// Removes `actor` from a run together with their reservations. Clears
    /// the leader field if they led; nobody is promoted.
    #[instrument(skip(self), fields(run_id = %run_id, actor = %actor))]
    pub async fn leave_run(&self, run_id: &RunId, actor: &ActorId) -> Result<()> {
        retry_on_conflict(&self.settings.retry, "leave_run", || {
            self.try_leave(run_id, actor)
        })
        .await
    }

    async fn try_leave(&self, run_id: &RunId, actor: &ActorId) -> Result<()> {
        let current = self
            .store
            .load_roster(run_id)
            .await?
            .ok_or_else(|| EngineError::RunNotFound(run_id.clone()))?;
        let member = current
            .roster
            .member(actor)
            .ok_or(EngineError::NotAMember)?;
        let released = current.roster.claims_of(actor).count();
        let was_leader = member.is_leader();

        self.store
            .commit(RosterChange::Leave {
                run_id: run_id.clone(),
                expected: current.version,
                participant_id: member.participant.id.clone(),
            })
            .await?;

        info!(released, was_leader, "Participant left");
        Ok(())
    }

    /// Deletes a run and everything it owns. Only its creator may do this.
    #[instrument(skip(self), fields(run_id = %run_id, actor = %actor))]
    pub async fn delete_run(&self, run_id: &RunId, actor: &ActorId) -> Result<()> {
        retry_on_conflict(&self.settings.retry, "delete_run", || {
            self.try_delete(run_id, actor)
        })
        .await
    }

    async fn try_delete(&self, run_id: &RunId, actor: &ActorId) -> Result<()> {
        let current = self
            .store
            .load_roster(run_id)
            .await?
            .ok_or_else(|| EngineError::RunNotFound(run_id.clone()))?;
        if &current.roster.run.created_by != actor {
            return Err(EngineError::NotRunCreator);
        }

        self.store
            .commit(RosterChange::Delete {
                run_id: run_id.clone(),
                expected: current.version,
            })
            .await?;

        info!(
            participants = current.roster.members.len(),
            reservations = current.roster.claims.len(),
            "Run deleted"
        );
        Ok(())
    }

    pub async fn get_run(&self, run_id: &RunId) -> Result<RunView> {
        let current = self
            .store
            .load_roster(run_id)
            .await?
            .ok_or_else(|| EngineError::RunNotFound(run_id.clone()))?;
        Ok(RunView::from(&current.roster))
    }

    /// Lists runs by schedule ascending. With a date, only runs scheduled in
    /// that date's calendar month (UTC) are returned.
    pub async fn list_runs(&self, month_of: Option<DateTime<Utc>>) -> Result<Vec<RunView>> {
        let window = month_of.map(ScheduleWindow::month_containing);
        let rosters = self.store.list_rosters(window).await?;
        debug!(count = rosters.len(), filtered = window.is_some(), "Listed runs");
        Ok(rosters.iter().map(RunView::from).collect())
    }
}
