//! Read models returned to callers of the engine.
//!
//! These are the shapes the JSON API returns: runs with their
//! participants (including the character) and reservations (including the
//! item).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::{Character, Item};
use super::ids::{ActorId, ParticipantId, ReservationId, RunId};
use super::roster::{Claim, Member, Role, Roster};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub actor_id: ActorId,
    pub character: Character,
    pub role: Role,
    pub is_leader: bool,
    pub joined_at: DateTime<Utc>,
}

impl From<&Member> for ParticipantView {
    fn from(member: &Member) -> Self {
        ParticipantView {
            id: member.participant.id.clone(),
            actor_id: member.participant.actor_id.clone(),
            character: member.character.clone(),
            role: member.participant.role,
            is_leader: member.participant.is_leader,
            joined_at: member.participant.joined_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationView {
    pub id: ReservationId,
    pub actor_id: ActorId,
    pub item: Item,
}

impl From<&Claim> for ReservationView {
    fn from(claim: &Claim) -> Self {
        ReservationView {
            id: claim.reservation.id.clone(),
            actor_id: claim.reservation.actor_id.clone(),
            item: claim.item.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunView {
    pub id: RunId,
    pub activity: String,
    pub scheduled_at: DateTime<Utc>,
    pub leader_id: Option<ParticipantId>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<ParticipantView>,
    pub reservations: Vec<ReservationView>,
}

impl From<&Roster> for RunView {
    fn from(roster: &Roster) -> Self {
        RunView {
            id: roster.run.id.clone(),
            activity: roster.run.activity.clone(),
            scheduled_at: roster.run.scheduled_at,
            leader_id: roster.run.leader.clone(),
            created_by: roster.run.created_by.clone(),
            created_at: roster.run.created_at,
            participants: roster.members.iter().map(ParticipantView::from).collect(),
            reservations: roster.claims.iter().map(ReservationView::from).collect(),
        }
    }
}

/// The result of a successful join: the new seat and the reservations that
/// came with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOutcome {
    pub participant: ParticipantView,
    pub reservations: Vec<ReservationView>,
}
