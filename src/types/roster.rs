//! Run, participant and reservation records, and the resolved roster view the
//! validators operate on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::catalog::{Character, CharacterClass, Item};
use super::ids::{ActorId, CharacterId, ItemId, ParticipantId, ReservationId, RunId};

/// Maximum number of carrier participants in one run.
pub const MAX_CARRIERS: usize = 5;

/// Maximum number of boosted participants in one run.
pub const MAX_BOOSTED: usize = 6;

/// Carrier count at which the support quota starts to apply.
pub const SUPPORT_QUOTA_THRESHOLD: usize = 3;

/// Support-class carriers required before non-support carriers may join past
/// the threshold.
pub const MIN_SUPPORT_CARRIERS: usize = 2;

/// A participant's role in a run. Immutable once the participant is seated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Does the carrying. Counts toward the support quota.
    Carrier,
    /// Gets carried. The only role allowed to reserve items.
    Boosted,
}

impl Role {
    /// Seat ceiling for this role.
    pub fn capacity(&self) -> usize {
        match self {
            Role::Carrier => MAX_CARRIERS,
            Role::Boosted => MAX_BOOSTED,
        }
    }

    pub fn is_carrier(&self) -> bool {
        matches!(self, Role::Carrier)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Carrier => "carrier",
            Role::Boosted => "boosted",
        }
    }

    /// Human-readable plural used in rejection messages.
    pub fn plural(&self) -> &'static str {
        match self {
            Role::Carrier => "carriers",
            Role::Boosted => "boosted players",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role name is neither `carrier` nor `boosted`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "carrier" => Ok(Role::Carrier),
            "boosted" => Ok(Role::Boosted),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// One scheduled activity instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: RunId,
    pub activity: String,
    pub scheduled_at: DateTime<Utc>,
    /// The leading participant, if any. Always a current carrier.
    pub leader: Option<ParticipantId>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
}

impl Run {
    pub fn new(
        activity: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        created_by: ActorId,
    ) -> Self {
        Run {
            id: RunId::generate(),
            activity: activity.into(),
            scheduled_at,
            leader: None,
            created_by,
            created_at: Utc::now(),
        }
    }
}

/// One actor's membership in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub run_id: RunId,
    pub actor_id: ActorId,
    pub character_id: CharacterId,
    pub role: Role,
    pub is_leader: bool,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(
        run_id: RunId,
        actor_id: ActorId,
        character_id: CharacterId,
        role: Role,
        is_leader: bool,
    ) -> Self {
        Participant {
            id: ParticipantId::generate(),
            run_id,
            actor_id,
            character_id,
            role,
            is_leader,
            joined_at: Utc::now(),
        }
    }
}

/// An actor's claim on an item within one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: ReservationId,
    pub run_id: RunId,
    pub item_id: ItemId,
    pub actor_id: ActorId,
}

impl Reservation {
    pub fn new(run_id: RunId, item_id: ItemId, actor_id: ActorId) -> Self {
        Reservation {
            id: ReservationId::generate(),
            run_id,
            item_id,
            actor_id,
        }
    }
}

/// A participant together with the character it brought.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub participant: Participant,
    pub character: Character,
}

impl Member {
    pub fn role(&self) -> Role {
        self.participant.role
    }

    pub fn class(&self) -> CharacterClass {
        self.character.class
    }

    pub fn is_leader(&self) -> bool {
        self.participant.is_leader
    }
}

/// A reservation together with the item it claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub reservation: Reservation,
    pub item: Item,
}

/// A resolved snapshot of one run's membership and reservations.
///
/// Members and claims keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    pub run: Run,
    pub members: Vec<Member>,
    pub claims: Vec<Claim>,
}

impl Roster {
    /// Returns the member seated for `actor`, if any.
    pub fn member(&self, actor: &ActorId) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| &m.participant.actor_id == actor)
    }

    /// Number of members holding `role`.
    pub fn count(&self, role: Role) -> usize {
        count_role(&self.members, role)
    }

    /// Returns the claims owned by `actor`.
    pub fn claims_of<'a>(&'a self, actor: &'a ActorId) -> impl Iterator<Item = &'a Claim> + 'a {
        self.claims
            .iter()
            .filter(move |c| &c.reservation.actor_id == actor)
    }
}

/// Number of members in `members` holding `role`.
pub fn count_role(members: &[Member], role: Role) -> usize {
    members.iter().filter(|m| m.role() == role).count()
}
