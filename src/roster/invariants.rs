//! Whole-roster invariant checks.
//!
//! The validators keep these true one join at a time; this module checks a
//! complete roster after the fact. The durable store runs it over every run
//! after replay, and the property tests run it after every operation.

use std::collections::HashSet;

use crate::types::{ActorId, MAX_BOOSTED, MAX_CARRIERS, ParticipantId, Role, Roster};

/// A broken roster invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// More participants in a role than its ceiling allows.
    RoleOverflow { role: Role, count: usize },

    /// More than one participant is flagged as leader.
    MultipleLeaders { count: usize },

    /// The run's leader field disagrees with the participant flags.
    LeaderMismatch {
        recorded: Option<ParticipantId>,
        flagged: Option<ParticipantId>,
    },

    /// The leader is not a carrier.
    LeaderNotCarrier { leader: ParticipantId },

    /// An actor holds more than one seat.
    DuplicateMember { actor: ActorId },

    /// A reservation's owner has no seat, or holds a carrier seat.
    IneligibleReservation { actor: ActorId },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvariantViolation::RoleOverflow { role, count } => write!(
                f,
                "{} {} seated, ceiling is {}",
                count,
                role.plural(),
                role.capacity()
            ),
            InvariantViolation::MultipleLeaders { count } => {
                write!(f, "{} participants flagged as leader", count)
            }
            InvariantViolation::LeaderMismatch { recorded, flagged } => write!(
                f,
                "run leader is {:?} but flagged leader is {:?}",
                recorded, flagged
            ),
            InvariantViolation::LeaderNotCarrier { leader } => {
                write!(f, "leader {} is not a carrier", leader)
            }
            InvariantViolation::DuplicateMember { actor } => {
                write!(f, "actor {} holds more than one seat", actor)
            }
            InvariantViolation::IneligibleReservation { actor } => {
                write!(f, "actor {} holds a reservation without a boosted seat", actor)
            }
        }
    }
}

/// Returns every invariant the roster violates, in a stable order.
pub fn check_roster(roster: &Roster) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for (role, max) in [(Role::Carrier, MAX_CARRIERS), (Role::Boosted, MAX_BOOSTED)] {
        let count = roster.count(role);
        if count > max {
            violations.push(InvariantViolation::RoleOverflow { role, count });
        }
    }

    let mut actors = HashSet::new();
    for member in &roster.members {
        if !actors.insert(&member.participant.actor_id) {
            violations.push(InvariantViolation::DuplicateMember {
                actor: member.participant.actor_id.clone(),
            });
        }
    }

    let leaders: Vec<_> = roster.members.iter().filter(|m| m.is_leader()).collect();
    if leaders.len() > 1 {
        violations.push(InvariantViolation::MultipleLeaders {
            count: leaders.len(),
        });
    }
    for leader in &leaders {
        if !leader.role().is_carrier() {
            violations.push(InvariantViolation::LeaderNotCarrier {
                leader: leader.participant.id.clone(),
            });
        }
    }
    let flagged = leaders.first().map(|m| m.participant.id.clone());
    if leaders.len() <= 1 && roster.run.leader != flagged {
        violations.push(InvariantViolation::LeaderMismatch {
            recorded: roster.run.leader.clone(),
            flagged,
        });
    }

    let mut reported = HashSet::new();
    for claim in &roster.claims {
        let owner = &claim.reservation.actor_id;
        let eligible = roster
            .member(owner)
            .is_some_and(|m| m.role() == Role::Boosted);
        if !eligible && reported.insert(owner) {
            violations.push(InvariantViolation::IneligibleReservation {
                actor: owner.clone(),
            });
        }
    }

    violations
}
