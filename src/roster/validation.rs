//! Admission rules for a proposed join.
//!
//! Pure functions that decide, from a roster snapshot and a proposed seat,
//! whether the join is admissible. Nothing here touches storage.

use thiserror::Error;

use crate::types::{
    ActorId, CharacterClass, MIN_SUPPORT_CARRIERS, Member, Role, SUPPORT_QUOTA_THRESHOLD,
    count_role,
};

/// Reasons a join is rejected on roster composition grounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterRejection {
    /// The actor already holds a seat in this run.
    #[error("You are already in this run")]
    AlreadyMember,

    /// Leadership was requested for a boosted seat. The leader must carry.
    #[error("Only a carrier can be the leader of a run")]
    LeaderMustBeCarrier,

    /// Leadership was requested but another participant already leads.
    #[error("This run already has a leader")]
    LeaderExists,

    /// The requested role has reached its ceiling.
    #[error("This run already has the maximum number of {} ({max})", .role.plural())]
    RoleFull { role: Role, max: usize },

    /// Too few support-class carriers are seated for a non-support carrier to
    /// join past the threshold.
    #[error("This run requires at least {required} priests or shamans among carriers")]
    SupportQuotaUnmet { required: usize },
}

/// A seat someone is asking for.
#[derive(Debug, Clone, Copy)]
pub struct JoinProposal<'a> {
    pub actor: &'a ActorId,
    pub role: Role,
    pub is_leader: bool,
    pub class: CharacterClass,
}

/// Validates a proposed join against the current members of a run.
///
/// Checks run in a fixed order and the first failure is returned:
///
/// 1. The actor must not already be seated.
/// 2. A leader must be a carrier.
/// 3. At most one leader.
/// 4. The role must have a free seat.
/// 5. Past the threshold, a non-support carrier needs two support carriers
///    already seated.
///
/// An empty `members` slice is the roster of a run being created; every
/// check after the first is then vacuous except the leader role rule.
pub fn validate_join(
    members: &[Member],
    proposal: &JoinProposal<'_>,
) -> Result<(), RosterRejection> {
    if members
        .iter()
        .any(|m| &m.participant.actor_id == proposal.actor)
    {
        return Err(RosterRejection::AlreadyMember);
    }

    if proposal.is_leader {
        if !proposal.role.is_carrier() {
            return Err(RosterRejection::LeaderMustBeCarrier);
        }
        if members.iter().any(Member::is_leader) {
            return Err(RosterRejection::LeaderExists);
        }
    }

    let seated = count_role(members, proposal.role);
    if seated >= proposal.role.capacity() {
        return Err(RosterRejection::RoleFull {
            role: proposal.role,
            max: proposal.role.capacity(),
        });
    }

    if proposal.role.is_carrier() && seated >= SUPPORT_QUOTA_THRESHOLD {
        let support = support_carriers(members);
        if support < MIN_SUPPORT_CARRIERS && !proposal.class.is_support() {
            return Err(RosterRejection::SupportQuotaUnmet {
                required: MIN_SUPPORT_CARRIERS,
            });
        }
    }

    Ok(())
}

/// Number of seated carriers whose character is a support class.
pub fn support_carriers(members: &[Member]) -> usize {
    members
        .iter()
        .filter(|m| m.role().is_carrier() && m.class().is_support())
        .count()
}
