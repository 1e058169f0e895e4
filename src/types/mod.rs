//! Core domain types for the run roster service.
//!
//! This module contains the fundamental types used throughout the application,
//! designed to encode invariants via the type system: roles and classes are
//! closed enums, identifiers are distinct newtypes.

pub mod catalog;
pub mod ids;
pub mod roster;
pub mod schedule;
pub mod view;

// Re-export commonly used types at the module level
pub use catalog::{Character, CharacterClass, Item, UnknownClass, starter_items};
pub use ids::{ActorId, CharacterId, ItemId, ParticipantId, ReservationId, RunId};
pub use roster::{
    Claim, MAX_BOOSTED, MAX_CARRIERS, MIN_SUPPORT_CARRIERS, Member, Participant, Reservation,
    Role, Roster, Run, SUPPORT_QUOTA_THRESHOLD, UnknownRole, count_role,
};
pub use schedule::ScheduleWindow;
pub use view::{JoinOutcome, ParticipantView, ReservationView, RunView};
