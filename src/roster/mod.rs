//! Pure roster logic.
//!
//! This module contains the functional core: admission rules for joins,
//! shape rules for reservations, and whole-roster invariant checks. All I/O
//! happens in the engine and the store.

pub mod invariants;
pub mod reservation;
pub mod validation;

pub use invariants::{InvariantViolation, check_roster};
pub use reservation::{ReservationRejection, check_reservations, distinct_items};
pub use validation::{JoinProposal, RosterRejection, support_carriers, validate_join};
