//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different ID types (e.g., using an
//! ItemId where a CharacterId is expected). Identifiers minted by this crate
//! (runs, participants, reservations) are random UUIDs in simple form; actor,
//! character and item ids are opaque strings supplied by collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                $name(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

macro_rules! generated_id {
    ($name:ident) => {
        impl $name {
            /// Mints a fresh random identifier.
            pub fn generate() -> Self {
                $name(Uuid::new_v4().simple().to_string())
            }
        }
    };
}

string_id!(
    /// An authenticated actor, as supplied by the identity collaborator.
    ActorId
);
string_id!(
    /// A scheduled run.
    RunId
);
string_id!(
    /// One actor's seat in one run.
    ParticipantId
);
string_id!(
    /// An item claim scoped to one run.
    ReservationId
);
string_id!(
    /// An actor-owned character.
    CharacterId
);
string_id!(
    /// A catalog item.
    ItemId
);

generated_id!(RunId);
generated_id!(ParticipantId);
generated_id!(ReservationId);
generated_id!(CharacterId);
generated_id!(ItemId);
