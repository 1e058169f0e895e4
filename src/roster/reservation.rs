//! Shape rules for the item reservations that accompany a join.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::types::{Item, ItemId, Role};

/// Reasons a join is rejected because of its reservation list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationRejection {
    /// Carriers do not receive loot, so they cannot reserve it.
    #[error("Carriers cannot reserve items")]
    ReservationsNotAllowedForCarrier,

    /// A requested item is not in the catalog.
    #[error("Item {0} not found")]
    ItemNotFound(ItemId),
}

/// Returns `requested` with repeated ids removed, keeping first occurrences.
pub fn distinct_items(requested: &[ItemId]) -> Vec<ItemId> {
    let mut seen = HashSet::new();
    requested
        .iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}

/// Validates the reservation list for a seat of `role`.
///
/// `catalog` holds whichever of the requested items exist. Returns the items
/// to reserve, one per distinct requested id in request order.
pub fn check_reservations(
    role: Role,
    requested: &[ItemId],
    catalog: &HashMap<ItemId, Item>,
) -> Result<Vec<Item>, ReservationRejection> {
    if requested.is_empty() {
        return Ok(Vec::new());
    }
    if role.is_carrier() {
        return Err(ReservationRejection::ReservationsNotAllowedForCarrier);
    }

    distinct_items(requested)
        .into_iter()
        .map(|id| {
            catalog
                .get(&id)
                .cloned()
                .ok_or(ReservationRejection::ItemNotFound(id))
        })
        .collect()
}
