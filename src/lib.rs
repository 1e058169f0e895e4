//! Run Roster - seat allocation and item reservations for scheduled group runs.
//!
//! This library provides the domain types, the roster rules, the versioned
//! run store, and the HTTP surface of the service.

pub mod config;
pub mod engine;
pub mod persistence;
pub mod roster;
pub mod server;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;
