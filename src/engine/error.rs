//! Engine error type and stable error kinds.

use thiserror::Error;

use crate::roster::{ReservationRejection, RosterRejection};
use crate::store::StoreError;
use crate::types::RunId;

/// Errors returned by [`RosterEngine`](super::RosterEngine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Run not found")]
    RunNotFound(RunId),

    #[error("You are not in this run")]
    NotAMember,

    /// The character does not exist or belongs to someone else.
    #[error("Character not found")]
    CharacterNotFound,

    #[error("Only the creator of a run can delete it")]
    NotRunCreator,

    #[error(transparent)]
    Roster(#[from] RosterRejection),

    #[error(transparent)]
    Reservation(#[from] ReservationRejection),

    #[error("{0}")]
    InvalidInput(String),

    /// The write failed, or kept conflicting past the retry budget. The
    /// whole operation may be resubmitted.
    #[error("Storage failure, please try again")]
    StorageFailure(#[source] StoreError),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            // The run vanished between snapshot and commit.
            StoreError::RunNotFound(id) => EngineError::RunNotFound(id),
            other => EngineError::StorageFailure(other),
        }
    }
}

impl EngineError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        EngineError::InvalidInput(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::StorageFailure(e) if e.is_conflict())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::RunNotFound(_) => ErrorKind::RunNotFound,
            EngineError::NotAMember => ErrorKind::NotAMember,
            EngineError::CharacterNotFound => ErrorKind::CharacterNotFound,
            EngineError::NotRunCreator => ErrorKind::NotRunCreator,
            EngineError::Roster(r) => match r {
                RosterRejection::AlreadyMember => ErrorKind::AlreadyMember,
                RosterRejection::LeaderMustBeCarrier => ErrorKind::LeaderMustBeCarrier,
                RosterRejection::LeaderExists => ErrorKind::LeaderExists,
                RosterRejection::RoleFull { .. } => ErrorKind::RoleFull,
                RosterRejection::SupportQuotaUnmet { .. } => ErrorKind::SupportQuotaUnmet,
            },
            EngineError::Reservation(r) => match r {
                ReservationRejection::ReservationsNotAllowedForCarrier => {
                    ErrorKind::ReservationsNotAllowedForCarrier
                }
                ReservationRejection::ItemNotFound(_) => ErrorKind::ItemNotFound,
            },
            EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::StorageFailure(_) => ErrorKind::StorageFailure,
        }
    }
}

/// One variant per distinct failure a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RunNotFound,
    NotAMember,
    AlreadyMember,
    LeaderMustBeCarrier,
    LeaderExists,
    RoleFull,
    SupportQuotaUnmet,
    ReservationsNotAllowedForCarrier,
    ItemNotFound,
    CharacterNotFound,
    NotRunCreator,
    InvalidInput,
    StorageFailure,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 13] = [
        ErrorKind::RunNotFound,
        ErrorKind::NotAMember,
        ErrorKind::AlreadyMember,
        ErrorKind::LeaderMustBeCarrier,
        ErrorKind::LeaderExists,
        ErrorKind::RoleFull,
        ErrorKind::SupportQuotaUnmet,
        ErrorKind::ReservationsNotAllowedForCarrier,
        ErrorKind::ItemNotFound,
        ErrorKind::CharacterNotFound,
        ErrorKind::NotRunCreator,
        ErrorKind::InvalidInput,
        ErrorKind::StorageFailure,
    ];

    /// Stable snake_case name, used in API error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RunNotFound => "run_not_found",
            ErrorKind::NotAMember => "not_a_member",
            ErrorKind::AlreadyMember => "already_member",
            ErrorKind::LeaderMustBeCarrier => "leader_must_be_carrier",
            ErrorKind::LeaderExists => "leader_exists",
            ErrorKind::RoleFull => "role_full",
            ErrorKind::SupportQuotaUnmet => "support_quota_unmet",
            ErrorKind::ReservationsNotAllowedForCarrier => "reservations_not_allowed_for_carrier",
            ErrorKind::ItemNotFound => "item_not_found",
            ErrorKind::CharacterNotFound => "character_not_found",
            ErrorKind::NotRunCreator => "not_run_creator",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::StorageFailure => "storage_failure",
        }
    }

    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::StorageFailure)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
