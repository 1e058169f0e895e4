//! HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::engine::{EngineError, ErrorKind};

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The actor header is missing or empty.
    #[error("Unauthorized")]
    Unauthorized,

    /// The body is not the JSON the route expects.
    #[error("Invalid request body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ApiError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ApiError::Engine(EngineError::invalid_input(message))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::InvalidJson(_) => ErrorKind::InvalidInput.as_str(),
            ApiError::Engine(e) => e.kind().as_str(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(e) => match e.kind() {
                ErrorKind::RunNotFound | ErrorKind::CharacterNotFound | ErrorKind::ItemNotFound => {
                    StatusCode::NOT_FOUND
                }
                ErrorKind::NotRunCreator => StatusCode::FORBIDDEN,
                ErrorKind::StorageFailure => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::NotAMember
                | ErrorKind::AlreadyMember
                | ErrorKind::LeaderMustBeCarrier
                | ErrorKind::LeaderExists
                | ErrorKind::RoleFull
                | ErrorKind::SupportQuotaUnmet
                | ErrorKind::ReservationsNotAllowedForCarrier
                | ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: String,
    kind: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Engine(EngineError::StorageFailure(source)) = &self {
            error!(error = %source, "Storage failure");
        }

        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };
        (self.status(), Json(body)).into_response()
    }
}
