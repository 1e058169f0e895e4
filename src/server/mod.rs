//! HTTP server for the run roster service.
//!
//! Every `/api` route identifies the caller by the `x-actor-id` header; the
//! identity provider in front of the service is responsible for setting it.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns 200 if server is running
//! - `GET|POST /api/runs` - List or create runs
//! - `GET|DELETE /api/runs/{id}` - Fetch or delete a run
//! - `POST /api/runs/{id}/join`, `POST /api/runs/{id}/leave`
//! - `GET|POST /api/characters` - The caller's characters
//! - `GET|POST /api/items` - The item catalog

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::engine::RosterEngine;
use crate::types::ActorId;

pub mod catalog;
pub mod error;
pub mod health;
pub mod runs;

pub use error::ApiError;
pub use health::health_handler;

/// Header carrying the authenticated actor's id.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: Arc<RosterEngine>,
}

impl AppState {
    pub fn new(engine: Arc<RosterEngine>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner { engine }),
        }
    }

    pub fn engine(&self) -> &RosterEngine {
        &self.inner.engine
    }
}

/// Extracts the caller from [`ACTOR_HEADER`]. Missing, empty, or non-UTF-8
/// values are unauthorized.
pub fn actor_from(headers: &HeaderMap) -> Result<ActorId, ApiError> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ActorId::new)
        .ok_or(ApiError::Unauthorized)
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/health", get(health_handler))
        .route("/api/runs", get(runs::list_runs).post(runs::create_run))
        .route("/api/runs/{id}", get(runs::get_run).delete(runs::delete_run))
        .route("/api/runs/{id}/join", post(runs::join_run))
        .route("/api/runs/{id}/leave", post(runs::leave_run))
        .route(
            "/api/characters",
            get(catalog::list_characters).post(catalog::create_character),
        )
        .route(
            "/api/items",
            get(catalog::list_items).post(catalog::create_item),
        )
        .with_state(app_state)
}
