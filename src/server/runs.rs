//! Run endpoints.
//!
//! - `GET /api/runs?date=<date>` - runs, optionally only those in the date's month
//! - `POST /api/runs` - create a run with the caller as first participant
//! - `GET /api/runs/{id}` - one run
//! - `DELETE /api/runs/{id}` - delete a run (creator only)
//! - `POST /api/runs/{id}/join` - take a seat
//! - `POST /api/runs/{id}/leave` - give a seat up

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ApiError;
use super::{AppState, actor_from};
use crate::engine::JoinRequest;
use crate::types::{CharacterId, ItemId, JoinOutcome, Role, RunId, RunView};

/// The seat part of a create or join body.
///
/// The role may be given as `role` (`"carrier"` / `"boosted"`) or as the
/// boolean `isCarrier`. `role` wins when both are present.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatBody {
    pub character_id: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_carrier: Option<bool>,
    #[serde(default)]
    pub is_leader: bool,
    #[serde(default)]
    pub item_ids: Vec<String>,
}

impl SeatBody {
    fn into_request(self) -> Result<JoinRequest, ApiError> {
        let role = match (self.role, self.is_carrier) {
            (Some(role), _) => role
                .parse::<Role>()
                .map_err(|e| ApiError::invalid_input(e.to_string()))?,
            (None, Some(true)) => Role::Carrier,
            (None, Some(false)) => Role::Boosted,
            (None, None) => return Err(ApiError::invalid_input("role is required")),
        };
        if self.character_id.trim().is_empty() {
            return Err(ApiError::invalid_input("characterId is required"));
        }

        Ok(JoinRequest {
            character_id: CharacterId::new(self.character_id),
            role,
            is_leader: self.is_leader,
            item_ids: self.item_ids.into_iter().map(ItemId::new).collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRunBody {
    pub datetime: DateTime<Utc>,
    #[serde(flatten)]
    pub seat: SeatBody,
}

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Success {
    pub success: bool,
}

const SUCCESS: Success = Success { success: true };

/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
fn parse_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ApiError::invalid_input(format!("invalid date: {raw:?}")))
}

pub async fn list_runs(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<Vec<RunView>>, ApiError> {
    actor_from(&headers)?;
    let month_of = query.date.as_deref().map(parse_date).transpose()?;
    let runs = app_state.engine().list_runs(month_of).await?;
    Ok(Json(runs))
}

pub async fn create_run(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<RunView>), ApiError> {
    let actor = actor_from(&headers)?;
    let body: CreateRunBody = serde_json::from_slice(&body)?;
    debug!(actor = %actor, datetime = %body.datetime, "Create run request");

    let request = body.seat.into_request()?;
    let view = app_state
        .engine()
        .create_run(&actor, body.datetime, request)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_run(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<RunView>, ApiError> {
    actor_from(&headers)?;
    let view = app_state.engine().get_run(&RunId::new(id)).await?;
    Ok(Json(view))
}

pub async fn delete_run(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Success>, ApiError> {
    let actor = actor_from(&headers)?;
    app_state
        .engine()
        .delete_run(&RunId::new(id), &actor)
        .await?;
    Ok(Json(SUCCESS))
}

pub async fn join_run(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<JoinOutcome>, ApiError> {
    let actor = actor_from(&headers)?;
    let body: SeatBody = serde_json::from_slice(&body)?;
    let request = body.into_request()?;

    let outcome = app_state
        .engine()
        .join_run(&RunId::new(id), &actor, request)
        .await?;
    Ok(Json(outcome))
}

pub async fn leave_run(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Success>, ApiError> {
    let actor = actor_from(&headers)?;
    app_state
        .engine()
        .leave_run(&RunId::new(id), &actor)
        .await?;
    Ok(Json(SUCCESS))
}
