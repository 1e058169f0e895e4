//! Character and item catalog endpoints.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;

use super::error::ApiError;
use super::{AppState, actor_from};
use crate::types::{Character, CharacterClass, Item};

#[derive(Debug, Deserialize)]
pub struct CharacterBody {
    pub name: String,
    pub class: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    pub name: String,
    #[serde(alias = "price")]
    pub value: u64,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// The caller's characters, newest first.
pub async fn list_characters(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Character>>, ApiError> {
    let actor = actor_from(&headers)?;
    Ok(Json(app_state.engine().characters(&actor).await?))
}

pub async fn create_character(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Character>), ApiError> {
    let actor = actor_from(&headers)?;
    let body: CharacterBody = serde_json::from_slice(&body)?;
    let class = body
        .class
        .parse::<CharacterClass>()
        .map_err(|e| ApiError::invalid_input(e.to_string()))?;

    let character = app_state
        .engine()
        .register_character(&actor, &body.name, class)
        .await?;
    Ok((StatusCode::CREATED, Json(character)))
}

/// The item catalog by name.
pub async fn list_items(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Item>>, ApiError> {
    actor_from(&headers)?;
    Ok(Json(app_state.engine().items().await?))
}

pub async fn create_item(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    actor_from(&headers)?;
    let body: ItemBody = serde_json::from_slice(&body)?;
    let item = app_state
        .engine()
        .register_item(&body.name, body.value, body.image_url)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}
