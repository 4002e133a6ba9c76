//! Card records.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use tracing::debug;

use cipherkeep_vault::{CardPayload, SavedResponse};

use super::{json_body, parse_id};
use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::state::AppState;

pub async fn save_card(
    AuthUser(owner): AuthUser,
    State(state): State<Arc<AppState>>,
    body: Result<Json<CardPayload>, JsonRejection>,
) -> Result<Json<SavedResponse>, ApiError> {
    let card = json_body(body)?;
    card.validate()?;

    let id = state.store.save_card(owner, &card).await?;
    debug!(owner = %owner, id = %id, "Card stored");
    Ok(Json(SavedResponse { id }))
}

pub async fn list_cards(
    AuthUser(owner): AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CardPayload>>, ApiError> {
    Ok(Json(state.store.find_cards(owner).await?))
}

pub async fn delete_card(
    AuthUser(owner): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<(), ApiError> {
    let id = parse_id(&raw_id)?;
    state.store.delete_card(owner, id).await?;
    debug!(owner = %owner, id = %id, "Card deleted");
    Ok(())
}
