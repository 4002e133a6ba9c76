//! Login records.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use tracing::debug;

use cipherkeep_vault::{LoginPayload, SavedResponse};

use super::{json_body, parse_id};
use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::state::AppState;

pub async fn save_login(
    AuthUser(owner): AuthUser,
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginPayload>, JsonRejection>,
) -> Result<Json<SavedResponse>, ApiError> {
    let login = json_body(body)?;
    login.validate()?;

    let id = state.store.save_login(owner, &login).await?;
    debug!(owner = %owner, id = %id, "Login stored");
    Ok(Json(SavedResponse { id }))
}

pub async fn list_logins(
    AuthUser(owner): AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LoginPayload>>, ApiError> {
    Ok(Json(state.store.find_logins(owner).await?))
}

pub async fn delete_login(
    AuthUser(owner): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<(), ApiError> {
    let id = parse_id(&raw_id)?;
    state.store.delete_login(owner, id).await?;
    debug!(owner = %owner, id = %id, "Login deleted");
    Ok(())
}
