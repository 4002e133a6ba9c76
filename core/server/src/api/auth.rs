//! Sign-up and sign-in.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;
use tracing::{info, warn};

use cipherkeep_common::UserId;
use cipherkeep_vault::Credentials;

use super::json_body;
use crate::error::ApiError;
use crate::extract::session_set_cookie;
use crate::password::{hash_password, verify_password};
use crate::state::AppState;

/// Answer carrying a fresh session cookie.
fn with_session(state: &AppState, user: UserId) -> Result<impl IntoResponse, ApiError> {
    let credential = state.guard.issue(user)?;
    let cookie = session_set_cookie(&credential, state.guard.ttl().num_seconds());
    Ok([(SET_COOKIE, cookie)])
}

/// Run CPU-heavy password hashing off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> cipherkeep_common::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("password task failed: {}", e)))?
        .map_err(ApiError::from)
}

pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = json_body(body)?;
    credentials.validate()?;

    let password = credentials.password.clone();
    let hash = blocking(move || hash_password(&password)).await?;

    let user = state.store.create_user(&credentials.username, &hash).await?;
    info!(user = %user, "Account created");

    with_session(&state, user)
}

pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = json_body(body)?;
    credentials.validate()?;

    let Some(user) = state.store.find_user(&credentials.username).await? else {
        warn!("Sign-in for unknown account");
        return Err(ApiError::Unauthorized);
    };

    let password = credentials.password.clone();
    let stored = user.password_hash.clone();
    let matches = blocking(move || verify_password(&password, &stored)).await?;
    if !matches {
        warn!(user = %user.id, "invalid username/password pair");
        return Err(ApiError::Unauthorized);
    }

    info!(user = %user.id, "Signed in");
    with_session(&state, user.id)
}
