//! CipherKeep server.
//!
//! This module provides:
//! - The axum router implementing the wire protocol
//! - The session guard issuing and verifying session cookies
//! - Argon2 account password storage
//!
//! The server stores what the client sends and never holds a key able to
//! open it.

pub mod config;
pub mod guard;
pub mod password;
pub mod state;

mod api;
mod error;
mod extract;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use cipherkeep_vault::wire::{API_CARDS, API_FILES, API_LOGINS, API_SIGNIN, API_SIGNUP};

pub use config::{ServerConfig, IN_MEMORY_DATABASE};
pub use error::ApiError;
pub use guard::SessionGuard;
pub use state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(API_SIGNUP, post(api::auth::sign_up))
        .route(API_SIGNIN, post(api::auth::sign_in))
        .route(
            API_LOGINS,
            get(api::logins::list_logins).post(api::logins::save_login),
        )
        .route("/api/logins/{id}", delete(api::logins::delete_login))
        .route(API_CARDS, get(api::cards::list_cards).post(api::cards::save_card))
        .route("/api/cards/{id}", delete(api::cards::delete_card))
        .route(API_FILES, get(api::files::list_files).post(api::files::save_file))
        .route(
            "/api/files/{id}",
            get(api::files::download_file).delete(api::files::delete_file),
        )
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `state` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "Server listening");
    }

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
