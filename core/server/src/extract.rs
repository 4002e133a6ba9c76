//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::debug;

use cipherkeep_common::UserId;
use cipherkeep_vault::wire::SESSION_COOKIE;

use crate::error::ApiError;
use crate::state::AppState;

/// Find the session credential among the request cookies.
pub(crate) fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

/// `Set-Cookie` value carrying a fresh credential.
pub(crate) fn session_set_cookie(credential: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE, credential, max_age_secs
    )
}

/// Authenticated owner of the request.
///
/// Rejection happens before the body is read, so an invalid session is
/// reported as 401 whatever the body contains.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let credential = session_cookie(&parts.headers).ok_or_else(|| {
            debug!("Request without session cookie");
            ApiError::Unauthorized
        })?;

        let user = state.guard.verify(credential).map_err(|_| ApiError::Unauthorized)?;
        Ok(AuthUser(user))
    }
}
