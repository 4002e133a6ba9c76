//! Route handlers.

pub mod auth;
pub mod cards;
pub mod files;
pub mod logins;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use cipherkeep_common::RecordId;

use crate::error::ApiError;

/// Unwrap a JSON body, reporting undecodable bodies as 406.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::NotAcceptable(rejection.body_text()))
}

/// Parse a record id taken from the path.
pub(crate) fn parse_id(raw: &str) -> Result<RecordId, ApiError> {
    raw.parse::<RecordId>().map_err(ApiError::from)
}
