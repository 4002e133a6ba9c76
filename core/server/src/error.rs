//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use cipherkeep_common::{Error, ValidationError};
use cipherkeep_vault::ErrorResponse;

/// Message shown for failures whose details stay in the server log.
const INTERNAL_MESSAGE: &str = "internal server error";

/// Error returned by every handler.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, malformed, tampered, or expired session; also a failed
    /// sign-in. Rendered without a body.
    #[error("unauthorized")]
    Unauthorized,

    /// Validation failure or unusable path parameter.
    #[error("{0}")]
    BadRequest(String),

    /// Request body could not be decoded.
    #[error("{0}")]
    NotAcceptable(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Storage or other server-side failure.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Unauthorized => ApiError::Unauthorized,
            Error::Validation(v) => v.into(),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::Serialization(msg) => ApiError::NotAcceptable(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match self {
            ApiError::Unauthorized => return status.into_response(),
            ApiError::Internal(detail) => {
                error!(error = %detail, "Request failed");
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
