//! Request and response bodies exchanged between client and server.
//!
//! Every text field except `id` carries hex-encoded ciphertext. The server
//! can only check that such fields are present.

use serde::{Deserialize, Serialize};

use cipherkeep_common::validation::is_blank;
use cipherkeep_common::{RecordId, ValidationError};

pub const API_SIGNUP: &str = "/api/signup";
pub const API_SIGNIN: &str = "/api/signin";
pub const API_LOGINS: &str = "/api/logins";
pub const API_CARDS: &str = "/api/cards";
pub const API_FILES: &str = "/api/files";

/// Multipart field names of a file upload.
pub const FORM_ID: &str = "id";
pub const FORM_METAINFO: &str = "metainfo";
pub const FORM_FILE: &str = "file";

/// Name of the cookie carrying the session credential.
pub const SESSION_COOKIE: &str = "session";

/// Sealed login as stored and transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPayload {
    #[serde(default)]
    pub id: RecordId,
    pub username: String,
    pub password: String,
    pub metainfo: String,
}

impl LoginPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.username) {
            return Err(ValidationError::LoginUsernameEmpty);
        }
        if is_blank(&self.password) {
            return Err(ValidationError::LoginPasswordEmpty);
        }
        Ok(())
    }
}

/// Sealed bank card as stored and transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPayload {
    #[serde(default)]
    pub id: RecordId,
    pub bank: String,
    pub number: String,
    pub date: String,
    pub cvv: String,
    pub metainfo: String,
}

impl CardPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.bank) {
            return Err(ValidationError::CardBankEmpty);
        }
        if is_blank(&self.number) {
            return Err(ValidationError::CardNumberEmpty);
        }
        if is_blank(&self.date) {
            return Err(ValidationError::CardDateEmpty);
        }
        if is_blank(&self.cvv) {
            return Err(ValidationError::CardCvvEmpty);
        }
        Ok(())
    }
}

/// Sealed file metadata as listed by the server.
///
/// The server-side storage path is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    pub metainfo: String,
}

/// Answer to a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedResponse {
    pub id: RecordId,
}

/// Body of every non-200 answer except 401.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
