//! Common error types for CipherKeep.

use thiserror::Error;

use crate::types::RecordId;
use crate::validation::ValidationError;

/// Top-level error type for CipherKeep operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Sealing or opening an envelope failed (tag mismatch, wrong key,
    /// malformed ciphertext).
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// A sensitive field of a record could not be decoded.
    ///
    /// Covers both hex-decode failures and authentication failures so the
    /// caller can report which record is unreadable.
    #[error("Cannot decrypt record {id}: {reason}")]
    Decode { id: RecordId, reason: String },

    /// A record or credential failed a validation rule.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The session credential was rejected; the user must sign in again.
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict detected (e.g. username already taken).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The server rejected the operation with the given message.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Network failure or cancelled request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Storage backend (filesystem or database) failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether the user may reasonably retry the operation.
    ///
    /// Only transport failures qualify. Nothing in CipherKeep retries
    /// automatically; this only drives what the caller offers the user.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Whether the caller must force a fresh sign-in.
    pub fn requires_login(&self) -> bool {
        matches!(self, Error::Unauthorized)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_transient() {
        assert!(Error::Transport("timeout".into()).is_transient());
        assert!(!Error::Unauthorized.is_transient());
        assert!(!Error::Storage("disk full".into()).is_transient());
    }

    #[test]
    fn test_unauthorized_requires_login() {
        assert!(Error::Unauthorized.requires_login());
        assert!(!Error::Rejected("nope".into()).requires_login());
    }

    #[test]
    fn test_decode_error_names_record() {
        let err = Error::Decode {
            id: RecordId::new(7),
            reason: "bad tag".into(),
        };
        assert_eq!(err.to_string(), "Cannot decrypt record 7: bad tag");
    }

    #[test]
    fn test_validation_message_passes_through() {
        let err: Error = ValidationError::CardBankEmpty.into();
        assert_eq!(err.to_string(), "bank empty");
    }
}
