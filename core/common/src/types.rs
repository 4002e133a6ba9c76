//! Common types used throughout CipherKeep.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Identifier of a vault record (login, card or file).
///
/// `0` means "not yet created": saving such a record inserts it and the
/// server assigns a fresh identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// The identifier of a record that has not been saved yet.
    pub const NEW: RecordId = RecordId(0);

    /// Wrap a raw identifier.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub fn get(&self) -> i64 {
        self.0
    }

    /// Whether the record still has to be created on the server.
    pub fn is_new(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| crate::Error::InvalidInput(format!("invalid record id = {}", s)))
    }
}

/// Identifier of an account on the server. Never encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Wrap a raw identifier.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sensitive data wrapper that zeroizes on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}
