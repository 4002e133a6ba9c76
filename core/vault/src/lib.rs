//! Vault codec for CipherKeep.
//!
//! This module provides:
//! - Plaintext record types (logins, cards, file metadata) and their
//!   validation rules
//! - The wire payloads exchanged with the server
//! - Field-level sealing of records through the session envelope
//! - The client session that owns the envelope
//!
//! # Architecture
//! The vault module sits between the user interface and the sync client.
//! Only record ids and owner ids cross the network in the clear.

pub mod codec;
pub mod records;
pub mod session;
pub mod wire;

pub use codec::{decode_field, encode_field, open_all, SealedRecord};
pub use records::{Card, Credentials, FileRecord, Login};
pub use session::{SessionState, VaultSession};
pub use wire::{CardPayload, ErrorResponse, FileEntry, LoginPayload, SavedResponse};
