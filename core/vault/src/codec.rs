//! Field-level encryption of vault records.
//!
//! Each sensitive field is sealed independently and hex-encoded. The
//! record id is never encrypted, so the server can address a record
//! without learning anything about its content.

use tracing::debug;

use cipherkeep_common::{Error, RecordId, Result};
use cipherkeep_crypto::Envelope;

use crate::records::{Card, FileRecord, Login};
use crate::wire::{CardPayload, FileEntry, LoginPayload};

/// Seal a text field and hex-encode the result.
pub fn encode_field(envelope: &Envelope, plaintext: &str) -> Result<String> {
    let sealed = envelope.seal(plaintext.as_bytes())?;
    Ok(hex::encode(sealed))
}

/// Hex-decode and open a text field belonging to record `id`.
///
/// # Errors
/// - `Error::Decode` for invalid hex, a tag that does not verify, or
///   plaintext that is not UTF-8
pub fn decode_field(envelope: &Envelope, id: RecordId, encoded: &str) -> Result<String> {
    let sealed = hex::decode(encoded).map_err(|e| Error::Decode {
        id,
        reason: format!("invalid hex: {}", e),
    })?;

    let plaintext = envelope.open(&sealed).map_err(|e| Error::Decode {
        id,
        reason: e.to_string(),
    })?;

    String::from_utf8(plaintext).map_err(|_| Error::Decode {
        id,
        reason: "plaintext is not valid UTF-8".to_string(),
    })
}

/// A plaintext record with a sealed wire counterpart.
pub trait SealedRecord: Sized {
    /// The wire form carrying hex ciphertext.
    type Payload;

    /// Seal every sensitive field.
    fn seal(&self, envelope: &Envelope) -> Result<Self::Payload>;

    /// Open every sensitive field. Fails as a whole if any field fails.
    fn open(payload: &Self::Payload, envelope: &Envelope) -> Result<Self>;
}

impl SealedRecord for Login {
    type Payload = LoginPayload;

    fn seal(&self, envelope: &Envelope) -> Result<LoginPayload> {
        Ok(LoginPayload {
            id: self.id,
            username: encode_field(envelope, &self.username)?,
            password: encode_field(envelope, &self.password)?,
            metainfo: encode_field(envelope, &self.note)?,
        })
    }

    fn open(payload: &LoginPayload, envelope: &Envelope) -> Result<Self> {
        let id = payload.id;
        Ok(Login {
            id,
            username: decode_field(envelope, id, &payload.username)?,
            password: decode_field(envelope, id, &payload.password)?,
            note: decode_field(envelope, id, &payload.metainfo)?,
        })
    }
}

impl SealedRecord for Card {
    type Payload = CardPayload;

    fn seal(&self, envelope: &Envelope) -> Result<CardPayload> {
        Ok(CardPayload {
            id: self.id,
            bank: encode_field(envelope, &self.bank)?,
            number: encode_field(envelope, &self.number)?,
            date: encode_field(envelope, &self.expiry)?,
            cvv: encode_field(envelope, &self.cvv)?,
            metainfo: encode_field(envelope, &self.note)?,
        })
    }

    fn open(payload: &CardPayload, envelope: &Envelope) -> Result<Self> {
        let id = payload.id;
        Ok(Card {
            id,
            bank: decode_field(envelope, id, &payload.bank)?,
            number: decode_field(envelope, id, &payload.number)?,
            expiry: decode_field(envelope, id, &payload.date)?,
            cvv: decode_field(envelope, id, &payload.cvv)?,
            note: decode_field(envelope, id, &payload.metainfo)?,
        })
    }
}

impl SealedRecord for FileRecord {
    type Payload = FileEntry;

    fn seal(&self, envelope: &Envelope) -> Result<FileEntry> {
        Ok(FileEntry {
            id: self.id,
            name: encode_field(envelope, &self.name)?,
            metainfo: encode_field(envelope, &self.note)?,
        })
    }

    fn open(payload: &FileEntry, envelope: &Envelope) -> Result<Self> {
        let id = payload.id;
        Ok(FileRecord {
            id,
            name: decode_field(envelope, id, &payload.name)?,
            note: decode_field(envelope, id, &payload.metainfo)?,
        })
    }
}

/// Open a batch of payloads one record at a time.
///
/// A record that fails to decode yields its own error; its siblings are
/// unaffected.
pub fn open_all<T: SealedRecord>(payloads: &[T::Payload], envelope: &Envelope) -> Vec<Result<T>> {
    payloads
        .iter()
        .map(|payload| {
            let opened = T::open(payload, envelope);
            if let Err(e) = &opened {
                debug!(error = %e, "Record failed to decode");
            }
            opened
        })
        .collect()
}
