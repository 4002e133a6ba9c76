//! Session envelope: authenticated encryption with XChaCha20-Poly1305.
//!
//! An `Envelope` is built once per session from the master key and reused
//! for every seal/open call. The nonce is not generated per message: it is
//! the tail of the master key. Sealing is therefore deterministic for a
//! fixed envelope and plaintext.
//!
//! # Warning
//! Reusing one nonce for many messages under one key gives up the usual
//! AEAD confidentiality guarantees for messages that share a keystream
//! prefix. The scheme is kept because every ciphertext already stored on
//! a server was produced this way.

use std::fmt;
use std::io::{Read, Write};

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};

use crate::keys::MasterKey;
use cipherkeep_common::{Error, Result};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Key, fixed nonce and cipher for one authenticated session.
#[derive(Clone)]
pub struct Envelope {
    cipher: XChaCha20Poly1305,
    nonce: [u8; NONCE_SIZE],
}

impl Envelope {
    /// Build the session envelope from a master key.
    ///
    /// # Postconditions
    /// - The nonce is the last `NONCE_SIZE` bytes of the key
    /// - The envelope holds no mutable state and may be shared freely
    pub fn open_session(key: &MasterKey) -> Self {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        Self {
            cipher,
            nonce: key.tail::<NONCE_SIZE>(),
        }
    }

    /// Encrypt and authenticate `plaintext`.
    ///
    /// # Postconditions
    /// - Returns ciphertext || tag
    /// - Output length is plaintext length + TAG_SIZE
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.cipher
            .encrypt(XNonce::from_slice(&self.nonce), plaintext)
            .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))
    }

    /// Verify and decrypt `ciphertext`.
    ///
    /// # Errors
    /// - Ciphertext shorter than the tag
    /// - Tag mismatch (tampered data or wrong key)
    pub fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(Error::Crypto("Ciphertext too short".to_string()));
        }

        self.cipher
            .decrypt(XNonce::from_slice(&self.nonce), ciphertext)
            .map_err(|e| Error::Crypto(format!("Decryption failed: {}", e)))
    }

    /// Read everything from `reader` and seal it as a single message.
    ///
    /// There is no chunking: a file is one plaintext unit.
    pub fn seal_stream<R: Read>(&self, mut reader: R) -> Result<Vec<u8>> {
        let mut plaintext = Vec::new();
        reader.read_to_end(&mut plaintext)?;
        self.seal(&plaintext)
    }

    /// Read a whole sealed message from `reader`, open it and write the
    /// plaintext to `writer`. Returns the number of plaintext bytes.
    ///
    /// Nothing is written unless the tag verifies.
    pub fn open_stream<R: Read, W: Write>(&self, mut reader: R, mut writer: W) -> Result<u64> {
        let mut ciphertext = Vec::new();
        reader.read_to_end(&mut ciphertext)?;

        let plaintext = self.open(&ciphertext)?;
        writer.write_all(&plaintext)?;
        writer.flush()?;

        Ok(plaintext.len() as u64)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Envelope([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_master_key;
    use proptest::prelude::*;

    fn envelope(password: &str) -> Envelope {
        Envelope::open_session(&derive_master_key(password.as_bytes()))
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let env = envelope("superSecret");
        let message = b"This is test message";

        let sealed = env.seal(message).unwrap();
        let opened = env.open(&sealed).unwrap();

        assert_eq!(opened, message);
    }

    #[test]
    fn test_new_session_same_password_opens() {
        let sealed = envelope("superSecret").seal(b"carry over").unwrap();
        let opened = envelope("superSecret").open(&sealed).unwrap();
        assert_eq!(opened, b"carry over");
    }

    #[test]
    fn test_ciphertext_size() {
        let env = envelope("pw");
        let plaintext = b"Test message";

        let sealed = env.seal(plaintext).unwrap();
        assert_eq!(sealed.len(), plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_seal_is_deterministic() {
        let env = envelope("pw");
        assert_eq!(env.seal(b"same").unwrap(), env.seal(b"same").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = envelope("right").seal(b"Secret data").unwrap();
        let result = envelope("wrong").open(&sealed);

        assert!(matches!(result, Err(Error::Crypto(_))));
    }

    #[test]
    fn test_short_ciphertext_fails() {
        let env = envelope("pw");
        assert!(matches!(env.open(&[1, 2, 3]), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_empty_plaintext() {
        let env = envelope("pw");
        let sealed = env.seal(b"").unwrap();

        assert_eq!(sealed.len(), TAG_SIZE);
        assert!(env.open(&sealed).unwrap().is_empty());
    }

    #[test]
    fn test_stream_roundtrip() {
        let env = envelope("pw");
        let content = vec![0xABu8; 200_000];

        let sealed = env.seal_stream(&content[..]).unwrap();
        let mut restored = Vec::new();
        let written = env.open_stream(&sealed[..], &mut restored).unwrap();

        assert_eq!(written, content.len() as u64);
        assert_eq!(restored, content);
    }

    #[test]
    fn test_open_stream_writes_nothing_on_tamper() {
        let env = envelope("pw");
        let mut sealed = env.seal_stream(&b"file body"[..]).unwrap();
        sealed[0] ^= 0x01;

        let mut out = Vec::new();
        assert!(env.open_stream(&sealed[..], &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_debug_is_redacted() {
        assert_eq!(format!("{:?}", envelope("pw")), "Envelope([REDACTED])");
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            password in ".{0,32}",
            data in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let env = envelope(&password);
            let sealed = env.seal(&data).unwrap();
            prop_assert_eq!(env.open(&sealed).unwrap(), data);
        }

        #[test]
        fn prop_any_bit_flip_is_rejected(
            data in proptest::collection::vec(any::<u8>(), 0..128),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let env = envelope("tamper");
            let mut sealed = env.seal(&data).unwrap();
            let at = index.index(sealed.len());
            sealed[at] ^= 1 << bit;

            prop_assert!(env.open(&sealed).is_err());
        }

        #[test]
        fn prop_distinct_plaintexts_distinct_ciphertexts(
            a in proptest::collection::vec(any::<u8>(), 0..64),
            b in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            prop_assume!(a != b);
            let env = envelope("distinct");
            prop_assert_ne!(env.seal(&a).unwrap(), env.seal(&b).unwrap());
        }
    }
}
