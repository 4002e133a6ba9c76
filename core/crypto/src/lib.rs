//! Envelope service for CipherKeep.
//!
//! This module provides:
//! - Master key derivation from the user's password (BLAKE2b-256)
//! - A per-session `Envelope` that seals and opens byte buffers with
//!   XChaCha20-Poly1305
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - `open` is the sole integrity check: any tampering fails the tag

pub mod envelope;
pub mod kdf;
pub mod keys;

pub use envelope::{Envelope, NONCE_SIZE, TAG_SIZE};
pub use kdf::derive_master_key;
pub use keys::{MasterKey, KEY_LENGTH};
