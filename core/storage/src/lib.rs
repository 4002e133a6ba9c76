//! Server-side persistence for CipherKeep.
//!
//! This module provides a trait-based interface over the record database
//! (accounts, logins, cards, file metadata) with in-memory and SQLite
//! backends, plus the filesystem blob store holding uploaded ciphertext.
//!
//! # Design Principles
//! - The store never sees plaintext: every payload field except ids is
//!   hex-encoded ciphertext produced by the client
//! - Owner isolation: every record operation is scoped to a user id
//! - Async operations: all I/O is async, blocking database calls run on
//!   the blocking pool

pub mod blob;
pub mod memory;
pub mod records;
pub mod sqlite;

pub use blob::{BlobPath, BlobStore, MAX_ALLOCATION_ATTEMPTS};
pub use memory::MemoryRecordStore;
pub use records::{RecordStore, StoredFile, StoredUser, USERNAME_TAKEN};
pub use sqlite::SqliteRecordStore;
