//! CipherKeep sync client.
//!
//! This module provides:
//! - `SyncClient`, the only component that speaks the server protocol and
//!   the only one that seals plaintext taken from the user
//! - `ListPoller`, a cancellable background refresh of one record list
//! - `ClientConfig`, the client settings
//!
//! Every call takes the `VaultSession` it works for explicitly; there is no
//! process-wide session.

pub mod client;
pub mod config;
pub mod poller;

pub use client::SyncClient;
pub use config::{ClientConfig, DEFAULT_SERVER_URL};
pub use poller::{ListPoller, PollOutcome, Snapshot};
