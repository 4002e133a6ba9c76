//! Client session management.
//!
//! A session holds the envelope derived from the user's password for as
//! long as the user stays signed in. It is an ordinary value passed to
//! every sync call, never process-wide state, so two sessions can coexist
//! (e.g. in tests) without interfering.

use std::sync::Arc;
use tracing::debug;

use cipherkeep_common::{Error, Result};
use cipherkeep_crypto::{derive_master_key, Envelope};

use crate::records::Credentials;

/// State of the vault session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session is active and the envelope is available.
    Active,
    /// Session is locked, key material has been dropped.
    Locked,
}

/// Active client session.
///
/// The master key only lives inside the envelope and is zeroized when the
/// last reference to it is dropped.
#[derive(Debug)]
pub struct VaultSession {
    username: String,
    envelope: Option<Arc<Envelope>>,
    state: SessionState,
}

impl VaultSession {
    /// Derive the session envelope from the user's credentials.
    ///
    /// # Errors
    /// - Credentials fail validation
    pub fn unlock(credentials: &Credentials) -> Result<Self> {
        credentials.validate()?;

        let master_key = derive_master_key(credentials.password.as_bytes());
        let envelope = Envelope::open_session(&master_key);

        debug!(username = %credentials.username, "Session unlocked");

        Ok(Self {
            username: credentials.username.clone(),
            envelope: Some(Arc::new(envelope)),
            state: SessionState::Active,
        })
    }

    /// The account this session belongs to.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the envelope, if the session is active.
    ///
    /// # Errors
    /// - `Error::Unauthorized` if the session is locked
    pub fn envelope(&self) -> Result<Arc<Envelope>> {
        match self.state {
            SessionState::Active => self.envelope.clone().ok_or(Error::Unauthorized),
            SessionState::Locked => Err(Error::Unauthorized),
        }
    }

    /// Get the current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if session is active.
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Lock the session, dropping this session's reference to the key.
    pub fn lock(&mut self) {
        self.envelope = None;
        self.state = SessionState::Locked;
    }
}
