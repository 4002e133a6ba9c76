//! Session credentials.
//!
//! A credential is `base64url(claims) "." base64url(mac)` where the claims
//! carry the user id and an absolute expiry, and the MAC is a keyed
//! BLAKE2b over the encoded claims. The key is random per server process,
//! so a restart signs everyone out.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use blake2::digest::consts::U32;
use blake2::digest::{KeyInit, Mac};
use blake2::Blake2bMac;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::debug;

use cipherkeep_common::{Error, Result, SensitiveBytes, UserId};

/// MAC key length in bytes.
pub const GUARD_KEY_LENGTH: usize = 32;

type SessionMac = Blake2bMac<U32>;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    uid: i64,
    exp: i64,
}

/// Issues and verifies session credentials.
pub struct SessionGuard {
    key: SensitiveBytes,
    ttl: Duration,
}

impl SessionGuard {
    /// Create a guard with a fresh random key.
    pub fn new(ttl: std::time::Duration) -> Result<Self> {
        let mut key = vec![0u8; GUARD_KEY_LENGTH];
        OsRng.fill_bytes(&mut key);
        Self::with_key(key, ttl)
    }

    /// Create a guard with a caller-provided key.
    ///
    /// # Errors
    /// - `Error::InvalidInput` if the key is not `GUARD_KEY_LENGTH` bytes
    ///   or the lifetime does not fit a timestamp
    pub fn with_key(key: Vec<u8>, ttl: std::time::Duration) -> Result<Self> {
        if key.len() != GUARD_KEY_LENGTH {
            return Err(Error::InvalidInput(format!(
                "Session key must be {} bytes",
                GUARD_KEY_LENGTH
            )));
        }
        let ttl = Duration::from_std(ttl)
            .map_err(|e| Error::InvalidInput(format!("Invalid session lifetime: {}", e)))?;

        Ok(Self {
            key: SensitiveBytes::new(key),
            ttl,
        })
    }

    /// Lifetime of issued credentials.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn tag(&self, message: &[u8]) -> Result<Vec<u8>> {
        let mut mac = <SessionMac as KeyInit>::new_from_slice(self.key.as_bytes())
            .map_err(|e| Error::Crypto(format!("Invalid session key: {}", e)))?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Issue a credential for `user`, valid for the guard's lifetime.
    pub fn issue(&self, user: UserId) -> Result<String> {
        self.issue_expiring(user, Utc::now() + self.ttl)
    }

    /// Issue a credential for `user` that expires at `expires_at`.
    pub fn issue_expiring(&self, user: UserId, expires_at: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            uid: user.get(),
            exp: expires_at.timestamp(),
        };
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let tag = URL_SAFE_NO_PAD.encode(self.tag(body.as_bytes())?);

        debug!(user = %user, "Session issued");
        Ok(format!("{}.{}", body, tag))
    }

    /// Check a credential and return the user it was issued to.
    ///
    /// # Errors
    /// - `Error::Unauthorized` for malformed, tampered, or expired
    ///   credentials
    pub fn verify(&self, credential: &str) -> Result<UserId> {
        let (body, tag) = credential.split_once('.').ok_or(Error::Unauthorized)?;

        let presented = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| Error::Unauthorized)?;
        let expected = self.tag(body.as_bytes())?;
        if !bool::from(expected.as_slice().ct_eq(presented.as_slice())) {
            debug!("Session tag mismatch");
            return Err(Error::Unauthorized);
        }

        let claims: Claims = URL_SAFE_NO_PAD
            .decode(body)
            .ok()
            .and_then(|raw| serde_json::from_slice(&raw).ok())
            .ok_or(Error::Unauthorized)?;

        if claims.exp <= Utc::now().timestamp() {
            debug!(user = claims.uid, "Session expired");
            return Err(Error::Unauthorized);
        }

        Ok(UserId::new(claims.uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> SessionGuard {
        SessionGuard::new(std::time::Duration::from_secs(3600)).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let guard = guard();
        let credential = guard.issue(UserId::new(7)).unwrap();
        assert_eq!(guard.verify(&credential).unwrap(), UserId::new(7));
    }

    #[test]
    fn test_expired_credential_rejected() {
        let guard = guard();
        let credential = guard
            .issue_expiring(UserId::new(7), Utc::now() - Duration::seconds(1))
            .unwrap();
        assert!(matches!(guard.verify(&credential), Err(Error::Unauthorized)));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let guard = guard();
        let credential = guard.issue(UserId::new(7)).unwrap();
        let (_, tag) = credential.split_once('.').unwrap();

        let forged_claims = URL_SAFE_NO_PAD.encode(br#"{"uid":8,"exp":99999999999}"#);
        let forged = format!("{}.{}", forged_claims, tag);
        assert!(matches!(guard.verify(&forged), Err(Error::Unauthorized)));
    }

    #[test]
    fn test_other_key_rejected() {
        let credential = guard().issue(UserId::new(1)).unwrap();
        assert!(matches!(guard().verify(&credential), Err(Error::Unauthorized)));
    }

    #[test]
    fn test_malformed_rejected() {
        let guard = guard();
        for bad in ["", "abc", "a.b", "...", "e30.!!!"] {
            assert!(matches!(guard.verify(bad), Err(Error::Unauthorized)));
        }
    }

    #[test]
    fn test_key_length_checked() {
        let result = SessionGuard::with_key(vec![0u8; 16], std::time::Duration::from_secs(1));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
