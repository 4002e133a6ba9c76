//! Master key derivation.
//!
//! The key is a BLAKE2b-256 digest of the password under a fixed
//! personalisation tag. Derivation is deterministic: the same password
//! yields the same key on every device, which is what lets a user open
//! records sealed elsewhere.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use crate::keys::{MasterKey, KEY_LENGTH};

const DOMAIN_TAG: &[u8] = b"cipherkeep/master-key/v1";

/// Derive the session master key from a password.
///
/// # Postconditions
/// - Same password always gives the same key
/// - The password cannot be recovered from the key
///
/// Never fails; an empty password still derives a key. Rejecting blank
/// passwords is the job of credential validation.
pub fn derive_master_key(password: &[u8]) -> MasterKey {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(DOMAIN_TAG);
    hasher.update(password);

    let digest = hasher.finalize();
    let mut key = [0u8; KEY_LENGTH];
    key.copy_from_slice(&digest);
    MasterKey::from_bytes(key)
}
