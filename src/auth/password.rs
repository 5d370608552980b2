//! Salted PBKDF2 password hashing.
//!
//! Stored hashes use the `salt:derivedKeyHex` encoding, where `salt` is the hex
//! form of 16 random bytes and the key is 64 bytes of PBKDF2-HMAC-SHA512 over
//! 100 000 rounds. The salt string itself (not its decoded bytes) feeds the KDF,
//! which keeps the format compatible with hashes written by earlier deployments.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use subtle::ConstantTimeEq;

/// PBKDF2 iteration count.
pub const PBKDF2_ROUNDS: u32 = 100_000;
/// Length of the derived key in bytes.
pub const KEY_LEN: usize = 64;
/// Length of the random salt in bytes (before hex encoding).
pub const SALT_LEN: usize = 16;

/// Derives and verifies salted password hashes.
///
/// Both operations are CPU-bound and deliberately slow; async callers should
/// run them on a blocking thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordHasher;

impl PasswordHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hashes `password` with a fresh random salt.
    pub fn hash(&self, password: &str) -> String {
        let salt = hex::encode(rand::random::<[u8; SALT_LEN]>());
        let key = derive(password, &salt);
        format!("{}:{}", salt, hex::encode(key))
    }

    /// Checks `password` against a stored `salt:derivedKeyHex` value.
    ///
    /// Malformed stored values and length mismatches yield `false`.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let Some((salt, stored_hex)) = encoded.split_once(':') else {
            return false;
        };
        if salt.is_empty() || stored_hex.is_empty() {
            return false;
        }
        let Ok(stored) = hex::decode(stored_hex) else {
            return false;
        };
        if stored.len() != KEY_LEN {
            return false;
        }

        let derived = derive(password, salt);
        derived.as_slice().ct_eq(stored.as_slice()).into()
    }
}

fn derive(password: &str, salt: &str) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha512>(password.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut key);
    key
}
