//! Password hashing.
//!
//! Passwords are hashed with a single unsalted SHA-256 pass so that stored
//! digests stay comparable with records written by earlier deployments.
//! This is a weak scheme: identical passwords produce identical digests and
//! the hash is fast to brute-force. Moving to a salted KDF changes the stored
//! format and needs a migration of existing principals.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A hex-encoded SHA-256 password digest.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap an already-computed digest (as read from storage).
    pub fn from_stored(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// Get the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check a plaintext password against this digest.
    pub fn matches(&self, plain: &str) -> bool {
        hash_password(plain) == *self
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// Hash a plaintext password. Deterministic, one-way.
pub fn hash_password(plain: &str) -> PasswordHash {
    let digest = Sha256::digest(plain.as_bytes());
    PasswordHash(hex::encode(digest))
}
