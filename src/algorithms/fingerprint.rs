//! One-way fingerprints of normalized values
//!
//! A fingerprint is the lowercase hex SHA-256 digest of a normalized value's
//! UTF-8 bytes. There is no salt: two parties hashing the same normalized
//! value independently must arrive at the same digest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex digest of a normalized identifying value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash a normalized value. Empty values have no fingerprint.
    pub fn of(normalized: &str) -> Option<Self> {
        if normalized.is_empty() {
            return None;
        }
        let digest = Sha256::digest(normalized.as_bytes());
        Some(Self(hex::encode(digest)))
    }

    /// Wrap a digest read back from a hashed dataset.
    ///
    /// Blank input has no fingerprint; anything else is kept verbatim.
    pub fn from_hex(digest: impl Into<String>) -> Option<Self> {
        let digest = digest.into();
        let trimmed = digest.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == digest.len() {
            Some(Self(digest))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
