//! Content fingerprints.
//!
//! A fingerprint is the Blake3 hash of fetched bytes. It is used for change
//! detection on revalidation and to name cached blobs.

use crate::error::ImportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A Blake3 content fingerprint
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint {
    /// The raw hash bytes (32 bytes for Blake3)
    bytes: [u8; 32],
}

impl Fingerprint {
    /// Create a fingerprint from raw hash bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Fingerprint of a byte slice
    pub fn of(content: &[u8]) -> Self {
        Self::new(*blake3::hash(content).as_bytes())
    }

    /// Convert fingerprint to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Create a fingerprint from a hexadecimal string
    pub fn from_hex(hex_str: &str) -> Result<Self, ImportError> {
        let invalid = |reason: String| ImportError::CacheCorruption {
            key: "fingerprint".to_string(),
            reason,
        };
        let bytes = hex::decode(hex_str).map_err(|e| invalid(format!("invalid hex: {}", e)))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| invalid(format!("expected 32 bytes, got {}", v.len())))?;
        Ok(Self::new(array))
    }

    /// Check whether `content` hashes to this fingerprint
    pub fn matches(&self, content: &[u8]) -> bool {
        Self::of(content) == *self
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

impl FromStr for Fingerprint {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = ImportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.to_hex()
    }
}
