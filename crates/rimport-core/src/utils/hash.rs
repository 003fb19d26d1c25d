//! Blake3 hashing utilities for cache keys and content integrity.

use crate::error::{ImportError, ImportResult};
use crate::types::Fingerprint;

/// Stable hex digest of a sequence of string parts.
///
/// Parts are separated by a NUL byte so `("a.b", "c")` and `("a", "b.c")`
/// produce different digests.
pub fn key_digest(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(&[0]);
        }
        hasher.update(part.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Verify data against an expected fingerprint
pub fn verify_fingerprint(data: &[u8], expected: &Fingerprint, key: &str) -> ImportResult<()> {
    let actual = Fingerprint::of(data);
    if actual == *expected {
        Ok(())
    } else {
        Err(ImportError::CacheCorruption {
            key: key.to_string(),
            reason: format!("expected fingerprint {}, got {}", expected, actual),
        })
    }
}
