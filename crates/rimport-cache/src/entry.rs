//! Cache entries and their on-disk metadata record

use chrono::{DateTime, Utc};
use rimport_core::{FetchResult, Fingerprint, ModulePath};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::CacheKey;

/// Metadata record stored next to the bytes as `meta.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EntryMeta {
    pub prefix: ModulePath,
    pub backend: String,
    pub module: ModulePath,
    pub fingerprint: Fingerprint,
    pub source: String,
    pub is_package: bool,
    pub size: u64,
    pub stored_at: DateTime<Utc>,
    pub last_validated: DateTime<Utc>,
}

impl EntryMeta {
    pub fn from_fetch(key: &CacheKey, fetched: &FetchResult) -> Self {
        let now = Utc::now();
        Self {
            prefix: key.prefix.clone(),
            backend: key.backend.clone(),
            module: key.module.clone(),
            fingerprint: fetched.fingerprint,
            source: fetched.source.clone(),
            is_package: fetched.is_package,
            size: fetched.bytes.len() as u64,
            stored_at: now,
            last_validated: now,
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        elapsed_since(self.last_validated) < ttl
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.prefix.clone(), self.backend.clone(), self.module.clone())
    }

    pub fn into_entry(self, bytes: Vec<u8>) -> CacheEntry {
        CacheEntry {
            key: self.key(),
            fingerprint: self.fingerprint,
            bytes,
            source: self.source,
            is_package: self.is_package,
            size: self.size,
            stored_at: self.stored_at,
            last_validated: self.last_validated,
        }
    }
}

/// A cached module source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub fingerprint: Fingerprint,
    pub bytes: Vec<u8>,
    /// Resolved remote location the bytes came from
    pub source: String,
    pub is_package: bool,
    /// Length of `bytes` as recorded at write time
    pub size: u64,
    pub stored_at: DateTime<Utc>,
    /// Last time the backend confirmed these bytes
    pub last_validated: DateTime<Utc>,
}

impl CacheEntry {
    /// Time since the entry was last validated; zero if the clock went backwards
    pub fn age(&self) -> Duration {
        elapsed_since(self.last_validated)
    }

    /// Check if the entry may be reused without contacting the backend
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Wall-clock time since `instant`, clamped at zero
pub(crate) fn elapsed_since(instant: DateTime<Utc>) -> Duration {
    (Utc::now() - instant).to_std().unwrap_or(Duration::ZERO)
}
