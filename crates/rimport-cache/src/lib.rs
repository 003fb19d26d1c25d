//! Persistent artifact cache for remote imports
//!
//! Fetched module sources are stored on local disk, one entry per
//! (namespace prefix, module path) key. Each entry holds the raw bytes under
//! their fingerprint plus a small JSON metadata record. Writes go through a
//! staging directory and an atomic rename, so concurrent readers and other
//! processes sharing the store never observe a partially written entry.

pub mod entry;
pub mod key;
pub mod store;

// Re-export main types
pub use entry::CacheEntry;
pub use key::CacheKey;
pub use store::{ArtifactCache, CacheStats, PruneResult};

use rimport_core::ImportError;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, ImportError>;
