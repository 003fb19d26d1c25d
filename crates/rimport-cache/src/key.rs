//! Cache keys

use rimport_core::utils::key_digest;
use rimport_core::ModulePath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one cached module: the namespace it was resolved through, the
/// identity of the backend that served it and its full module path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub prefix: ModulePath,
    /// See `BackendConfig::identity`
    pub backend: String,
    pub module: ModulePath,
}

impl CacheKey {
    pub fn new(prefix: ModulePath, backend: impl Into<String>, module: ModulePath) -> Self {
        Self {
            prefix,
            backend: backend.into(),
            module,
        }
    }

    /// Stable, filesystem-safe digest naming the entry on disk
    pub fn digest(&self) -> String {
        key_digest(&[
            self.prefix.to_string().as_str(),
            self.backend.as_str(),
            self.module.to_string().as_str(),
        ])
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.prefix, self.module, self.backend)
    }
}
