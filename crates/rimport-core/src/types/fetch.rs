//! Resolution requests, fetch results and loadable units.

use super::{Fingerprint, ModulePath};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which forms of a module a resolution may accept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// Package initializer first, then the plain module file
    #[default]
    Auto,
    /// Only `<path>/__init__.<suffix>`
    Package,
    /// Only `<path>.<suffix>`
    Module,
}

impl ProbeMode {
    /// Candidate forms in probing order; `true` means the package form
    pub fn forms(&self) -> &'static [bool] {
        match self {
            ProbeMode::Auto => &[true, false],
            ProbeMode::Package => &[true],
            ProbeMode::Module => &[false],
        }
    }
}

/// One import attempt for a module path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub module: ModulePath,
    pub probe: ProbeMode,
}

impl ResolutionRequest {
    pub fn new(module: ModulePath) -> Self {
        Self {
            module,
            probe: ProbeMode::Auto,
        }
    }

    pub fn with_probe(mut self, probe: ProbeMode) -> Self {
        self.probe = probe;
        self
    }
}

/// Bytes fetched from a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Raw source bytes
    pub bytes: Vec<u8>,
    /// Blake3 of `bytes`, computed once at construction
    pub fingerprint: Fingerprint,
    /// Absolute remote location the bytes came from
    pub source: String,
    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
    /// Whether the package form resolved
    pub is_package: bool,
}

impl FetchResult {
    pub fn new(bytes: Vec<u8>, source: impl Into<String>, is_package: bool) -> Self {
        let fingerprint = Fingerprint::of(&bytes);
        Self {
            bytes,
            fingerprint,
            source: source.into(),
            fetched_at: Utc::now(),
            is_package,
        }
    }
}

/// The assembled result handed to the host runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadableUnit {
    /// Fully qualified module path
    pub module: ModulePath,
    /// Source bytes to compile
    pub source: Vec<u8>,
    /// Resolved remote location, used as the unit's file name
    pub origin: String,
    /// Fingerprint of `source`
    pub fingerprint: Fingerprint,
    /// Whether the unit is a package
    pub is_package: bool,
    /// Where submodules of a package are looked up
    pub search_locations: Vec<String>,
}

impl LoadableUnit {
    /// Assemble a unit from fetched or cached bytes.
    ///
    /// `origin` is a display name only and never used to derive a
    /// package's search location; see [`LoadableUnit::with_search_location`].
    pub fn new(module: ModulePath, source: Vec<u8>, origin: String, is_package: bool) -> Self {
        let fingerprint = Fingerprint::of(&source);
        Self {
            module,
            source,
            origin,
            fingerprint,
            is_package,
            search_locations: Vec::new(),
        }
    }

    /// Set where submodules of a package are looked up; ignored for plain modules
    pub fn with_search_location(mut self, location: impl Into<String>) -> Self {
        if self.is_package {
            self.search_locations = vec![location.into()];
        }
        self
    }

    /// Source as text, replacing invalid UTF-8
    pub fn source_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.source)
    }
}
