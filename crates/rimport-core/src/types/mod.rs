//! Core data types for remote imports.
//!
//! This module provides the fundamental types passed through the pipeline:
//! - Module paths and namespace prefixes
//! - Backend locations and configuration
//! - Fetch results, fingerprints and loadable units

pub mod backend;
pub mod fetch;
pub mod fingerprint;
pub mod module_path;

// Re-export all public types
pub use backend::{BackendConfig, BackendLocation, Credentials, HostingService, Scheme, Secret};
pub use fetch::{FetchResult, LoadableUnit, ProbeMode, ResolutionRequest};
pub use fingerprint::Fingerprint;
pub use module_path::ModulePath;
