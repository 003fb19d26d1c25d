//! Remote module loading for a host runtime
//!
//! This crate provides the namespace registry, the loader hook that resolves
//! registered namespaces through the artifact cache and fetch backends, the
//! ordered resolver chain in front of the host's module table, and the
//! `RemoteImporter` registration facade.

pub mod hook;
pub mod host;
pub mod namespace;
pub mod remote;
pub mod resolver;

// Re-export main types
pub use hook::RemoteLoader;
pub use host::{ModuleHost, ModuleTable};
pub use namespace::{LoadPolicy, NamespaceBinding, NamespaceRegistry, OverlapPolicy};
pub use remote::RemoteImporter;
pub use resolver::{ImportSystem, Resolution, Resolver};

use rimport_core::ImportError;

/// Result type for loader operations
pub type LoaderResult<T> = Result<T, ImportError>;
