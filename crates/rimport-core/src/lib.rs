//! # rimport-core
//!
//! Core types and utilities shared across all rimport crates.
//!
//! This crate provides:
//! - `ModulePath` for dotted module names and namespace prefixes
//! - `BackendConfig` and the closed set of `BackendLocation` schemes
//! - `FetchResult`, `Fingerprint` and `LoadableUnit` passed between the pipeline stages
//! - `ImportError` enum for unified error handling
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (ModulePath, BackendConfig, FetchResult, etc.)
//! - `error`: Error types and result aliases
//! - `utils`: Hashing and URL/path helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{ImportError, ImportResult};
pub use types::{
    BackendConfig, BackendLocation, Credentials, FetchResult, Fingerprint, HostingService,
    LoadableUnit, ModulePath, ProbeMode, ResolutionRequest, Scheme, Secret,
};
