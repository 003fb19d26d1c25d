//! Configuration for remote module imports
//!
//! This crate handles the options accepted when a remote is registered and the
//! `rimport.toml` file that declares remotes and cache settings, including
//! file discovery and environment overrides.

pub mod merge;
pub mod options;
pub mod toml;

// Re-export main types
pub use merge::{default_cache_dir, ConfigLoader, ConfigSource};
pub use options::{Defaults, RemoteOptions, DEFAULT_CACHE_TTL, DEFAULT_RETRIES};
pub use toml::{CacheSection, DefaultsSection, ImportConfig, RemoteSection};

use rimport_core::ImportError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ImportError>;
