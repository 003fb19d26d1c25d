//! Utility functions and helpers.
//!
//! Common functionality used across multiple rimport crates.

pub mod hash;
pub mod path;

// Re-export commonly used utilities
pub use hash::{key_digest, verify_fingerprint};
pub use path::{join_url, sanitize_url};
