//! Error types and result aliases for remote import operations.
//!
//! Provides a unified error type that covers every failure the resolution
//! pipeline can report, with actionable messages. Errors are `Clone` so that
//! coalesced fetches can hand the same outcome to every waiting requester.

use thiserror::Error;

/// Unified error type for all remote import operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    // Backend errors
    #[error("Remote object not found: {location}")]
    NotFound { location: String },

    #[error("Transport error talking to {backend} at {location}: {message}")]
    Transport {
        backend: String,
        location: String,
        message: String,
    },

    #[error("{backend} returned status {status} for {location}")]
    Remote {
        backend: String,
        location: String,
        status: u16,
        transient: bool,
    },

    // Registry errors
    #[error("Namespace prefix '{prefix}' is already registered")]
    DuplicatePrefix { prefix: String },

    // Cache errors
    #[error("Cache entry {key} is corrupt: {reason}")]
    CacheCorruption { key: String, reason: String },

    // Resolution errors
    #[error("Failed to import '{module}' from {backend} ({location}): {message}")]
    RemoteImport {
        module: String,
        backend: String,
        location: String,
        message: String,
    },

    #[error("No module named '{module}'")]
    ModuleNotFound { module: String },

    #[error("Invalid module path '{path}': {reason}")]
    InvalidModulePath { path: String, reason: String },

    #[error("Invalid remote location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    // Config errors
    #[error("Failed to parse {file}: {message} at line {line}, column {column}")]
    ConfigParse {
        file: String,
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // Host runtime errors
    #[error("Host runtime rejected module '{module}': {message}")]
    Host { module: String, message: String },

    // IO errors
    #[error("IO error: {message}: {detail}")]
    Io { message: String, detail: String },
}

/// Result type alias for remote import operations
pub type ImportResult<T> = Result<T, ImportError>;

impl ImportError {
    /// Create a transport error from any error type
    pub fn transport<E>(backend: &str, location: &str, source: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::Transport {
            backend: backend.to_string(),
            location: location.to_string(),
            message: source.to_string(),
        }
    }

    /// Create a not-found error for a remote location
    pub fn not_found(location: impl Into<String>) -> Self {
        Self::NotFound {
            location: location.into(),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io {
            message,
            detail: source.to_string(),
        }
    }

    /// Check if this error is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            ImportError::Transport { .. } => true,
            ImportError::Remote { transient, .. } => *transient,
            _ => false,
        }
    }

    /// Check if this error means "the remote does not have it"
    pub fn is_not_found(&self) -> bool {
        matches!(self, ImportError::NotFound { .. })
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ImportError::NotFound { .. } | ImportError::ModuleNotFound { .. } => {
                Some("Check the module name spelling and the registered base location")
            },
            ImportError::Transport { .. } => {
                Some("Check your network connection and the backend credentials")
            },
            ImportError::DuplicatePrefix { .. } => {
                Some("Unregister the existing namespace or register with reload enabled")
            },
            ImportError::CacheCorruption { .. } => {
                Some("Run 'rimport cache clear' to drop the local cache")
            },
            ImportError::InvalidLocation { .. } => Some(
                "Use one of http(s)://, s3://bucket/prefix, github://owner:repo@/path or ssh://host/path",
            ),
            _ => None,
        }
    }
}
