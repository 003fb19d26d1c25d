//! rimport.toml parsing and validation

use camino::{Utf8Path, Utf8PathBuf};
use rimport_core::{BackendLocation, ImportError, ModulePath};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::options::{Defaults, RemoteOptions};
use crate::ConfigResult;

/// Complete rimport.toml configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    /// Cache settings
    #[serde(default)]
    pub cache: CacheSection,

    /// Settings shared by every remote
    #[serde(default)]
    pub defaults: DefaultsSection,

    /// Declared remotes, registered in file order
    #[serde(default)]
    pub remotes: Vec<RemoteSection>,
}

/// `[cache]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    /// Cache root directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<Utf8PathBuf>,

    /// Default freshness window in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

/// `[defaults]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub implicit_namespace: Option<bool>,
}

/// One `[[remotes]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteSection {
    /// Namespace prefixes served by this remote
    pub namespaces: Vec<String>,

    /// Base location URI
    pub location: String,

    #[serde(default)]
    pub options: RemoteOptions,
}

impl ImportConfig {
    /// Settings applied to remotes that do not override them
    pub fn defaults(&self) -> Defaults {
        let base = Defaults::default();
        Defaults {
            cache_ttl: self.cache.ttl.map(Duration::from_secs).unwrap_or(base.cache_ttl),
            retries: self.defaults.retries.unwrap_or(base.retries),
            implicit_namespace: self.defaults.implicit_namespace.unwrap_or(base.implicit_namespace),
        }
    }
}

impl RemoteSection {
    /// Parsed namespace prefixes
    pub fn namespace_paths(&self) -> ConfigResult<Vec<ModulePath>> {
        self.namespaces.iter().map(|ns| ModulePath::parse(ns)).collect()
    }
}

/// Parse TOML string to an ImportConfig
pub fn parse_config(content: &str, file: &str) -> ConfigResult<ImportConfig> {
    let config: ImportConfig = ::toml::from_str(content).map_err(|e| {
        let (line, column) = e
            .span()
            .map(|span| line_column(content, span.start))
            .unwrap_or((0, 0));
        ImportError::ConfigParse {
            file: file.to_string(),
            message: e.message().to_string(),
            line,
            column,
        }
    })?;

    validate_config(&config)?;

    Ok(config)
}

/// Serialize an ImportConfig to a TOML string
pub fn serialize_config(config: &ImportConfig) -> ConfigResult<String> {
    ::toml::to_string_pretty(config).map_err(|e| ImportError::ConfigValidation {
        field: "config".to_string(),
        reason: format!("TOML serialization error: {}", e),
    })
}

/// Validate configuration completeness
pub fn validate_config(config: &ImportConfig) -> ConfigResult<()> {
    for (i, remote) in config.remotes.iter().enumerate() {
        if remote.namespaces.is_empty() {
            return Err(ImportError::ConfigValidation {
                field: format!("remotes[{}].namespaces", i),
                reason: "at least one namespace is required".to_string(),
            });
        }

        for (j, namespace) in remote.namespaces.iter().enumerate() {
            ModulePath::parse(namespace).map_err(|e| ImportError::ConfigValidation {
                field: format!("remotes[{}].namespaces[{}]", i, j),
                reason: e.to_string(),
            })?;
        }

        BackendLocation::parse(&remote.location).map_err(|e| ImportError::ConfigValidation {
            field: format!("remotes[{}].location", i),
            reason: e.to_string(),
        })?;

        if remote.options.timeout == Some(0) {
            return Err(ImportError::ConfigValidation {
                field: format!("remotes[{}].options.timeout", i),
                reason: "timeout must be at least one second".to_string(),
            });
        }
    }

    Ok(())
}

/// Load and parse rimport.toml from file path
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<ImportConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ImportError::io(format!("Failed to read {}", path), e))?;

    parse_config(&content, path.as_str())
}

/// 1-based line and column of a byte offset
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset.min(content.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}
