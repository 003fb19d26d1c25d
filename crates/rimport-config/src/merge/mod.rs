//! Configuration discovery, fallback logic, and environment overrides

use camino::{Utf8Path, Utf8PathBuf};
use rimport_core::ImportError;
use std::collections::HashMap;
use tracing::debug;

use crate::toml::{load_from_file, ImportConfig};
use crate::ConfigResult;

/// Project configuration file name
pub const CONFIG_FILE: &str = "rimport.toml";

const ENV_PREFIX: &str = "RIMPORT_";

/// Main configuration loading interface
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// File named on the command line
    Explicit(Utf8PathBuf),
    /// rimport.toml in the working directory or one of its parents
    Project(Utf8PathBuf),
    /// Per-user config file
    Global(Utf8PathBuf),
    /// No file found
    Default,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(cwd: Utf8PathBuf) -> Self {
        Self { cwd }
    }

    /// Loader rooted at the process working directory
    pub fn from_current_dir() -> ConfigResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| ImportError::io("Failed to read current directory".to_string(), e))?;
        let cwd = Utf8PathBuf::try_from(cwd).map_err(|e| ImportError::ConfigValidation {
            field: "cwd".to_string(),
            reason: format!("Working directory is not valid UTF-8: {}", e),
        })?;
        Ok(Self::new(cwd))
    }

    /// Load the effective configuration: explicit file, else the nearest
    /// project file, else the per-user file, else defaults. Environment
    /// overrides are applied last.
    pub async fn load(&self, explicit: Option<&Utf8Path>) -> ConfigResult<(ImportConfig, ConfigSource)> {
        let (mut config, source) = match explicit {
            Some(path) => (load_from_file(path).await?, ConfigSource::Explicit(path.to_path_buf())),
            None => self.discover().await?,
        };

        apply_env_overrides(&mut config, &collect_env_overrides())?;

        debug!(source = ?source, remotes = config.remotes.len(), "loaded configuration");
        Ok((config, source))
    }

    async fn discover(&self) -> ConfigResult<(ImportConfig, ConfigSource)> {
        if let Some(path) = self.resolve_config_path(CONFIG_FILE) {
            let config = load_from_file(&path).await?;
            return Ok((config, ConfigSource::Project(path)));
        }

        if let Some(path) = global_config_path().filter(|p| p.exists()) {
            let config = load_from_file(&path).await?;
            return Ok((config, ConfigSource::Global(path)));
        }

        Ok((ImportConfig::default(), ConfigSource::Default))
    }

    /// Find a configuration file in the project (walks up directory tree)
    pub fn resolve_config_path(&self, filename: &str) -> Option<Utf8PathBuf> {
        self.cwd
            .ancestors()
            .map(|dir| dir.join(filename))
            .find(|candidate| candidate.is_file())
    }
}

/// Per-user configuration file, `<config_dir>/rimport/config.toml`
pub fn global_config_path() -> Option<Utf8PathBuf> {
    let dir = dirs::config_dir()?;
    let dir = Utf8PathBuf::try_from(dir).ok()?;
    Some(dir.join("rimport").join("config.toml"))
}

/// Default cache root, `<cache_dir>/rimport`
pub fn default_cache_dir() -> ConfigResult<Utf8PathBuf> {
    let dir = dirs::cache_dir().ok_or_else(|| ImportError::ConfigValidation {
        field: "cache.dir".to_string(),
        reason: "Could not determine the user cache directory".to_string(),
    })?;

    let dir = Utf8PathBuf::try_from(dir).map_err(|e| ImportError::ConfigValidation {
        field: "cache.dir".to_string(),
        reason: format!("Invalid cache directory path: {}", e),
    })?;

    Ok(dir.join("rimport"))
}

/// Collect RIMPORT_* environment variables
pub fn collect_env_overrides() -> HashMap<String, String> {
    std::env::vars().filter(|(key, _)| key.starts_with(ENV_PREFIX)).collect()
}

/// Apply environment variable overrides
pub fn apply_env_overrides(config: &mut ImportConfig, overrides: &HashMap<String, String>) -> ConfigResult<()> {
    for (key, value) in overrides {
        match key.as_str() {
            "RIMPORT_CACHE_DIR" => {
                config.cache.dir = Some(Utf8PathBuf::from(value));
            },
            "RIMPORT_CACHE_TTL" => {
                config.cache.ttl = Some(parse_number(key, value)?);
            },
            "RIMPORT_RETRIES" => {
                config.defaults.retries = Some(parse_number(key, value)?);
            },
            _ => {
                // Read elsewhere (e.g. RIMPORT_SSH_IDENTITY) or unknown
            },
        }
    }

    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| ImportError::ConfigValidation {
        field: key.to_string(),
        reason: format!("expected a non-negative integer, got '{}': {}", value, e),
    })
}
