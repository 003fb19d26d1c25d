//! Options accepted when registering a remote

use rimport_core::{BackendConfig, Credentials};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default freshness window for cached modules
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default number of retries for transient backend failures
pub const DEFAULT_RETRIES: u32 = 3;

/// Settings that apply to every remote unless overridden per remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Defaults {
    pub cache_ttl: Duration,
    pub retries: u32,
    /// Synthesize an empty package for a namespace root with no initializer
    pub implicit_namespace: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            retries: DEFAULT_RETRIES,
            implicit_namespace: true,
        }
    }
}

/// Per-remote options
///
/// Durations are whole seconds so the same struct reads straight out of a
/// `[remotes.options]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteOptions {
    /// Secrets for the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,

    /// Freshness window in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl: Option<u64>,

    /// Retries for transient failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    /// Extra request headers
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Source file suffix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,

    /// Per-request timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Object storage endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Object storage region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Hosting service API root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// ssh client binary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_command: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub implicit_namespace: Option<bool>,

    /// Resolve the namespace root before registering
    pub test_connection: bool,

    /// Replace an existing registration for the same namespace
    pub reload: bool,
}

impl RemoteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl.as_secs());
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.as_secs());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn with_ssh_command(mut self, command: impl Into<String>) -> Self {
        self.ssh_command = Some(command.into());
        self
    }

    pub fn with_implicit_namespace(mut self, enabled: bool) -> Self {
        self.implicit_namespace = Some(enabled);
        self
    }

    pub fn with_test_connection(mut self) -> Self {
        self.test_connection = true;
        self
    }

    pub fn with_reload(mut self) -> Self {
        self.reload = true;
        self
    }

    /// Effective freshness window
    pub fn cache_ttl_or(&self, defaults: &Defaults) -> Duration {
        self.cache_ttl.map(Duration::from_secs).unwrap_or(defaults.cache_ttl)
    }

    /// Effective retry count
    pub fn retries_or(&self, defaults: &Defaults) -> u32 {
        self.retries.unwrap_or(defaults.retries)
    }

    pub fn implicit_namespace_or(&self, defaults: &Defaults) -> bool {
        self.implicit_namespace.unwrap_or(defaults.implicit_namespace)
    }

    /// Fold the backend-facing options into a parsed backend config
    pub fn apply_to(&self, mut backend: BackendConfig) -> BackendConfig {
        if let Some(credentials) = &self.credentials {
            backend.credentials = Some(credentials.clone());
        }

        for (name, value) in &self.headers {
            backend.options.insert(format!("header.{}", name), value.clone());
        }

        let knobs = [
            ("suffix", self.suffix.clone()),
            ("timeout_secs", self.timeout.map(|t| t.to_string())),
            ("endpoint", self.endpoint.clone()),
            ("region", self.region.clone()),
            ("api_base", self.api_base.clone()),
            ("ssh_command", self.ssh_command.clone()),
        ];
        for (key, value) in knobs {
            if let Some(value) = value {
                backend.options.insert(key.to_string(), value);
            }
        }

        backend
    }
}
