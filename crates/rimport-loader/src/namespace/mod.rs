//! Namespace registry: which prefixes are served by which backend

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rimport_backend::RetryConfig;
use rimport_config::{Defaults, RemoteOptions};
use rimport_core::{BackendConfig, ImportError, ModulePath};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::LoaderResult;

static GLOBAL: Lazy<Arc<NamespaceRegistry>> = Lazy::new(|| Arc::new(NamespaceRegistry::new()));

/// Per-binding load behaviour
#[derive(Debug, Clone, PartialEq)]
pub struct LoadPolicy {
    /// Freshness window for cached entries
    pub ttl: Duration,
    /// Retry schedule for transient fetch failures
    pub retry: RetryConfig,
    /// Treat a namespace root with no initializer as an empty package
    pub implicit_namespace: bool,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self::from_options(&RemoteOptions::default(), &Defaults::default())
    }
}

impl LoadPolicy {
    pub fn from_options(options: &RemoteOptions, defaults: &Defaults) -> Self {
        Self {
            ttl: options.cache_ttl_or(defaults),
            retry: RetryConfig::with_max_retries(options.retries_or(defaults)),
            implicit_namespace: options.implicit_namespace_or(defaults),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_implicit_namespace(mut self, enabled: bool) -> Self {
        self.implicit_namespace = enabled;
        self
    }
}

/// A prefix served by one backend
#[derive(Debug, Clone)]
pub struct NamespaceBinding {
    pub prefix: ModulePath,
    pub backend: Arc<BackendConfig>,
    pub policy: LoadPolicy,
}

impl NamespaceBinding {
    pub fn new(prefix: ModulePath, backend: Arc<BackendConfig>, policy: LoadPolicy) -> Self {
        Self { prefix, backend, policy }
    }

    pub fn matches(&self, module: &ModulePath) -> bool {
        module.starts_with(&self.prefix)
    }
}

/// What to do when a prefix is registered twice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Keep both; they are tried in registration order
    #[default]
    Append,
    /// Reject the second registration with `DuplicatePrefix`
    Forbid,
}

/// Ordered set of namespace bindings
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    bindings: RwLock<Vec<NamespaceBinding>>,
    overlap: OverlapPolicy,
}

impl NamespaceRegistry {
    /// Create an empty registry that appends duplicate prefixes
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overlap_policy(overlap: OverlapPolicy) -> Self {
        Self {
            bindings: RwLock::new(Vec::new()),
            overlap,
        }
    }

    /// Process-wide registry for callers that do not inject their own
    pub fn global() -> Arc<NamespaceRegistry> {
        Arc::clone(&GLOBAL)
    }

    pub fn overlap_policy(&self) -> OverlapPolicy {
        self.overlap
    }

    /// Add a binding
    pub fn register(&self, prefix: ModulePath, backend: Arc<BackendConfig>, policy: LoadPolicy) -> LoaderResult<()> {
        let mut bindings = self.bindings.write();

        if self.overlap == OverlapPolicy::Forbid && bindings.iter().any(|b| b.prefix == prefix) {
            return Err(ImportError::DuplicatePrefix {
                prefix: prefix.to_string(),
            });
        }

        debug!(prefix = %prefix, backend = %backend, "registered namespace");
        bindings.push(NamespaceBinding::new(prefix, backend, policy));
        Ok(())
    }

    /// Swap every binding for `prefix` with a single new one.
    /// Returns how many bindings were replaced.
    pub fn replace(&self, prefix: ModulePath, backend: Arc<BackendConfig>, policy: LoadPolicy) -> usize {
        let mut bindings = self.bindings.write();
        let before = bindings.len();
        bindings.retain(|b| b.prefix != prefix);
        let replaced = before - bindings.len();

        debug!(prefix = %prefix, backend = %backend, replaced, "replaced namespace");
        bindings.push(NamespaceBinding::new(prefix, backend, policy));
        replaced
    }

    /// Most specific binding for `module`; earliest registration wins ties
    pub fn lookup(&self, module: &ModulePath) -> Option<NamespaceBinding> {
        self.candidates(module).into_iter().next()
    }

    /// Every binding matching `module`, longest prefix first, then
    /// registration order
    pub fn candidates(&self, module: &ModulePath) -> Vec<NamespaceBinding> {
        let mut matching: Vec<NamespaceBinding> = self
            .bindings
            .read()
            .iter()
            .filter(|b| b.matches(module))
            .cloned()
            .collect();

        // Stable sort keeps registration order among equal lengths
        matching.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        matching
    }

    /// Remove all bindings for `prefix`; returns how many were removed
    pub fn unregister(&self, prefix: &ModulePath) -> usize {
        let mut bindings = self.bindings.write();
        let before = bindings.len();
        bindings.retain(|b| b.prefix != *prefix);
        before - bindings.len()
    }

    pub fn contains(&self, prefix: &ModulePath) -> bool {
        self.bindings.read().iter().any(|b| b.prefix == *prefix)
    }

    /// Registered prefixes, deduplicated, in registration order
    pub fn namespaces(&self) -> Vec<ModulePath> {
        let mut seen = Vec::new();
        for binding in self.bindings.read().iter() {
            if !seen.contains(&binding.prefix) {
                seen.push(binding.prefix.clone());
            }
        }
        seen
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }
}
