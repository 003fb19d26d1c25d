//! Registration facade tying registry, cache, backends and host together

use camino::Utf8Path;
use rimport_backend::{Dispatcher, Fetch};
use rimport_cache::ArtifactCache;
use rimport_config::{default_cache_dir, Defaults, ImportConfig, RemoteOptions};
use rimport_core::{BackendConfig, ImportError, LoadableUnit, ModulePath, ResolutionRequest};
use std::sync::Arc;
use tracing::{info, warn};

use crate::hook::RemoteLoader;
use crate::host::{ModuleHost, ModuleTable};
use crate::namespace::{LoadPolicy, NamespaceBinding, NamespaceRegistry};
use crate::resolver::{ImportSystem, Resolution};
use crate::LoaderResult;

/// Entry point for registering remotes and importing from them
pub struct RemoteImporter {
    registry: Arc<NamespaceRegistry>,
    cache: Arc<ArtifactCache>,
    loader: Arc<RemoteLoader>,
    system: ImportSystem,
    defaults: Defaults,
}

impl RemoteImporter {
    /// Assemble an importer from its parts
    pub fn new(
        registry: Arc<NamespaceRegistry>,
        cache: Arc<ArtifactCache>,
        fetcher: Arc<dyn Fetch>,
        host: Arc<dyn ModuleHost>,
        defaults: Defaults,
    ) -> Self {
        let loader = Arc::new(RemoteLoader::new(registry.clone(), cache.clone(), fetcher));
        let system = ImportSystem::new(host).with_resolver(loader.clone());
        Self {
            registry,
            cache,
            loader,
            system,
            defaults,
        }
    }

    /// Importer over the process-wide registry, real backends and an
    /// in-process module table
    pub fn open(cache_root: &Utf8Path, defaults: Defaults) -> LoaderResult<Self> {
        let cache = Arc::new(ArtifactCache::new(cache_root)?);
        let fetcher = Arc::new(Dispatcher::new()?);
        Ok(Self::new(
            NamespaceRegistry::global(),
            cache,
            fetcher,
            Arc::new(ModuleTable::new()),
            defaults,
        ))
    }

    /// Build an importer from a loaded configuration, registering every
    /// declared remote in file order
    pub async fn from_config(config: &ImportConfig) -> LoaderResult<Self> {
        let cache_root = match &config.cache.dir {
            Some(dir) => dir.clone(),
            None => default_cache_dir()?,
        };

        let cache = Arc::new(ArtifactCache::new(&cache_root)?);
        let fetcher = Arc::new(Dispatcher::new()?);
        let importer = Self::new(
            Arc::new(NamespaceRegistry::new()),
            cache,
            fetcher,
            Arc::new(ModuleTable::new()),
            config.defaults(),
        );

        for remote in &config.remotes {
            let namespaces: Vec<&str> = remote.namespaces.iter().map(String::as_str).collect();
            importer
                .add_remote(&namespaces, &remote.location, remote.options.clone())
                .await?;
        }

        Ok(importer)
    }

    pub fn registry(&self) -> &Arc<NamespaceRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    pub fn loader(&self) -> &Arc<RemoteLoader> {
        &self.loader
    }

    pub fn host(&self) -> &Arc<dyn ModuleHost> {
        self.system.host()
    }

    pub fn system(&self) -> &ImportSystem {
        &self.system
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Serve `namespaces` from `base_location`.
    ///
    /// With `test_connection` every namespace root is resolved first and
    /// nothing is registered if one fails. The root must exist on the
    /// remote as an initializer or module file; an implicit namespace
    /// package does not count. With `reload` an existing
    /// registration is replaced and its cached and installed modules are
    /// dropped; otherwise a second registration is appended behind the first.
    pub async fn add_remote(&self, namespaces: &[&str], base_location: &str, options: RemoteOptions) -> LoaderResult<()> {
        if namespaces.is_empty() {
            return Err(ImportError::ConfigValidation {
                field: "namespaces".to_string(),
                reason: "at least one namespace is required".to_string(),
            });
        }

        let prefixes = namespaces
            .iter()
            .map(|ns| ModulePath::parse(ns))
            .collect::<LoaderResult<Vec<_>>>()?;
        let backend = Arc::new(options.apply_to(BackendConfig::parse(base_location)?));
        let policy = LoadPolicy::from_options(&options, &self.defaults);

        if options.test_connection {
            for prefix in &prefixes {
                let strict = policy.clone().with_implicit_namespace(false);
                self.test_connection(NamespaceBinding::new(prefix.clone(), backend.clone(), strict))
                    .await?;
            }
        }

        for prefix in prefixes {
            if options.reload && self.registry.contains(&prefix) {
                self.registry.replace(prefix.clone(), backend.clone(), policy.clone());
                let evicted = self.cache.invalidate_prefix(&prefix)?;
                let unloaded = self.host().remove_prefix(&prefix);
                info!(namespace = %prefix, evicted, unloaded, "reloaded remote namespace");
                continue;
            }

            if self.registry.contains(&prefix) {
                warn!(namespace = %prefix, backend = %backend, "namespace already registered, appending");
            }
            self.registry.register(prefix.clone(), backend.clone(), policy.clone())?;
            info!(namespace = %prefix, backend = %backend, "registered remote namespace");
        }

        Ok(())
    }

    /// Remove every binding for `namespace`
    pub fn remove_remote(&self, namespace: &str) -> LoaderResult<usize> {
        Ok(self.registry.unregister(&ModulePath::parse(namespace)?))
    }

    /// Import a dotted module through the resolver chain
    pub async fn import(&self, module: &str) -> LoaderResult<Arc<LoadableUnit>> {
        self.system.import_str(module).await
    }

    /// Resolve a namespace root against one binding, warming the cache
    async fn test_connection(&self, binding: NamespaceBinding) -> LoaderResult<()> {
        let request = ResolutionRequest::new(binding.prefix.clone());
        match self.loader.resolve_in(std::slice::from_ref(&binding), &request).await? {
            Resolution::Loaded(_) => Ok(()),
            Resolution::NotOurs => Err(ImportError::RemoteImport {
                module: binding.prefix.to_string(),
                backend: binding.backend.scheme().to_string(),
                location: binding.backend.location.to_string(),
                message: "namespace root not found".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests;
