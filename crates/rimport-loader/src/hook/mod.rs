//! Loader hook: resolves registered namespaces through cache and backends
//!
//! For every candidate binding of a requested module the hook
//!
//! 1. consults the artifact cache and uses a fresh entry as is,
//! 2. otherwise fetches from the backend (one in-flight fetch per cache key,
//!    retried per the binding's policy) and refreshes the cache,
//! 3. assembles a `LoadableUnit` from the bytes.
//!
//! `NotFound` moves on to the next candidate. When every candidate misses the
//! request is declined so later resolvers in the chain can try.

use async_trait::async_trait;
use dashmap::DashMap;
use rimport_backend::{relative_file, with_retry, Fetch};
use rimport_cache::{ArtifactCache, CacheEntry, CacheKey};
use rimport_core::{FetchResult, ImportError, LoadableUnit, ModulePath, ProbeMode, ResolutionRequest};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::namespace::{NamespaceBinding, NamespaceRegistry};
use crate::resolver::{Resolution, Resolver};
use crate::LoaderResult;

type InFlight = Arc<OnceCell<LoaderResult<LoadableUnit>>>;

/// Import hook for remote namespaces
pub struct RemoteLoader {
    registry: Arc<NamespaceRegistry>,
    cache: Arc<ArtifactCache>,
    fetcher: Arc<dyn Fetch>,
    /// One cell per cache key and probe while a fetch is running
    in_flight: DashMap<String, InFlight>,
}

impl RemoteLoader {
    pub fn new(registry: Arc<NamespaceRegistry>, cache: Arc<ArtifactCache>, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            registry,
            cache,
            fetcher,
            in_flight: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<NamespaceRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// Resolve `request` against an explicit list of bindings, tried in order
    pub async fn resolve_in(
        &self,
        candidates: &[NamespaceBinding],
        request: &ResolutionRequest,
    ) -> LoaderResult<Resolution> {
        let module = &request.module;
        let mut failure = None;

        for binding in candidates {
            match self.load_from(binding, request).await {
                Ok(unit) => return Ok(Resolution::Loaded(unit)),
                Err(e) if e.is_not_found() => {
                    debug!(module = %module, prefix = %binding.prefix, "not found on candidate backend");
                },
                Err(e) => {
                    warn!(module = %module, prefix = %binding.prefix, error = %e, "candidate backend failed");
                    failure.get_or_insert(e);
                },
            }
        }

        if let Some(error) = failure {
            return Err(error);
        }

        // A namespace root without an initializer still imports, as an empty package
        if let Some(binding) = candidates
            .iter()
            .find(|b| b.prefix == *module && b.policy.implicit_namespace && request.probe != ProbeMode::Module)
        {
            debug!(module = %module, "synthesizing implicit namespace package");
            return Ok(Resolution::Loaded(implicit_package(binding, module)));
        }

        debug!(module = %module, "declining module");
        Ok(Resolution::NotOurs)
    }

    async fn load_from(&self, binding: &NamespaceBinding, request: &ResolutionRequest) -> LoaderResult<LoadableUnit> {
        let key = CacheKey::new(binding.prefix.clone(), binding.backend.identity(), request.module.clone());

        if let Some(entry) = self.fresh_entry(binding, request, &key)? {
            debug!(key = %key, "cache hit");
            return Ok(assemble(binding, &request.module, entry));
        }

        let slot = format!("{}:{:?}", key.digest(), request.probe);
        let cell = self.in_flight.entry(slot.clone()).or_default().clone();

        let result = cell
            .get_or_init(|| self.refresh(binding, request, &key))
            .await
            .clone();

        self.in_flight.remove_if(&slot, |_, current| Arc::ptr_eq(current, &cell));
        result
    }

    /// Cached entry usable without contacting the backend
    fn fresh_entry(
        &self,
        binding: &NamespaceBinding,
        request: &ResolutionRequest,
        key: &CacheKey,
    ) -> LoaderResult<Option<CacheEntry>> {
        Ok(self
            .cached(key)?
            .filter(|entry| entry.is_fresh(binding.policy.ttl) && accepts(request.probe, entry.is_package)))
    }

    /// Cache lookup that evicts corrupt entries and reports them as misses
    fn cached(&self, key: &CacheKey) -> LoaderResult<Option<CacheEntry>> {
        match self.cache.get(key) {
            Ok(entry) => Ok(entry),
            Err(e @ ImportError::CacheCorruption { .. }) => {
                warn!(key = %key, error = %e, "evicting corrupt cache entry");
                self.cache.invalidate(key)?;
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    async fn refresh(
        &self,
        binding: &NamespaceBinding,
        request: &ResolutionRequest,
        key: &CacheKey,
    ) -> LoaderResult<LoadableUnit> {
        // Another requester may have committed while this one waited
        if let Some(entry) = self.fresh_entry(binding, request, key)? {
            return Ok(assemble(binding, &request.module, entry));
        }
        let stale = self.cached(key)?;

        let fetched = with_retry(&binding.policy.retry, || {
            self.fetcher.fetch(&binding.backend, &request.module, request.probe)
        })
        .await;

        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) if e.is_not_found() => {
                if stale.is_some() {
                    debug!(key = %key, "remote copy gone, dropping cache entry");
                    self.cache.invalidate(key)?;
                }
                return Err(e);
            },
            Err(e) => {
                return Err(ImportError::RemoteImport {
                    module: request.module.to_string(),
                    backend: binding.backend.scheme().to_string(),
                    location: binding.backend.location.to_string(),
                    message: e.to_string(),
                })
            },
        };

        let unchanged = stale
            .as_ref()
            .map_or(false, |old| old.fingerprint == fetched.fingerprint && old.is_package == fetched.is_package);

        let stored = if unchanged {
            debug!(key = %key, "fingerprint unchanged, revalidating");
            match self.cache.touch(key, &fetched.fingerprint) {
                Ok(None) => self.cache.put(key, &fetched).map(Some),
                touched => touched,
            }
        } else {
            self.cache.put(key, &fetched).map(Some)
        };

        // The module still loads when the cache cannot be written
        let entry = stored.unwrap_or_else(|e| {
            warn!(key = %key, error = %e, "failed to cache fetched module");
            None
        });
        let unit = match entry {
            Some(entry) => assemble(binding, &request.module, entry),
            None => assemble_fetched(binding, &request.module, fetched),
        };

        info!(module = %unit.module, origin = %unit.origin, "loaded remote module");
        Ok(unit)
    }
}

#[async_trait]
impl Resolver for RemoteLoader {
    fn name(&self) -> &str {
        "remote"
    }

    async fn resolve(&self, request: &ResolutionRequest) -> LoaderResult<Resolution> {
        let candidates = self.registry.candidates(&request.module);
        if candidates.is_empty() {
            return Ok(Resolution::NotOurs);
        }
        self.resolve_in(&candidates, request).await
    }
}

fn accepts(probe: ProbeMode, is_package: bool) -> bool {
    match probe {
        ProbeMode::Auto => true,
        ProbeMode::Package => is_package,
        ProbeMode::Module => !is_package,
    }
}

fn assemble(binding: &NamespaceBinding, module: &ModulePath, entry: CacheEntry) -> LoadableUnit {
    LoadableUnit::new(module.clone(), entry.bytes, entry.source, entry.is_package)
        .with_search_location(package_location(binding, module))
}

fn assemble_fetched(binding: &NamespaceBinding, module: &ModulePath, fetched: FetchResult) -> LoadableUnit {
    LoadableUnit::new(module.clone(), fetched.bytes, fetched.source, fetched.is_package)
        .with_search_location(package_location(binding, module))
}

fn implicit_package(binding: &NamespaceBinding, module: &ModulePath) -> LoadableUnit {
    let file = relative_file(module, true, binding.backend.suffix());
    let origin = binding.backend.location.join(&file);
    LoadableUnit::new(module.clone(), Vec::new(), origin, true).with_search_location(package_location(binding, module))
}

/// Package directory under the binding's root, independent of the origin URL
/// the backend reported
fn package_location(binding: &NamespaceBinding, module: &ModulePath) -> String {
    binding.backend.location.join(&module.to_relative_path())
}
