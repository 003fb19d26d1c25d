//! Ordered resolver chain in front of the host module table

use async_trait::async_trait;
use rimport_core::{ImportError, LoadableUnit, ModulePath, ResolutionRequest};
use std::sync::Arc;
use tracing::debug;

use crate::host::ModuleHost;
use crate::LoaderResult;

/// Outcome of asking one resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Loaded(LoadableUnit),
    /// The resolver does not serve this module; ask the next one
    NotOurs,
}

/// One link of the import chain
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn resolve(&self, request: &ResolutionRequest) -> LoaderResult<Resolution>;
}

/// Resolvers tried in order, with installed modules short-circuiting
pub struct ImportSystem {
    resolvers: Vec<Arc<dyn Resolver>>,
    host: Arc<dyn ModuleHost>,
}

impl ImportSystem {
    pub fn new(host: Arc<dyn ModuleHost>) -> Self {
        Self {
            resolvers: Vec::new(),
            host,
        }
    }

    /// Append a resolver to the end of the chain
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Put a resolver in front of the existing chain
    pub fn prepend_resolver(&mut self, resolver: Arc<dyn Resolver>) {
        self.resolvers.insert(0, resolver);
    }

    pub fn host(&self) -> &Arc<dyn ModuleHost> {
        &self.host
    }

    /// Import `module`, importing its parent packages first.
    ///
    /// A parent that no resolver serves is skipped rather than treated as an
    /// error, so a namespace such as `a.b` may be registered without `a`.
    pub async fn import(&self, module: &ModulePath) -> LoaderResult<Arc<LoadableUnit>> {
        let mut ancestors = Vec::new();
        let mut current = module.parent();
        while let Some(parent) = current {
            current = parent.parent();
            ancestors.push(parent);
        }

        for parent in ancestors.into_iter().rev() {
            match self.import_one(&parent).await {
                Ok(_) | Err(ImportError::ModuleNotFound { .. }) => {},
                Err(e) => return Err(e),
            }
        }

        self.import_one(module).await
    }

    /// Parse and import a dotted module name
    pub async fn import_str(&self, module: &str) -> LoaderResult<Arc<LoadableUnit>> {
        self.import(&ModulePath::parse(module)?).await
    }

    async fn import_one(&self, module: &ModulePath) -> LoaderResult<Arc<LoadableUnit>> {
        if let Some(unit) = self.host.get(module) {
            return Ok(unit);
        }

        let request = ResolutionRequest::new(module.clone());
        for resolver in &self.resolvers {
            match resolver.resolve(&request).await? {
                Resolution::Loaded(unit) => {
                    debug!(module = %module, resolver = resolver.name(), "resolved module");
                    return self.host.install(unit);
                },
                Resolution::NotOurs => continue,
            }
        }

        Err(ImportError::ModuleNotFound {
            module: module.to_string(),
        })
    }
}
