//! Host runtime seam: where resolved units are installed

use dashmap::DashMap;
use rimport_core::{LoadableUnit, ModulePath};
use std::sync::Arc;

use crate::LoaderResult;

/// The host runtime's module table.
///
/// `install` is handed every unit a resolver produces; compiling and executing
/// it is the host's business.
pub trait ModuleHost: Send + Sync {
    /// Register a unit. If the module is already present the existing unit is
    /// kept and returned.
    fn install(&self, unit: LoadableUnit) -> LoaderResult<Arc<LoadableUnit>>;

    fn get(&self, module: &ModulePath) -> Option<Arc<LoadableUnit>>;

    fn remove(&self, module: &ModulePath) -> Option<Arc<LoadableUnit>>;

    /// Drop every module under `prefix`, returning how many were removed
    fn remove_prefix(&self, prefix: &ModulePath) -> usize;
}

/// In-process module table
#[derive(Debug, Default)]
pub struct ModuleTable {
    modules: DashMap<ModulePath, Arc<LoadableUnit>>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Installed module paths, sorted
    pub fn modules(&self) -> Vec<ModulePath> {
        let mut modules: Vec<_> = self.modules.iter().map(|entry| entry.key().clone()).collect();
        modules.sort();
        modules
    }
}

impl ModuleHost for ModuleTable {
    fn install(&self, unit: LoadableUnit) -> LoaderResult<Arc<LoadableUnit>> {
        let installed = self
            .modules
            .entry(unit.module.clone())
            .or_insert_with(|| Arc::new(unit))
            .clone();
        Ok(installed)
    }

    fn get(&self, module: &ModulePath) -> Option<Arc<LoadableUnit>> {
        self.modules.get(module).map(|entry| Arc::clone(entry.value()))
    }

    fn remove(&self, module: &ModulePath) -> Option<Arc<LoadableUnit>> {
        self.modules.remove(module).map(|(_, unit)| unit)
    }

    fn remove_prefix(&self, prefix: &ModulePath) -> usize {
        let before = self.modules.len();
        self.modules.retain(|module, _| !module.starts_with(prefix));
        before - self.modules.len()
    }
}
