//! Common utilities for benchmarks

use criterion::Criterion;
use pprof::criterion::{Output, PProfProfiler};
use rimport_core::{BackendConfig, ModulePath};
use rimport_loader::{LoadPolicy, NamespaceRegistry};
use std::sync::Arc;

/// Configure criterion with flamegraph profiling support
pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(3))
        .measurement_time(std::time::Duration::from_secs(10))
        .sample_size(100)
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
}

/// Deterministic pseudo-source of the given size
pub fn create_test_content(size: usize) -> Vec<u8> {
    (0..size).map(|i| b"abcdefghijklmnopqrstuvwxyz\n"[i % 27]).collect()
}

/// Module path `ns{index}.level1...` with `depth` components
pub fn module_path(index: usize, depth: usize) -> ModulePath {
    let mut parts = vec![format!("ns{}", index)];
    parts.extend((1..depth).map(|level| format!("level{}", level)));
    // Generated names are always valid identifiers
    ModulePath::parse(&parts.join(".")).unwrap()
}

/// Registry with `count` top-level namespaces, each also bound one level deeper
pub fn populated_registry(count: usize) -> NamespaceRegistry {
    let registry = NamespaceRegistry::new();
    for index in 0..count {
        let backend = Arc::new(BackendConfig::parse(&format!("https://mirror{}.example.com/pkgs", index)).unwrap());
        registry
            .register(module_path(index, 1), backend.clone(), LoadPolicy::default())
            .unwrap();
        registry
            .register(module_path(index, 2), backend, LoadPolicy::default())
            .unwrap();
    }
    registry
}
