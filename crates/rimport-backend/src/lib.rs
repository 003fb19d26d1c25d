//! Fetch backends for remote module imports
//!
//! This crate turns a `(BackendConfig, ModulePath)` pair into raw source bytes.
//! Each scheme (HTTP, object storage, hosted repositories, secure shell) has its
//! own strategy; the `Dispatcher` selects one by matching on the backend's
//! location. Bounded retry with exponential backoff lives in `retry`.

pub mod dispatcher;
pub mod hosted;
pub mod http;
pub mod object_store;
pub mod retry;
pub mod ssh;

// Re-export main types
pub use dispatcher::Dispatcher;
pub use retry::{with_retry, RetryConfig};

use async_trait::async_trait;
use rimport_core::{BackendConfig, FetchResult, ImportResult, ModulePath, ProbeMode};
use std::future::Future;

/// Result type for backend operations
pub type BackendResult<T> = ImportResult<T>;

/// Fetch capability the loader depends on.
///
/// `Dispatcher` is the production implementation. A single call makes one
/// attempt per probed form; retrying is the caller's decision.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(
        &self,
        backend: &BackendConfig,
        module: &ModulePath,
        probe: ProbeMode,
    ) -> BackendResult<FetchResult>;
}

/// Repository-relative file for one probed form of a module
pub fn relative_file(module: &ModulePath, is_package: bool, suffix: &str) -> String {
    let base = module.to_relative_path();
    if is_package {
        format!("{}/__init__.{}", base, suffix)
    } else {
        format!("{}.{}", base, suffix)
    }
}

/// Try each probed form in order; the first success wins.
///
/// `NotFound` moves on to the next form, any other error stops probing.
pub(crate) async fn probe_forms<F, Fut>(probe: ProbeMode, mut attempt: F) -> BackendResult<FetchResult>
where
    F: FnMut(bool) -> Fut,
    Fut: Future<Output = BackendResult<FetchResult>>,
{
    let mut last_missing = None;

    for &is_package in probe.forms() {
        match attempt(is_package).await {
            Ok(result) => return Ok(result),
            Err(err) if err.is_not_found() => last_missing = Some(err),
            Err(err) => return Err(err),
        }
    }

    Err(last_missing.unwrap_or_else(|| rimport_core::ImportError::not_found("no probe forms")))
}
