//! Scheme dispatch over a shared, pooled HTTP client

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::debug;

use rimport_core::{BackendConfig, BackendLocation, FetchResult, ImportError, ModulePath, ProbeMode};

use crate::hosted::Repository;
use crate::ssh::RemoteHost;
use crate::{hosted, http, object_store, ssh, BackendResult, Fetch};

/// Selects the fetch strategy for a backend's scheme
#[derive(Debug, Clone)]
pub struct Dispatcher {
    /// Underlying HTTP client with connection pooling
    client: Client,
}

impl Dispatcher {
    /// Create a dispatcher with a pooled HTTP client
    pub fn new() -> BackendResult<Self> {
        let client = ClientBuilder::new()
            // Connection pooling configuration
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .user_agent(concat!("rimport/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ImportError::Transport {
                backend: http::BACKEND.to_string(),
                location: "client".to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self::with_client(client))
    }

    /// Create a dispatcher around an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for Dispatcher {
    async fn fetch(
        &self,
        backend: &BackendConfig,
        module: &ModulePath,
        probe: ProbeMode,
    ) -> BackendResult<FetchResult> {
        debug!(module = %module, backend = %backend, ?probe, "dispatching fetch");

        match &backend.location {
            BackendLocation::Http { base } => {
                http::fetch(&self.client, backend, base, module, probe).await
            },
            BackendLocation::ObjectStorage { bucket, prefix } => {
                object_store::fetch(&self.client, backend, bucket, prefix, module, probe).await
            },
            BackendLocation::HostedRepo {
                service,
                owner,
                repo,
                path,
                reference,
            } => {
                let repository = Repository {
                    service: *service,
                    owner,
                    repo,
                    root: path,
                    reference: reference.as_deref(),
                };
                hosted::fetch(&self.client, backend, repository, module, probe).await
            },
            BackendLocation::SecureShell {
                user,
                host,
                port,
                root,
            } => {
                let remote = RemoteHost {
                    user: user.as_deref(),
                    host,
                    port: *port,
                    root,
                };
                ssh::fetch(backend, remote, module, probe).await
            },
        }
    }
}
