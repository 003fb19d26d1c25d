//! Plain HTTP(S) backend.
//!
//! Module files are served at `<base>/<package path>/__init__.<suffix>` or
//! `<base>/<module path>.<suffix>`. The response helpers here are shared with
//! the object-storage and hosted-repository backends, which also speak HTTP.

use reqwest::{Client, RequestBuilder, StatusCode};
use rimport_core::utils::join_url;
use rimport_core::{BackendConfig, FetchResult, ImportError, ModulePath, ProbeMode};
use tracing::debug;

use crate::{probe_forms, relative_file, BackendResult};

/// Backend label used in errors and logs
pub const BACKEND: &str = "http";

/// Fetch a module from an HTTP root
pub async fn fetch(
    client: &Client,
    config: &BackendConfig,
    base: &str,
    module: &ModulePath,
    probe: ProbeMode,
) -> BackendResult<FetchResult> {
    probe_forms(probe, |is_package| {
        let url = join_url(base, &relative_file(module, is_package, config.suffix()));
        async move {
            debug!(module = %module, url = %url, is_package, "probing http backend");
            let request = authorize(client.get(&url).timeout(config.timeout()), config);
            let bytes = get_bytes(request, BACKEND, &url).await?;
            Ok(FetchResult::new(bytes, url, is_package))
        }
    })
    .await
}

/// Attach configured headers and credentials to a request
fn authorize(mut request: RequestBuilder, config: &BackendConfig) -> RequestBuilder {
    for (name, value) in config.headers() {
        request = request.header(name, value);
    }

    if let Some(credentials) = &config.credentials {
        if let Some(token) = &credentials.token {
            request = request.bearer_auth(token.expose());
        } else if let Some(username) = &credentials.username {
            let password = credentials.password.as_ref().map(|p| p.expose().to_string());
            request = request.basic_auth(username, password);
        }
    }

    request
}

/// Send a request and read the body, mapping failures onto the error taxonomy
pub(crate) async fn get_bytes(
    request: RequestBuilder,
    backend: &str,
    location: &str,
) -> BackendResult<Vec<u8>> {
    let response = request
        .send()
        .await
        .map_err(|e| ImportError::transport(backend, location, e))?;

    classify_status(response.status(), backend, location)?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ImportError::transport(backend, location, e))?;

    Ok(bytes.to_vec())
}

/// Map a response status onto `NotFound`, `Transport` or `Remote`
pub(crate) fn classify_status(status: StatusCode, backend: &str, location: &str) -> BackendResult<()> {
    if status.is_success() {
        return Ok(());
    }

    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(ImportError::not_found(location)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ImportError::Transport {
            backend: backend.to_string(),
            location: location.to_string(),
            message: format!("access denied ({})", status),
        }),
        status => Err(ImportError::Remote {
            backend: backend.to_string(),
            location: location.to_string(),
            status: status.as_u16(),
            transient: status.is_server_error()
                || status == StatusCode::TOO_MANY_REQUESTS
                || status == StatusCode::REQUEST_TIMEOUT,
        }),
    }
}

#[cfg(test)]
mod tests;
