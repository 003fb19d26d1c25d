//! Hosted-repository backend (`github://owner:repo@/path[@ref]`).
//!
//! File content is read through the hosting service's API in raw form. When
//! no reference is given the service resolves the repository's default branch.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use rimport_core::{
    BackendConfig, FetchResult, HostingService, ImportError, ModulePath, ProbeMode, Secret,
};
use tracing::debug;

use crate::http::get_bytes;
use crate::{probe_forms, relative_file, BackendResult};

/// Backend label used in errors and logs
pub const BACKEND: &str = "hosted-repo";

/// Characters left unescaped in a single path segment
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Repository coordinates from a hosted-repo location
#[derive(Debug, Clone, Copy)]
pub struct Repository<'a> {
    pub service: HostingService,
    pub owner: &'a str,
    pub repo: &'a str,
    /// Directory inside the repository that acts as the import root
    pub root: &'a str,
    pub reference: Option<&'a str>,
}

/// Fetch a module file through the hosting API
pub async fn fetch(
    client: &Client,
    config: &BackendConfig,
    repository: Repository<'_>,
    module: &ModulePath,
    probe: ProbeMode,
) -> BackendResult<FetchResult> {
    let api_base = config
        .option("api_base")
        .unwrap_or_else(|| repository.service.default_api_base())
        .trim_end_matches('/')
        .to_string();
    let token = config
        .credentials
        .as_ref()
        .and_then(|c| c.token.clone())
        .or_else(|| Secret::from_env(repository.service.token_env()));

    probe_forms(probe, |is_package| {
        let file = repo_path(repository.root, &relative_file(module, is_package, config.suffix()));
        let api_base = api_base.clone();
        let token = token.clone();
        async move {
            let url = content_url(&api_base, &repository, &file)?;
            debug!(module = %module, url = %url, is_package, "probing hosted repository");

            let mut request = client.get(url.as_str()).timeout(config.timeout());
            request = match repository.service {
                HostingService::Github => {
                    let request = request.header("Accept", "application/vnd.github.raw");
                    match &token {
                        Some(token) => request.bearer_auth(token.expose()),
                        None => request,
                    }
                },
                HostingService::Gitlab => match &token {
                    Some(token) => request.header("PRIVATE-TOKEN", token.expose()),
                    None => request,
                },
            };

            let bytes = get_bytes(request, BACKEND, url.as_str()).await?;
            Ok(FetchResult::new(bytes, url.to_string(), is_package))
        }
    })
    .await
}

/// Join the import root and the module file inside the repository
pub fn repo_path(root: &str, relative: &str) -> String {
    let root = root.trim_matches('/');
    if root.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", root, relative)
    }
}

/// API URL that returns the raw content of `file`
pub fn content_url(
    api_base: &str,
    repository: &Repository<'_>,
    file: &str,
) -> BackendResult<url::Url> {
    let raw = match repository.service {
        HostingService::Github => {
            let encoded_path = file
                .split('/')
                .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
                .collect::<Vec<_>>()
                .join("/");
            format!(
                "{}/repos/{}/{}/contents/{}",
                api_base,
                utf8_percent_encode(repository.owner, SEGMENT),
                utf8_percent_encode(repository.repo, SEGMENT),
                encoded_path
            )
        },
        HostingService::Gitlab => {
            let project = format!("{}/{}", repository.owner, repository.repo);
            format!(
                "{}/projects/{}/repository/files/{}/raw",
                api_base,
                utf8_percent_encode(&project, SEGMENT),
                utf8_percent_encode(file, SEGMENT)
            )
        },
    };

    let mut url = url::Url::parse(&raw).map_err(|e| ImportError::InvalidLocation {
        location: raw.clone(),
        reason: e.to_string(),
    })?;
    if let Some(reference) = repository.reference {
        url.query_pairs_mut().append_pair("ref", reference);
    }
    Ok(url)
}
