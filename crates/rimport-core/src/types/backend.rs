//! Backend configuration types.
//!
//! A backend is one remote code source. The set of schemes is closed and
//! small, so locations are a tagged enum that backends match on.

use crate::error::{ImportError, ImportResult};
use crate::utils::path::{join_url, sanitize_url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Default source file suffix for remote modules
pub const DEFAULT_SUFFIX: &str = "py";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetch scheme of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scheme {
    Http,
    ObjectStorage,
    HostedRepo,
    SecureShell,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scheme::Http => "http",
            Scheme::ObjectStorage => "object-storage",
            Scheme::HostedRepo => "hosted-repo",
            Scheme::SecureShell => "ssh",
        };
        f.write_str(name)
    }
}

/// Source-control hosting service behind a hosted-repo location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostingService {
    Github,
    Gitlab,
}

impl HostingService {
    /// Public API root used when no `api_base` option is configured
    pub fn default_api_base(&self) -> &'static str {
        match self {
            HostingService::Github => "https://api.github.com",
            HostingService::Gitlab => "https://gitlab.com/api/v4",
        }
    }

    /// Environment variable holding the API token
    pub fn token_env(&self) -> &'static str {
        match self {
            HostingService::Github => "GITHUB_TOKEN",
            HostingService::Gitlab => "GITLAB_TOKEN",
        }
    }

    fn uri_scheme(&self) -> &'static str {
        match self {
            HostingService::Github => "github",
            HostingService::Gitlab => "gitlab",
        }
    }
}

/// Scheme-specific root reference of a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "kebab-case")]
pub enum BackendLocation {
    /// `http(s)://host:port/path`
    Http { base: String },
    /// `s3://bucket/prefix`
    ObjectStorage { bucket: String, prefix: String },
    /// `github://owner:repo@/path[@ref]`
    HostedRepo {
        service: HostingService,
        owner: String,
        repo: String,
        path: String,
        reference: Option<String>,
    },
    /// `ssh://[user@]host[:port]/path`
    SecureShell {
        user: Option<String>,
        host: String,
        port: Option<u16>,
        root: String,
    },
}

impl BackendLocation {
    /// Parse a base location URI
    pub fn parse(uri: &str) -> ImportResult<Self> {
        let invalid = |reason: &str| ImportError::InvalidLocation {
            location: uri.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| invalid("missing '<scheme>://'"))?;

        match scheme.to_ascii_lowercase().as_str() {
            "http" | "https" => {
                let parsed = url::Url::parse(uri).map_err(|e| invalid(&e.to_string()))?;
                if parsed.host_str().is_none() {
                    return Err(invalid("missing host"));
                }
                let base = sanitize_url(uri.trim_end_matches('/'));
                Ok(BackendLocation::Http { base })
            },
            "s3" => {
                let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
                if bucket.is_empty() {
                    return Err(invalid("missing bucket name"));
                }
                Ok(BackendLocation::ObjectStorage {
                    bucket: bucket.to_string(),
                    prefix: trim_slashes(prefix),
                })
            },
            "github" | "gitlab" => {
                let service = if scheme.eq_ignore_ascii_case("github") {
                    HostingService::Github
                } else {
                    HostingService::Gitlab
                };
                Self::parse_hosted(service, rest).map_err(|reason| invalid(&reason))
            },
            "ssh" => {
                let parsed = url::Url::parse(uri).map_err(|e| invalid(&e.to_string()))?;
                let host = parsed
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| invalid("missing host"))?;
                let user = Some(parsed.username())
                    .filter(|u| !u.is_empty())
                    .map(str::to_string);
                let root = parsed.path().trim_end_matches('/');
                Ok(BackendLocation::SecureShell {
                    user,
                    host: host.to_string(),
                    port: parsed.port(),
                    root: if root.is_empty() { "/".to_string() } else { root.to_string() },
                })
            },
            other => Err(invalid(&format!("unsupported scheme '{}'", other))),
        }
    }

    /// `owner:repo@/path[@ref]`
    fn parse_hosted(service: HostingService, rest: &str) -> Result<Self, String> {
        let (repo_part, path_part) = rest
            .split_once('@')
            .ok_or_else(|| "expected 'owner:repo@/path'".to_string())?;
        let (owner, repo) = repo_part
            .split_once(':')
            .ok_or_else(|| "expected 'owner:repo' before '@'".to_string())?;
        if owner.is_empty() || repo.is_empty() {
            return Err("owner and repository must not be empty".to_string());
        }

        let (path, reference) = match path_part.rsplit_once('@') {
            Some((path, reference)) if !reference.is_empty() => {
                (path, Some(reference.to_string()))
            },
            Some((path, _)) => (path, None),
            None => (path_part, None),
        };

        Ok(BackendLocation::HostedRepo {
            service,
            owner: owner.to_string(),
            repo: repo.to_string(),
            path: trim_slashes(path),
            reference,
        })
    }

    /// Location of `relative` under this root, written in the same URI form.
    ///
    /// A hosted repository keeps its `@ref` suffix at the end.
    pub fn join(&self, relative: &str) -> String {
        match self {
            BackendLocation::HostedRepo {
                service,
                owner,
                repo,
                path,
                reference,
            } => {
                let root = format!("{}://{}:{}@/{}", service.uri_scheme(), owner, repo, path);
                let mut joined = join_url(&root, relative);
                if let Some(reference) = reference {
                    joined.push('@');
                    joined.push_str(reference);
                }
                joined
            },
            other => join_url(&other.to_string(), relative),
        }
    }

    /// Fetch scheme of this location
    pub fn scheme(&self) -> Scheme {
        match self {
            BackendLocation::Http { .. } => Scheme::Http,
            BackendLocation::ObjectStorage { .. } => Scheme::ObjectStorage,
            BackendLocation::HostedRepo { .. } => Scheme::HostedRepo,
            BackendLocation::SecureShell { .. } => Scheme::SecureShell,
        }
    }
}

impl fmt::Display for BackendLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendLocation::Http { base } => write!(f, "{}", base),
            BackendLocation::ObjectStorage { bucket, prefix } => {
                write!(f, "s3://{}/{}", bucket, prefix)
            },
            BackendLocation::HostedRepo {
                service,
                owner,
                repo,
                path,
                reference,
            } => {
                write!(f, "{}://{}:{}@/{}", service.uri_scheme(), owner, repo, path)?;
                if let Some(reference) = reference {
                    write!(f, "@{}", reference)?;
                }
                Ok(())
            },
            BackendLocation::SecureShell {
                user,
                host,
                port,
                root,
            } => {
                f.write_str("ssh://")?;
                if let Some(user) = user {
                    write!(f, "{}@", user)?;
                }
                f.write_str(host)?;
                if let Some(port) = port {
                    write!(f, ":{}", port)?;
                }
                f.write_str(root)
            },
        }
    }
}

fn trim_slashes(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// A secret string that never shows up in `Debug` or log output
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read a secret from the process environment
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var).ok().filter(|v| !v.is_empty()).map(Self)
    }

    /// Access the raw value; only call this at the point of use
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Backend credentials; which fields apply depends on the scheme
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Bearer token (HTTP, hosted repositories)
    pub token: Option<Secret>,
    /// Basic auth username (HTTP)
    pub username: Option<String>,
    /// Basic auth password (HTTP)
    pub password: Option<Secret>,
    /// Object storage access key id
    pub access_key_id: Option<String>,
    /// Object storage secret key
    pub secret_access_key: Option<Secret>,
    /// Object storage session token
    pub session_token: Option<Secret>,
    /// Private key file for ssh
    pub identity_file: Option<String>,
}

impl Credentials {
    /// Bearer token credentials
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(Secret::new(token)),
            ..Self::default()
        }
    }
}

/// Immutable configuration of one backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Scheme and root reference
    pub location: BackendLocation,
    /// Optional secrets
    pub credentials: Option<Credentials>,
    /// Backend-specific tuning knobs
    pub options: BTreeMap<String, String>,
}

impl BackendConfig {
    /// Create a backend with no credentials or options
    pub fn new(location: BackendLocation) -> Self {
        Self {
            location,
            credentials: None,
            options: BTreeMap::new(),
        }
    }

    /// Parse a base location URI into a backend config
    pub fn parse(uri: &str) -> ImportResult<Self> {
        Ok(Self::new(BackendLocation::parse(uri)?))
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn scheme(&self) -> Scheme {
        self.location.scheme()
    }

    /// Raw option value
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Source file suffix without the leading dot
    pub fn suffix(&self) -> &str {
        self.option("suffix")
            .map(|s| s.trim_start_matches('.'))
            .unwrap_or(DEFAULT_SUFFIX)
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.option("timeout_secs")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Identity of the remote this config reads from.
    ///
    /// Two configs with the same location but a different endpoint or
    /// API base talk to different servers and must not share cache entries.
    pub fn identity(&self) -> String {
        let mut identity = self.location.to_string();
        for key in ["endpoint", "region", "api_base"] {
            if let Some(value) = self.option(key) {
                identity.push_str(&format!(" {}={}", key, value));
            }
        }
        identity
    }

    /// Extra request headers, configured as `header.<Name>` options
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options
            .iter()
            .filter_map(|(k, v)| k.strip_prefix("header.").map(|name| (name, v.as_str())))
    }
}

impl fmt::Display for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.location, self.scheme())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http() {
        let loc = BackendLocation::parse("http://0.0.0.0:8000//packages/").unwrap();
        assert_eq!(
            loc,
            BackendLocation::Http {
                base: "http://0.0.0.0:8000/packages".to_string()
            }
        );
        assert_eq!(loc.scheme(), Scheme::Http);
        assert!(BackendLocation::parse("https://example.com").is_ok());
    }

    #[test]
    fn test_parse_s3() {
        let loc = BackendLocation::parse("s3://my-bucket/code/libs/").unwrap();
        assert_eq!(
            loc,
            BackendLocation::ObjectStorage {
                bucket: "my-bucket".to_string(),
                prefix: "code/libs".to_string()
            }
        );
        let bare = BackendLocation::parse("s3://my-bucket").unwrap();
        assert_eq!(bare.to_string(), "s3://my-bucket/");
        assert!(BackendLocation::parse("s3:///prefix").is_err());
    }

    #[test]
    fn test_parse_hosted_repo() {
        let loc = BackendLocation::parse("github://octo:tools@/src/python@v1.2").unwrap();
        assert_eq!(
            loc,
            BackendLocation::HostedRepo {
                service: HostingService::Github,
                owner: "octo".to_string(),
                repo: "tools".to_string(),
                path: "src/python".to_string(),
                reference: Some("v1.2".to_string()),
            }
        );
        assert_eq!(loc.to_string(), "github://octo:tools@/src/python@v1.2");

        let default_branch = BackendLocation::parse("gitlab://group:proj@/").unwrap();
        match default_branch {
            BackendLocation::HostedRepo {
                service,
                path,
                reference,
                ..
            } => {
                assert_eq!(service, HostingService::Gitlab);
                assert_eq!(path, "");
                assert_eq!(reference, None);
            },
            other => panic!("unexpected location {:?}", other),
        }

        assert!(BackendLocation::parse("github://octo@/src").is_err());
        assert!(BackendLocation::parse("github://octo:tools/src").is_err());
    }

    #[test]
    fn test_parse_ssh() {
        let loc = BackendLocation::parse("ssh://deploy@build.local:2222/srv/code/").unwrap();
        assert_eq!(
            loc,
            BackendLocation::SecureShell {
                user: Some("deploy".to_string()),
                host: "build.local".to_string(),
                port: Some(2222),
                root: "/srv/code".to_string(),
            }
        );
        assert_eq!(loc.to_string(), "ssh://deploy@build.local:2222/srv/code");
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(BackendLocation::parse("ftp://host/path").is_err());
        assert!(BackendLocation::parse("no-scheme").is_err());
    }

    #[test]
    fn test_backend_options() {
        let config = BackendConfig::parse("http://localhost:8000")
            .unwrap()
            .with_option("suffix", ".pyx")
            .with_option("timeout_secs", "5")
            .with_option("header.X-Token", "abc");

        assert_eq!(config.suffix(), "pyx");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.headers().collect::<Vec<_>>(), vec![("X-Token", "abc")]);

        let plain = BackendConfig::parse("http://localhost:8000").unwrap();
        assert_eq!(plain.suffix(), DEFAULT_SUFFIX);
        assert_eq!(plain.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_join_keeps_hosted_reference_last() {
        let pinned = BackendLocation::parse("gitlab://group:proj@/src@main").unwrap();
        assert_eq!(pinned.join("demo/pkg"), "gitlab://group:proj@/src/demo/pkg@main");

        let root = BackendLocation::parse("github://octo:tools@/").unwrap();
        assert_eq!(root.join("demo"), "github://octo:tools@/demo");

        let http = BackendLocation::parse("http://host/packages/").unwrap();
        assert_eq!(http.join("demo/pkg"), "http://host/packages/demo/pkg");

        let bucket = BackendLocation::parse("s3://bucket").unwrap();
        assert_eq!(bucket.join("demo"), "s3://bucket/demo");
    }

    #[test]
    fn test_identity_tracks_endpoint() {
        let plain = BackendConfig::parse("s3://bucket/libs").unwrap();
        let local = plain.clone().with_option("endpoint", "http://127.0.0.1:9000");
        let tuned = plain.clone().with_option("timeout_secs", "5");

        assert_eq!(plain.identity(), "s3://bucket/libs");
        assert_ne!(plain.identity(), local.identity());
        assert_eq!(plain.identity(), tuned.identity());
    }

    #[test]
    fn test_secret_is_redacted() {
        let creds = Credentials::token("super-secret");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("super-secret"));
        assert_eq!(creds.token.unwrap().expose(), "super-secret");
    }
}
