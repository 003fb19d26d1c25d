//! Object-storage backend (`s3://bucket/prefix`).
//!
//! Objects are read with path-style `GET <endpoint>/<bucket>/<key>` requests so
//! S3-compatible stores work through the `endpoint` option. Requests are
//! signed when access keys are configured or present in the environment;
//! otherwise they are sent anonymously for public buckets.
//!
//! Without list permission S3 answers a missing key with `403 AccessDenied`
//! instead of `404`, so that response counts as a miss for the form being
//! tried. Other 403s (bad signature, expired token) stay transport errors.

pub mod sigv4;

use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, RequestBuilder, StatusCode};
use rimport_core::{BackendConfig, FetchResult, ImportError, ModulePath, ProbeMode, Secret};
use tracing::debug;

use crate::http::classify_status;
use crate::{probe_forms, relative_file, BackendResult};
use sigv4::SigningKeys;

/// Backend label used in errors and logs
pub const BACKEND: &str = "object-storage";

/// Region used when neither options nor environment name one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Characters left unescaped in object keys (RFC 3986 unreserved)
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Access keys resolved from the backend config or the environment
struct ResolvedKeys {
    access_key_id: String,
    secret_access_key: Secret,
    session_token: Option<Secret>,
}

/// Fetch a module from an object-storage bucket
pub async fn fetch(
    client: &Client,
    config: &BackendConfig,
    bucket: &str,
    prefix: &str,
    module: &ModulePath,
    probe: ProbeMode,
) -> BackendResult<FetchResult> {
    let region = region(config);
    let endpoint = endpoint(config, &region);
    let keys = resolve_keys(config);

    probe_forms(probe, |is_package| {
        let key = object_key(prefix, &relative_file(module, is_package, config.suffix()));
        let region = region.clone();
        let endpoint = endpoint.clone();
        let keys = keys.as_ref();
        async move {
            let source = format!("s3://{}/{}", bucket, key);
            let canonical_uri = format!("/{}/{}", bucket, encode_key(&key));
            let url = format!("{}{}", endpoint.trim_end_matches('/'), canonical_uri);
            debug!(module = %module, object = %source, is_package, "probing object storage");

            let mut request = client.get(&url).timeout(config.timeout());
            if let Some(keys) = keys {
                let host = host_header(&url, &source)?;
                let signing = SigningKeys {
                    access_key_id: &keys.access_key_id,
                    secret_access_key: keys.secret_access_key.expose(),
                    session_token: keys.session_token.as_ref().map(Secret::expose),
                };
                for (name, value) in sigv4::sign_get(&host, &canonical_uri, &region, Utc::now(), &signing) {
                    request = request.header(name, value);
                }
            }

            let bytes = read_object(request, &source).await?;
            Ok(FetchResult::new(bytes, source, is_package))
        }
    })
    .await
}

/// Send a GET for one object and read its body
async fn read_object(request: RequestBuilder, source: &str) -> BackendResult<Vec<u8>> {
    let response = request
        .send()
        .await
        .map_err(|e| ImportError::transport(BACKEND, source, e))?;

    let status = response.status();
    if status == StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        let code = error_code(&body);
        if code == Some("AccessDenied") {
            debug!(object = %source, "access denied, treating as missing key");
            return Err(ImportError::not_found(source));
        }
        return Err(ImportError::Transport {
            backend: BACKEND.to_string(),
            location: source.to_string(),
            message: format!("access denied ({}, {})", status, code.unwrap_or("no error code")),
        });
    }
    classify_status(status, BACKEND, source)?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ImportError::transport(BACKEND, source, e))?;
    Ok(bytes.to_vec())
}

/// `<Code>` element of an S3 XML error body
fn error_code(body: &str) -> Option<&str> {
    let start = body.find("<Code>")? + "<Code>".len();
    let len = body[start..].find("</Code>")?;
    Some(body[start..start + len].trim())
}

/// `prefix/relative`, without a leading slash
pub fn object_key(prefix: &str, relative: &str) -> String {
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), relative)
    }
}

/// Percent-encode each key segment, keeping `/` separators
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn region(config: &BackendConfig) -> String {
    config
        .option("region")
        .map(str::to_string)
        .or_else(|| std::env::var("AWS_REGION").ok())
        .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

fn endpoint(config: &BackendConfig, region: &str) -> String {
    config
        .option("endpoint")
        .map(str::to_string)
        .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", region))
}

fn resolve_keys(config: &BackendConfig) -> Option<ResolvedKeys> {
    let credentials = config.credentials.clone().unwrap_or_default();

    let access_key_id = credentials
        .access_key_id
        .or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok())?;
    let secret_access_key = credentials
        .secret_access_key
        .or_else(|| Secret::from_env("AWS_SECRET_ACCESS_KEY"))?;
    let session_token = credentials
        .session_token
        .or_else(|| Secret::from_env("AWS_SESSION_TOKEN"));

    Some(ResolvedKeys {
        access_key_id,
        secret_access_key,
        session_token,
    })
}

/// Value of the `Host` header the client will send for `url`
fn host_header(url: &str, source: &str) -> BackendResult<String> {
    let parsed = url::Url::parse(url).map_err(|e| ImportError::InvalidLocation {
        location: source.to_string(),
        reason: e.to_string(),
    })?;
    let host = parsed.host_str().unwrap_or_default();
    Ok(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rimport_core::Credentials;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> BackendConfig {
        BackendConfig::parse("s3://code-bucket/libs")
            .unwrap()
            .with_option("endpoint", server.uri())
            .with_option("region", "eu-west-1")
    }

    #[test]
    fn test_object_key() {
        assert_eq!(object_key("libs", "demo/a.py"), "libs/demo/a.py");
        assert_eq!(object_key("", "demo/a.py"), "demo/a.py");
        assert_eq!(encode_key("libs/my file.py"), "libs/my%20file.py");
    }

    #[test]
    fn test_host_header_keeps_explicit_port() {
        assert_eq!(host_header("http://127.0.0.1:9000/b/k", "s3://b/k").unwrap(), "127.0.0.1:9000");
        assert_eq!(
            host_header("https://s3.us-east-1.amazonaws.com/b/k", "s3://b/k").unwrap(),
            "s3.us-east-1.amazonaws.com"
        );
    }

    #[tokio::test]
    async fn test_fetch_signed_object() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/code-bucket/libs/demo/a.py"))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-date"))
            .respond_with(ResponseTemplate::new(200).set_body_string("def main(): return 1"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/code-bucket/libs/demo/a/__init__.py"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let config = config_for(&mock_server).with_credentials(Credentials {
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some(Secret::new("secret")),
            ..Credentials::default()
        });
        let module = ModulePath::parse("demo.a").unwrap();
        let result = fetch(&Client::new(), &config, "code-bucket", "libs", &module, ProbeMode::Auto)
            .await
            .unwrap();

        assert_eq!(result.bytes, b"def main(): return 1");
        assert_eq!(result.source, "s3://code-bucket/libs/demo/a.py");
        assert!(!result.is_package);
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let module = ModulePath::parse("demo.missing").unwrap();
        let err = fetch(
            &Client::new(),
            &config_for(&mock_server),
            "code-bucket",
            "libs",
            &module,
            ProbeMode::Auto,
        )
        .await
        .unwrap_err();

        assert!(err.is_not_found());
    }

    fn s3_error(code: &str) -> ResponseTemplate {
        ResponseTemplate::new(403).set_body_string(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error><Code>{}</Code><Message>denied</Message></Error>",
            code
        ))
    }

    #[test]
    fn test_error_code() {
        assert_eq!(error_code("<Error><Code>AccessDenied</Code></Error>"), Some("AccessDenied"));
        assert_eq!(error_code(""), None);
        assert_eq!(error_code("<Error><Code>broken"), None);
    }

    #[tokio::test]
    async fn test_access_denied_package_form_falls_back_to_module() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/code-bucket/libs/demo/a/__init__.py"))
            .respond_with(s3_error("AccessDenied"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/code-bucket/libs/demo/a.py"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x = 1"))
            .mount(&mock_server)
            .await;

        let module = ModulePath::parse("demo.a").unwrap();
        let result = fetch(
            &Client::new(),
            &config_for(&mock_server),
            "code-bucket",
            "libs",
            &module,
            ProbeMode::Auto,
        )
        .await
        .unwrap();

        assert_eq!(result.bytes, b"x = 1");
        assert!(!result.is_package);
    }

    #[tokio::test]
    async fn test_access_denied_on_every_form_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(s3_error("AccessDenied"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let module = ModulePath::parse("demo.missing").unwrap();
        let err = fetch(
            &Client::new(),
            &config_for(&mock_server),
            "code-bucket",
            "libs",
            &module,
            ProbeMode::Auto,
        )
        .await
        .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_bad_signature_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(s3_error("SignatureDoesNotMatch"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let module = ModulePath::parse("demo.a").unwrap();
        let err = fetch(
            &Client::new(),
            &config_for(&mock_server),
            "code-bucket",
            "libs",
            &module,
            ProbeMode::Auto,
        )
        .await
        .unwrap_err();

        match err {
            ImportError::Transport { message, .. } => assert!(message.contains("SignatureDoesNotMatch")),
            other => panic!("expected Transport, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_access_denied_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let module = ModulePath::parse("demo.a").unwrap();
        let err = fetch(
            &Client::new(),
            &config_for(&mock_server),
            "code-bucket",
            "libs",
            &module,
            ProbeMode::Auto,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ImportError::Transport { .. }));
    }
}
