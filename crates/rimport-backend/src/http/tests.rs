//! Unit tests for the HTTP backend

use super::*;
use rimport_core::Credentials;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> BackendConfig {
    BackendConfig::parse(&format!("{}/packages", server.uri())).unwrap()
}

fn base_of(config: &BackendConfig) -> String {
    config.location.to_string()
}

#[tokio::test]
async fn test_fetch_plain_module() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/packages/demo/a.py"))
        .respond_with(ResponseTemplate::new(200).set_body_string("def main(): return 1\n"))
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let module = ModulePath::parse("demo.a").unwrap();
    let result = fetch(&Client::new(), &config, &base_of(&config), &module, ProbeMode::Auto)
        .await
        .unwrap();

    assert_eq!(result.bytes, b"def main(): return 1\n");
    assert!(!result.is_package);
    assert_eq!(result.source, format!("{}/packages/demo/a.py", mock_server.uri()));
    assert_eq!(result.fingerprint, rimport_core::Fingerprint::of(b"def main(): return 1\n"));
}

#[tokio::test]
async fn test_package_form_takes_precedence() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/packages/demo/a/__init__.py"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# package"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/packages/demo/a.py"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# module"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let module = ModulePath::parse("demo.a").unwrap();
    let result = fetch(&Client::new(), &config, &base_of(&config), &module, ProbeMode::Auto)
        .await
        .unwrap();

    assert!(result.is_package);
    assert_eq!(result.bytes, b"# package");
}

#[tokio::test]
async fn test_module_probe_skips_package() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/packages/demo/a.py"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# module"))
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let module = ModulePath::parse("demo.a").unwrap();
    let result = fetch(&Client::new(), &config, &base_of(&config), &module, ProbeMode::Module)
        .await
        .unwrap();

    assert!(!result.is_package);
}

#[tokio::test]
async fn test_missing_module_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let module = ModulePath::parse("demo.missing").unwrap();
    let err = fetch(&Client::new(), &config, &base_of(&config), &module, ProbeMode::Auto)
        .await
        .unwrap_err();

    match err {
        ImportError::NotFound { location } => assert!(location.ends_with("/demo/missing.py")),
        other => panic!("Expected NotFound error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_transient_remote_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let module = ModulePath::parse("demo.a").unwrap();
    let err = fetch(&Client::new(), &config, &base_of(&config), &module, ProbeMode::Auto)
        .await
        .unwrap_err();

    match &err {
        ImportError::Remote { status, transient, .. } => {
            assert_eq!(*status, 503);
            assert!(*transient);
        },
        other => panic!("Expected Remote error, got {:?}", other),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_forbidden_is_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server);
    let module = ModulePath::parse("demo.a").unwrap();
    let err = fetch(&Client::new(), &config, &base_of(&config), &module, ProbeMode::Auto)
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::Transport { .. }));
}

#[tokio::test]
async fn test_headers_and_token_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/packages/demo/a.py"))
        .and(header("X-Hash", "abc123"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x = 1"))
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server)
        .with_option("header.X-Hash", "abc123")
        .with_credentials(Credentials::token("test-token"));
    let module = ModulePath::parse("demo.a").unwrap();
    let result = fetch(&Client::new(), &config, &base_of(&config), &module, ProbeMode::Module)
        .await
        .unwrap();

    assert_eq!(result.bytes, b"x = 1");
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = BackendConfig::parse(&format!("http://127.0.0.1:{}/packages", port)).unwrap();
    let module = ModulePath::parse("demo.a").unwrap();
    let err = fetch(&Client::new(), &config, &base_of(&config), &module, ProbeMode::Auto)
        .await
        .unwrap_err();

    assert!(err.is_transient());
}

#[test]
fn test_classify_status() {
    assert!(classify_status(StatusCode::OK, BACKEND, "loc").is_ok());
    assert!(classify_status(StatusCode::GONE, BACKEND, "loc").unwrap_err().is_not_found());
    let err = classify_status(StatusCode::BAD_REQUEST, BACKEND, "loc").unwrap_err();
    assert!(!err.is_transient());
    let err = classify_status(StatusCode::TOO_MANY_REQUESTS, BACKEND, "loc").unwrap_err();
    assert!(err.is_transient());
}
