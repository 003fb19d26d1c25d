//! End-to-end tests against a mock HTTP remote

use super::*;
use camino::Utf8PathBuf;
use rimport_config::{CacheSection, RemoteSection};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn importer(dir: &TempDir) -> RemoteImporter {
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    RemoteImporter::new(
        Arc::new(NamespaceRegistry::new()),
        Arc::new(ArtifactCache::new(&root).unwrap()),
        Arc::new(Dispatcher::new().unwrap()),
        Arc::new(ModuleTable::new()),
        Defaults::default(),
    )
}

async fn serve(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_demo_module_over_http() {
    let server = MockServer::start().await;
    serve(&server, "/packages/demo/a.py", "def main(): return 1").await;
    let base = format!("{}/packages", server.uri());

    let dir = TempDir::new().unwrap();
    let importer = importer(&dir);
    importer.add_remote(&["demo"], &base, RemoteOptions::new()).await.unwrap();

    let unit = importer.import("demo.a").await.unwrap();
    assert_eq!(unit.source_text(), "def main(): return 1");
    assert_eq!(unit.origin, format!("{}/demo/a.py", base));
    assert!(importer.host().get(&ModulePath::parse("demo").unwrap()).unwrap().is_package);

    // A fresh process sharing the cache resolves without touching the network
    let requests = server.received_requests().await.unwrap().len();
    let second = self::importer(&dir);
    second.add_remote(&["demo"], &base, RemoteOptions::new()).await.unwrap();
    second.import("demo.a").await.unwrap();
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        requests + 2,
        "only the uncached namespace root probes again"
    );
}

#[tokio::test]
async fn test_missing_module_is_module_not_found() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let importer = importer(&dir);
    importer
        .add_remote(&["demo"], &server.uri(), RemoteOptions::new())
        .await
        .unwrap();

    let err = importer.import("demo.missing").await.unwrap_err();
    assert_eq!(
        err,
        ImportError::ModuleNotFound {
            module: "demo.missing".to_string()
        }
    );
}

#[tokio::test]
async fn test_headers_reach_the_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/demo/a.py"))
        .and(header("X-Token", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x = 1"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let importer = importer(&dir);
    importer
        .add_remote(&["demo"], &server.uri(), RemoteOptions::new().with_header("X-Token", "abc"))
        .await
        .unwrap();

    assert_eq!(importer.import("demo.a").await.unwrap().source, b"x = 1");
}

#[tokio::test]
async fn test_connection_failure_registers_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let importer = importer(&dir);
    let options = RemoteOptions::new().with_retries(0).with_test_connection();

    let err = importer
        .add_remote(&["demo", "tools"], &server.uri(), options)
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::RemoteImport { .. }));
    assert!(importer.registry().is_empty());
}

#[tokio::test]
async fn test_connection_fails_on_empty_remote_even_with_implicit_namespace() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let importer = importer(&dir);

    let options = RemoteOptions::new().with_retries(0).with_test_connection();
    let err = importer.add_remote(&["demo"], &server.uri(), options).await.unwrap_err();

    assert!(matches!(err, ImportError::RemoteImport { .. }));
    assert!(importer.registry().is_empty());

    // Without the connection check the root still imports as an implicit namespace
    importer
        .add_remote(&["demo"], &server.uri(), RemoteOptions::new().with_retries(0))
        .await
        .unwrap();
    let unit = importer.import("demo").await.unwrap();
    assert!(unit.is_package);
    assert!(unit.source.is_empty());
}

#[tokio::test]
async fn test_connection_accepts_module_form_root() {
    let server = MockServer::start().await;
    serve(&server, "/tools.py", "NAME = 'tools'").await;
    let dir = TempDir::new().unwrap();
    let importer = importer(&dir);

    let options = RemoteOptions::new().with_retries(0).with_test_connection();
    importer.add_remote(&["tools"], &server.uri(), options).await.unwrap();

    assert_eq!(importer.registry().namespaces(), vec![ModulePath::parse("tools").unwrap()]);
}

#[tokio::test]
async fn test_connection_warms_the_cache() {
    let server = MockServer::start().await;
    serve(&server, "/demo/__init__.py", "VERSION = 1").await;

    let dir = TempDir::new().unwrap();
    let importer = importer(&dir);
    importer
        .add_remote(&["demo"], &server.uri(), RemoteOptions::new().with_test_connection())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap().len();
    importer.import("demo").await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), requests);
}

#[tokio::test]
async fn test_second_registration_appends() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    serve(&second, "/demo/a.py", "from second").await;

    let dir = TempDir::new().unwrap();
    let importer = importer(&dir);
    importer.add_remote(&["demo"], &first.uri(), RemoteOptions::new()).await.unwrap();
    importer.add_remote(&["demo"], &second.uri(), RemoteOptions::new()).await.unwrap();

    assert_eq!(importer.registry().len(), 2);
    assert_eq!(importer.import("demo.a").await.unwrap().source, b"from second");
}

#[tokio::test]
async fn test_reload_replaces_binding_and_unloads_modules() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    serve(&first, "/demo/a.py", "from first").await;
    serve(&second, "/demo/a.py", "from second").await;

    let dir = TempDir::new().unwrap();
    let importer = importer(&dir);
    importer.add_remote(&["demo"], &first.uri(), RemoteOptions::new()).await.unwrap();
    assert_eq!(importer.import("demo.a").await.unwrap().source, b"from first");

    importer
        .add_remote(&["demo"], &second.uri(), RemoteOptions::new().with_reload())
        .await
        .unwrap();

    assert_eq!(importer.registry().len(), 1);
    assert!(importer.host().get(&ModulePath::parse("demo.a").unwrap()).is_none());
    assert_eq!(importer.import("demo.a").await.unwrap().source, b"from second");
}

#[tokio::test]
async fn test_invalid_arguments() {
    let dir = TempDir::new().unwrap();
    let importer = importer(&dir);

    assert!(matches!(
        importer.add_remote(&["demo"], "ftp://host/pkgs", RemoteOptions::new()).await,
        Err(ImportError::InvalidLocation { .. })
    ));
    assert!(matches!(
        importer.add_remote(&["bad/name"], "http://host", RemoteOptions::new()).await,
        Err(ImportError::InvalidModulePath { .. })
    ));
    assert!(matches!(
        importer.add_remote(&[], "http://host", RemoteOptions::new()).await,
        Err(ImportError::ConfigValidation { .. })
    ));
    assert!(importer.registry().is_empty());
}

#[tokio::test]
async fn test_remove_remote() {
    let dir = TempDir::new().unwrap();
    let importer = importer(&dir);
    importer.add_remote(&["demo"], "http://host", RemoteOptions::new()).await.unwrap();

    assert_eq!(importer.remove_remote("demo").unwrap(), 1);
    assert!(importer.registry().is_empty());
}

#[tokio::test]
async fn test_from_config() {
    let server = MockServer::start().await;
    serve(&server, "/demo/a.py", "x = 1").await;

    let dir = TempDir::new().unwrap();
    let config = ImportConfig {
        cache: CacheSection {
            dir: Some(Utf8PathBuf::from_path_buf(dir.path().join("cache")).unwrap()),
            ttl: Some(60),
        },
        remotes: vec![RemoteSection {
            namespaces: vec!["demo".to_string()],
            location: server.uri(),
            options: RemoteOptions::new(),
        }],
        ..ImportConfig::default()
    };

    let importer = RemoteImporter::from_config(&config).await.unwrap();

    assert_eq!(importer.defaults().cache_ttl, std::time::Duration::from_secs(60));
    assert_eq!(importer.import("demo.a").await.unwrap().source, b"x = 1");
    assert!(dir.path().join("cache").join("entries").is_dir());
}
