//! Integration tests for the mirror
//!
//! These tests use wiremock to create mock origins and run the full crawl
//! cycle end-to-end against a temporary output directory.

use pagemirror::config::{CleanMode, Config};
use pagemirror::output::SITEMAP_FILE_NAME;
use pagemirror::{run_scheduled, CrawlEngine, CrawlReport, NoopObserver};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration for the mock origin, without politeness delay
fn create_test_config(base_url: &str, out: &Path) -> Config {
    let mut config = Config::for_seed(format!("{}/", base_url), out);
    config.crawler.delay_ms = 0;
    config
}

async fn run(config: Config) -> CrawlReport {
    let engine = CrawlEngine::new(config, Arc::new(NoopObserver)).expect("Failed to create engine");
    engine
        .run(CancellationToken::new())
        .await
        .expect("Crawl failed")
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body.into())
}

async fn mount_missing_robots(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

fn read(out: &TempDir, rel: &str) -> String {
    std::fs::read_to_string(out.path().join(rel))
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", rel, e))
}

#[tokio::test]
async fn test_full_crawl_single_origin() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_missing_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="/a.html">A</a>
            <a href="{}/docs/">Docs</a>
            <a href="https://other.test/b.html">Elsewhere</a>
            <a href="mailto:hi@x.test">Mail</a>
            </body></html>"#,
            base_url
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a.html"))
        .respond_with(html(
            r#"<html><body><a href="/">Home</a><a href="/docs/#intro">Docs</a></body></html>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/"))
        .respond_with(html(r#"<html><body><a href="../a.html">A</a></body></html>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let out = TempDir::new().unwrap();
    let report = run(create_test_config(&base_url, out.path())).await;

    assert_eq!(
        report.visited,
        vec![
            format!("{}/", base_url),
            format!("{}/a.html", base_url),
            format!("{}/docs/", base_url),
        ]
    );
    assert_eq!(report.stats.pages_saved, 3);
    assert_eq!(report.stats.page_requests, 3);

    let index = read(&out, "index.html");
    assert!(index.contains(r#"href="a.html""#));
    assert!(index.contains(r#"href="docs/index.html""#));
    assert!(index.contains(r#"href="https://other.test/b.html""#));
    assert!(index.contains(r#"href="mailto:hi@x.test""#));

    let a = read(&out, "a.html");
    assert!(a.contains(r#"href="docs/index.html#intro""#));

    let docs = read(&out, "docs/index.html");
    assert!(docs.contains(r#"href="../a.html""#));
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin\n"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><body><a href="/allowed">Allowed</a><a href="/admin">Admin</a></body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/allowed"))
        .respond_with(html("<html><body>Allowed content</body></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(html("<html><body>Secret</body></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let out = TempDir::new().unwrap();
    let report = run(create_test_config(&base_url, out.path())).await;

    assert_eq!(report.skipped, vec![format!("{}/admin", base_url)]);
    assert_eq!(report.disallowed_paths, vec!["/admin".to_string()]);
    assert_eq!(report.stats.pages_skipped, 1);
    assert_eq!(report.pages_visited(), 2);
    assert!(!out.path().join("admin.html").exists());
}

#[tokio::test]
async fn test_html_robots_response_allows_all() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(html("<!DOCTYPE html><html><body>Not found</body></html>"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html><body>Home</body></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let out = TempDir::new().unwrap();
    let report = run(create_test_config(&base_url, out.path())).await;

    assert!(report.skipped.is_empty());
    assert_eq!(report.stats.pages_saved, 1);
}

#[tokio::test]
async fn test_stylesheet_font_inlined() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_missing_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><head><link rel="stylesheet" href="/s.css"></head><body></body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/s.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/css")
                .set_body_string(
                    "@font-face{font-family:F;src:url(fonts/f.woff2) format('woff2')}",
                ),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fonts/f.woff2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "font/woff2")
                .set_body_bytes(vec![0x77, 0x4f, 0x46, 0x32]),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let out = TempDir::new().unwrap();
    let report = run(create_test_config(&base_url, out.path())).await;

    let css = read(&out, "s.css");
    assert!(css.contains("url(data:font/woff2;base64,d09GMg==)"));
    assert!(!css.contains("fonts/f.woff2"));
    assert!(read(&out, "index.html").contains(r#"href="s.css""#));
    assert_eq!(report.stats.assets_downloaded, 2);
}

#[tokio::test]
async fn test_max_size_rejects_large_image() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_missing_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><body><img src="/big.png"><img src="/small.png"></body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/big.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0u8; 2048]),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/small.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0u8; 512]),
        )
        .mount(&mock_server)
        .await;

    let out = TempDir::new().unwrap();
    let mut config = create_test_config(&base_url, out.path());
    config.filter.max_size = Some(1024);
    let report = run(config).await;

    assert!(!out.path().join("big.png").exists());
    assert!(out.path().join("small.png").is_file());

    let index = read(&out, "index.html");
    assert!(index.contains(r#"src="/big.png""#));
    assert!(index.contains(r#"src="small.png""#));
    assert_eq!(report.stats.assets_filtered, 1);
    assert_eq!(report.stats.assets_downloaded, 1);
}

#[tokio::test]
async fn test_shared_asset_fetched_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_missing_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><body><img src="/logo.png"><img src="logo.png#x"><a href="/blog/post">Post</a></body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/blog/post"))
        .respond_with(html(r#"<html><body><img src="../logo.png"></body></html>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![1u8; 64]),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let out = TempDir::new().unwrap();
    let report = run(create_test_config(&base_url, out.path())).await;

    assert_eq!(report.assets_stored(), 1);
    assert_eq!(report.stats.assets_downloaded, 1);
    assert!(read(&out, "index.html").contains(r#"src="logo.png""#));
    assert!(read(&out, "blog/post.html").contains(r#"src="../logo.png""#));
}

/// Mounts a small site whose every resource carries an ETag
async fn mount_versioned_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            html(
                r#"<html><head><link rel="stylesheet" href="/s.css"></head>
                <body><img src="/logo.png"><a href="/about">About</a></body></html>"#,
            )
            .insert_header("etag", "\"home-v1\""),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(
            html(r#"<html><body><img src="/logo.png"></body></html>"#)
                .insert_header("etag", "\"about-v1\""),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/s.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/css")
                .insert_header("etag", "\"css-v1\"")
                .set_body_string("body{background:url(bg.png)}"),
        )
        .mount(server)
        .await;

    for image in ["/logo.png", "/bg.png"] {
        Mock::given(method("GET"))
            .and(path(image))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .insert_header("etag", "\"img-v1\"")
                    .set_body_bytes(vec![7u8; 32]),
            )
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_unchanged_rerun_is_idempotent() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_missing_robots(&mock_server).await;
    mount_versioned_site(&mock_server).await;

    let out = TempDir::new().unwrap();
    let first = run(create_test_config(&base_url, out.path())).await;
    assert_eq!(first.stats.pages_saved, 2);
    assert_eq!(first.stats.assets_downloaded, 3);
    assert!(first.stats.bytes_written > 0);

    // Every conditional request is now answered with 304; nothing else may be served
    mock_server.reset().await;
    mount_missing_robots(&mock_server).await;
    Mock::given(method("GET"))
        .and(header_exists("if-none-match"))
        .respond_with(ResponseTemplate::new(304))
        .expect(5)
        .mount(&mock_server)
        .await;

    let second = run(create_test_config(&base_url, out.path())).await;

    assert_eq!(second.visited, first.visited);
    assert_eq!(second.assets, first.assets);
    assert_eq!(second.stats.pages_unchanged, 2);
    assert_eq!(second.stats.pages_saved, 0);
    assert_eq!(second.stats.assets_unchanged, 3);
    assert_eq!(second.stats.assets_downloaded, 0);
    assert_eq!(second.stats.bytes_written, 0);
}

#[tokio::test]
async fn test_deleted_file_refetched_after_304() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_missing_robots(&mock_server).await;
    mount_versioned_site(&mock_server).await;

    let out = TempDir::new().unwrap();
    run(create_test_config(&base_url, out.path())).await;

    let logo = out.path().join("logo.png");
    std::fs::remove_file(&logo).unwrap();

    mock_server.reset().await;
    mount_missing_robots(&mock_server).await;
    Mock::given(method("GET"))
        .and(header_exists("if-none-match"))
        .respond_with(ResponseTemplate::new(304))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .insert_header("etag", "\"img-v1\"")
                .set_body_bytes(vec![7u8; 32]),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = run(create_test_config(&base_url, out.path())).await;

    assert!(logo.is_file());
    assert_eq!(report.stats.assets_downloaded, 1);
    assert_eq!(report.stats.assets_unchanged, 2);
    assert_eq!(report.stats.bytes_written, 32);
}

#[tokio::test]
async fn test_fresh_run_ignores_prior_state() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_missing_robots(&mock_server).await;
    mount_versioned_site(&mock_server).await;

    let out = TempDir::new().unwrap();
    run(create_test_config(&base_url, out.path())).await;
    std::fs::write(out.path().join("stale.html"), "left over").unwrap();

    let mut config = create_test_config(&base_url, out.path());
    config.site.clean = CleanMode::EveryRun;
    let mut reports = Vec::new();
    let runs = run_scheduled(&config, Arc::new(NoopObserver), CancellationToken::new(), |_, r| {
        reports.push(r.clone())
    })
    .await
    .expect("Crawl failed");

    assert_eq!(runs, 1);
    let report = &reports[0];
    assert_eq!(report.stats.pages_saved, 2);
    assert_eq!(report.stats.assets_downloaded, 3);
    assert_eq!(report.stats.pages_unchanged, 0);
    assert!(!out.path().join("stale.html").exists());
    assert!(out.path().join(SITEMAP_FILE_NAME).is_file());

    // The fresh run's state covers every page and asset it fetched, and nothing else
    let state: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&read(&out, ".pagemirror/state.json")).unwrap();
    let mut expected: Vec<&String> = report.visited.iter().chain(report.assets.keys()).collect();
    expected.sort();
    let mut recorded: Vec<&String> = state.keys().collect();
    recorded.sort();
    assert_eq!(recorded, expected);
    assert_eq!(recorded.len(), 5);
}

#[tokio::test]
async fn test_scheduled_runs_stop_at_limit() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_missing_robots(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html><body><p>hi</p></body></html>"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let out = TempDir::new().unwrap();
    let mut config = create_test_config(&base_url, out.path());
    config.schedule.interval = Some("1s".to_string());
    config.schedule.max_runs = 2;

    let mut seen = Vec::new();
    let runs = run_scheduled(&config, Arc::new(NoopObserver), CancellationToken::new(), |run, r| {
        seen.push((run, r.pages_visited()))
    })
    .await
    .expect("Crawl failed");

    assert_eq!(runs, 2);
    assert_eq!(seen, vec![(1, 1), (2, 1)]);
    let index = read(&out, SITEMAP_FILE_NAME);
    assert!(index.contains(r#"href="index.html""#));
}
