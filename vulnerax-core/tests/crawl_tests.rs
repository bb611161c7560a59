// Tests for scan execution across one or more targets

use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use vulnerax_core::config::ScanConfig;
use vulnerax_core::crawl::{ScanOptions, execute_scan, generate_scan_report};
use vulnerax_scanner::error::{ConfigError, ScanError};
use vulnerax_scanner::result::StopReason;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(format!("<html><body>{}</body></html>", body), "text/html"),
        )
        .mount(server)
        .await;
}

fn options(targets: Vec<String>, config: ScanConfig) -> ScanOptions {
    ScanOptions {
        targets,
        config,
        show_progress_bars: false,
    }
}

#[tokio::test]
async fn test_scan_single_target() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/login">login</a>
           <script>axios.post('/api/session', creds)</script>"#,
    )
    .await;
    mount_page(
        &server,
        "/login",
        r#"<form action="/authenticate" method="POST">
             <input name="email" type="email" required>
             <input name="password" type="password">
           </form>"#,
    )
    .await;

    let reports = execute_scan(options(vec![server.uri()], ScanConfig::default()), None, None)
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert!(report.finished_at >= report.started_at);

    let auth = report.registry.get("/authenticate").unwrap();
    assert!(auth.form_fields["email"].required);
    assert!(!auth.form_fields["password"].required);

    let root = report.registry.get("/").unwrap();
    assert_eq!(root.api_endpoints.len(), 1);
    assert!(report.registry.get("/api/session").unwrap().methods.contains("POST"));
}

#[tokio::test]
async fn test_scan_multiple_targets_in_order() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    mount_page(&first, "/", r#"<a href="/only-first">x</a>"#).await;
    mount_page(&first, "/only-first", "").await;
    mount_page(&second, "/", r#"<a href="/only-second">x</a>"#).await;
    mount_page(&second, "/only-second", "").await;

    let messages = Arc::new(Mutex::new(Vec::new()));
    let messages_clone = messages.clone();
    let callback = Arc::new(move |msg: String| {
        messages_clone.lock().unwrap().push(msg);
    });

    let reports = execute_scan(
        options(vec![first.uri(), second.uri()], ScanConfig::default()),
        None,
        Some(callback),
    )
    .await
    .unwrap();

    assert_eq!(reports.len(), 2);
    assert!(reports[0].registry.contains("/only-first"));
    assert!(!reports[0].registry.contains("/only-second"));
    assert!(reports[1].registry.contains("/only-second"));

    let messages = messages.lock().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].starts_with("Scanning host 1/2"));

    let summary = generate_scan_report(&reports);
    assert!(summary.contains("Endpoints found: 4"));
}

#[tokio::test]
async fn test_invalid_target_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = execute_scan(
        options(
            vec![server.uri(), "ftp://files.example.com".to_string()],
            ScanConfig::default(),
        ),
        None,
        None,
    )
    .await;

    assert!(matches!(
        result,
        Err(ScanError::Config(ConfigError::UnsupportedScheme(_)))
    ));
}

#[tokio::test]
async fn test_page_cap_from_config() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/a">a</a><a href="/b">b</a>"#).await;

    let config = ScanConfig {
        max_pages: Some(1),
        ..Default::default()
    };
    let reports = execute_scan(options(vec![server.uri()], config), None, None)
        .await
        .unwrap();

    assert_eq!(reports[0].registry.len(), 1);
    assert_eq!(reports[0].stop_reason, StopReason::PageCap);
}

#[tokio::test]
async fn test_cancelled_scan_skips_remaining_targets() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    mount_page(&first, "/", "").await;
    mount_page(&second, "/", "").await;

    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let reports = execute_scan(
        options(vec![first.uri(), second.uri()], ScanConfig::default()),
        Some(rx),
        None,
    )
    .await
    .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].stop_reason, StopReason::Cancelled);
    assert!(reports[0].registry.is_empty());
}

#[tokio::test]
async fn test_huge_duration_from_config_runs_normally() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/next">next</a>"#).await;
    mount_page(&server, "/next", "").await;

    let config = ScanConfig {
        max_duration_seconds: Some(1.0e19),
        ..Default::default()
    };
    let reports = execute_scan(options(vec![server.uri()], config), None, None)
        .await
        .unwrap();

    assert_eq!(reports[0].stop_reason, StopReason::Exhausted);
    assert!(reports[0].registry.contains("/next"));
}
