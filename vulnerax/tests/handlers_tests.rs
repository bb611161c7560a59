use clap::{Arg, ArgAction, Command};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use url::Url;
use vulnerax::handlers::*;
use vulnerax_core::export::{ExportFormat, FORMATTED_FILE};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

#[test]
fn test_parse_url_line_with_scheme() {
    let result = parse_url_line("https://example.com");
    assert_eq!(result, Some("https://example.com".to_string()));
}

#[test]
fn test_parse_url_line_without_scheme() {
    let result = parse_url_line("example.com");
    assert_eq!(result, Some("http://example.com".to_string()));
}

#[test]
fn test_parse_url_line_host_and_port() {
    let result = parse_url_line("localhost:8080");
    assert_eq!(result, Some("http://localhost:8080".to_string()));
}

#[test]
fn test_parse_url_line_invalid() {
    let result = parse_url_line("not a valid url!!!");
    assert_eq!(result, None);
}

#[test]
fn test_load_urls_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://example.com")?;
    writeln!(temp_file, "httpbin.org")?;
    writeln!(temp_file)?; // Empty line
    writeln!(temp_file, "# staging hosts")?;
    writeln!(temp_file, "  https://api.example.com  ")?;

    let path = PathBuf::from(temp_file.path());
    let urls = load_urls_from_file(&path)?;

    assert_eq!(urls.len(), 3);
    assert_eq!(urls[0], "https://example.com");
    assert_eq!(urls[1], "http://httpbin.org");
    assert_eq!(urls[2], "https://api.example.com");

    Ok(())
}

#[test]
fn test_load_urls_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   ").unwrap();

    let path = PathBuf::from(temp_file.path());
    let result = load_urls_from_file(&path);

    assert!(result.is_err());
    assert!(result.unwrap_err().contains("No valid URLs"));
}

#[test]
fn test_load_urls_from_source_single_url() {
    let url = Url::parse("https://example.com").unwrap();
    let result = load_urls_from_source(Some(&url), None).unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result[0], "https://example.com/");
}

#[test]
fn test_load_urls_from_source_no_input() {
    let result = load_urls_from_source(None, None);
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .contains("Either --url or --hosts-file must be provided")
    );
}

#[test]
fn test_resolve_format() {
    let csv = "csv".to_string();
    assert_eq!(resolve_format(Some(&csv), None).unwrap(), ExportFormat::Csv);
    assert_eq!(
        resolve_format(None, Some(Path::new("out/report.md"))).unwrap(),
        ExportFormat::Markdown
    );
    assert_eq!(
        resolve_format(None, Some(Path::new("out/report"))).unwrap(),
        ExportFormat::Text
    );
    // An explicit format beats the extension
    assert_eq!(
        resolve_format(Some(&"json".to_string()), Some(Path::new("r.csv"))).unwrap(),
        ExportFormat::Json
    );
}

/// Just the scan options part of the real command line.
fn scan_command() -> Command {
    let value = |name: &'static str| Arg::new(name).long(name);
    Command::new("scan")
        .arg(value("config").value_parser(clap::value_parser!(PathBuf)))
        .arg(value("threads").value_parser(clap::value_parser!(usize)))
        .arg(value("max-pages").value_parser(clap::value_parser!(usize)))
        .arg(value("max-depth").value_parser(clap::value_parser!(usize)))
        .arg(value("timeout").value_parser(clap::value_parser!(f64)))
        .arg(value("max-duration").value_parser(clap::value_parser!(f64)))
        .arg(value("user-agent"))
        .arg(value("allow-cross-origin").action(ArgAction::SetTrue))
        .arg(value("url").value_parser(clap::value_parser!(Url)))
        .arg(value("hosts-file").value_parser(clap::value_parser!(PathBuf)))
        .arg(value("output").value_parser(clap::value_parser!(PathBuf)))
        .arg(value("output-dir").value_parser(clap::value_parser!(PathBuf)))
        .arg(value("format"))
}

#[test]
fn test_build_scan_config_defaults() {
    let matches = scan_command().get_matches_from(["scan"]);
    let config = build_scan_config(&matches).unwrap();
    assert_eq!(config, vulnerax_core::ScanConfig::default());
}

#[test]
fn test_flags_override_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"{{ "maxPages": 10, "workers": 2, "userAgent": "from-file" }}"#
    )?;
    let config_path = file.path().to_string_lossy().to_string();

    let matches = scan_command().get_matches_from([
        "scan",
        "--config",
        config_path.as_str(),
        "--max-pages",
        "3",
        "--allow-cross-origin",
    ]);
    let config = build_scan_config(&matches)?;

    assert_eq!(config.max_pages, Some(3));
    assert_eq!(config.workers, 2);
    assert_eq!(config.user_agent, "from-file");
    assert!(!config.same_origin_only);
    Ok(())
}

#[test]
fn test_bad_config_file_is_an_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();
    let config_path = file.path().to_string_lossy().to_string();

    let matches = scan_command().get_matches_from(["scan", "--config", config_path.as_str()]);
    let err = build_scan_config(&matches).unwrap_err();
    assert!(err.to_string().contains("Invalid config file"));
}

#[tokio::test]
async fn test_handle_scan_writes_output_dir() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    r#"<form action="/search" method="get"><input name="q"></form>"#,
                    "text/html",
                ),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new()?;
    let root = server.uri();
    let output_dir = dir.path().to_string_lossy().to_string();
    let report_file = dir.path().join("report.csv").to_string_lossy().to_string();
    let matches = scan_command().get_matches_from([
        "scan",
        "--url",
        root.as_str(),
        "--output-dir",
        output_dir.as_str(),
        "--output",
        report_file.as_str(),
    ]);

    handle_scan(&matches, true).await?;

    let formatted: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(FORMATTED_FILE))?)?;
    let entries = formatted.as_array().ok_or("not an array")?;
    assert!(entries.iter().any(|e| e["path"] == "/" && e["method"] == "GET"));

    let csv = std::fs::read_to_string(dir.path().join("report.csv"))?;
    assert!(csv.starts_with("path,method,form_fields,api_endpoints"));
    assert!(csv.contains("/search,GET,q,"));
    Ok(())
}

#[tokio::test]
async fn test_handle_scan_requires_a_target() {
    let matches = scan_command().get_matches_from(["scan"]);
    let err = handle_scan(&matches, true).await.unwrap_err();
    assert!(err.to_string().contains("Either --url or --hosts-file"));
}
