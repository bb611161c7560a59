use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;
use vulnerax_core::config::ScanConfig;
use vulnerax_core::crawl::{ScanOptions, ScanReport, execute_scan, generate_scan_report};
use vulnerax_core::export::{self, ExportFormat};

// Helper functions for the scan handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file. Lines starting with `#` are comments.
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    // Try to parse as-is
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    // Try adding http://
    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    eprintln!("⚠️  Skipping invalid URL '{}'", line);
    None
}

/// Install the fmt subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Scan options from the config file, overridden by command-line flags.
pub fn build_scan_config(sub_matches: &ArgMatches) -> Result<ScanConfig> {
    let mut config = match sub_matches.get_one::<PathBuf>("config") {
        Some(path) => ScanConfig::from_file(&expand_path(path))?,
        None => ScanConfig::default(),
    };

    if let Some(&threads) = sub_matches.get_one::<usize>("threads") {
        config.workers = threads;
    }
    if let Some(&max_pages) = sub_matches.get_one::<usize>("max-pages") {
        config.max_pages = Some(max_pages);
    }
    if let Some(&max_depth) = sub_matches.get_one::<usize>("max-depth") {
        config.max_depth = Some(max_depth);
    }
    if let Some(&timeout) = sub_matches.get_one::<f64>("timeout") {
        config.timeout_seconds = timeout;
    }
    if let Some(&max_duration) = sub_matches.get_one::<f64>("max-duration") {
        config.max_duration_seconds = Some(max_duration);
    }
    if let Some(user_agent) = sub_matches.get_one::<String>("user-agent") {
        config.user_agent = user_agent.clone();
    }
    if sub_matches.get_flag("allow-cross-origin") {
        config.same_origin_only = false;
    }

    Ok(config)
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

/// Resolve the export format from `--format`, else the output extension.
pub fn resolve_format(format: Option<&String>, output: Option<&Path>) -> Result<ExportFormat> {
    if let Some(name) = format {
        return ExportFormat::from_str(name).with_context(|| format!("Unknown format '{}'", name));
    }
    let from_extension = output
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .and_then(ExportFormat::from_str);
    Ok(from_extension.unwrap_or(ExportFormat::Text))
}

/// Cancel the scan on the first Ctrl-C, exit on the second.
fn install_interrupt_handler() -> watch::Receiver<bool> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!(
            "\n{} Interrupted, finishing with partial results (Ctrl-C again to abort)",
            "[!]".yellow().bold()
        );
        let _ = cancel_tx.send(true);
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
    cancel_rx
}

pub async fn handle_scan(sub_matches: &ArgMatches, quiet: bool) -> Result<()> {
    let url = sub_matches.get_one::<Url>("url");
    let hosts_file = sub_matches.get_one::<PathBuf>("hosts-file");
    let output = sub_matches.get_one::<PathBuf>("output").map(|p| expand_path(p));
    let output_dir = sub_matches.get_one::<PathBuf>("output-dir").map(|p| expand_path(p));
    let format_arg = sub_matches.get_one::<String>("format");

    // Load URLs from source
    let targets = load_urls_from_source(url, hosts_file).map_err(anyhow::Error::msg)?;
    let config = build_scan_config(sub_matches)?;
    let format = resolve_format(format_arg, output.as_deref())?;
    debug!("Loaded {} targets, config {:?}", targets.len(), config);

    // Rendered report goes to stdout when a format is asked for without a file
    let report_to_stdout = output.is_none() && format_arg.is_some();
    let chatty = !quiet && !report_to_stdout;

    if chatty {
        println!("\n🕷️  Scanning {} host(s)", targets.len());
        println!("Workers: {}", config.workers);
        println!("Max pages: {}", describe_limit(config.max_pages));
        println!("Max depth: {}", describe_limit(config.max_depth));
        println!("Timeout: {}s", config.timeout_seconds);
        let origin_mode = if config.same_origin_only {
            "same origin only"
        } else {
            "cross-origin allowed"
        };
        println!("Scope: {}\n", origin_mode);
    }

    let options = ScanOptions {
        targets,
        config,
        show_progress_bars: chatty,
    };

    let progress_callback = Arc::new(|msg: String| {
        eprintln!("{}", msg);
    });

    let cancel = install_interrupt_handler();
    let reports = execute_scan(options, Some(cancel), Some(progress_callback))
        .await
        .context("Scan could not start")?;

    if reports.is_empty() {
        bail!("No targets were scanned");
    }

    if let Some(ref dir) = output_dir {
        write_output_dirs(&reports, dir, chatty)?;
    }

    if let Some(ref path) = output {
        write_output_files(&reports, path, format, chatty)?;
    } else if report_to_stdout {
        for report in &reports {
            println!("{}", export::render(report, format)?);
        }
    }

    if chatty {
        println!("\n✓ Scan complete!\n");
        print!("{}", generate_scan_report(&reports));
        for report in reports.iter().filter(|r| r.stop_reason.is_partial()) {
            println!(
                "{} {}: results are partial ({})",
                "⚠".yellow().bold(),
                report.root,
                report.stop_reason
            );
        }
    }

    Ok(())
}

fn describe_limit(limit: Option<usize>) -> String {
    limit.map_or_else(|| "unlimited".to_string(), |n| n.to_string())
}

fn write_output_dirs(reports: &[ScanReport], dir: &Path, chatty: bool) -> Result<()> {
    for report in reports {
        // One subdirectory per host when scanning several
        let target_dir = if reports.len() > 1 {
            dir.join(export::target_slug(&report.root))
        } else {
            dir.to_path_buf()
        };
        let written = export::write_output_dir(report, &target_dir)
            .with_context(|| format!("Failed to write results to {}", target_dir.display()))?;
        if chatty {
            for path in written {
                println!("{} Results saved to {}", "✓".green().bold(), path.display());
            }
        }
    }
    Ok(())
}

fn write_output_files(
    reports: &[ScanReport],
    path: &Path,
    format: ExportFormat,
    chatty: bool,
) -> Result<()> {
    for report in reports {
        let target_path = if reports.len() > 1 {
            export::per_target_path(path, &report.root)
        } else {
            path.to_path_buf()
        };
        let content = export::render(report, format)?;
        export::save_report(&content, &target_path)
            .with_context(|| format!("Failed to write report to {}", target_path.display()))?;
        if chatty {
            println!("{} Report saved to {}", "✓".green().bold(), target_path.display());
        }
    }
    Ok(())
}
