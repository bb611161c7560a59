use crate::config::ScanConfig;
use chrono::{DateTime, Utc};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use url::Url;
use vulnerax_scanner::error::ScanError;
use vulnerax_scanner::registry::EndpointRegistry;
use vulnerax_scanner::result::{CrawlResult, StopReason};
use vulnerax_scanner::target::TargetScope;
use vulnerax_scanner::{Crawler, scope};

/// Options for one scan run over one or more targets
pub struct ScanOptions {
    pub targets: Vec<String>,
    pub config: ScanConfig,
    pub show_progress_bars: bool,
}

/// Callback for status lines between targets
pub type ScanProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Frozen outcome of crawling one target.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub root: String,
    pub registry: EndpointRegistry,
    pub pages: Vec<CrawlResult>,
    pub stop_reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanReport {
    /// Every URL the crawler visited, in visit order, without repeats.
    pub fn visited_urls(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.pages
            .iter()
            .map(|p| p.url.as_str())
            .filter(|url| seen.insert(*url))
            .collect()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn dead_ends(&self) -> usize {
        self.pages.iter().filter(|p| p.is_dead_end()).count()
    }
}

/// Scan every target in turn.
///
/// All targets are validated before the first request, so a bad URL or
/// option fails the whole run up front. A cancellation stops the current
/// target and skips the rest; the reports gathered so far are returned.
pub async fn execute_scan(
    options: ScanOptions,
    cancel: Option<watch::Receiver<bool>>,
    progress_callback: Option<ScanProgressCallback>,
) -> Result<Vec<ScanReport>, ScanError> {
    let ScanOptions {
        targets,
        config,
        show_progress_bars,
    } = options;

    let scopes = targets
        .iter()
        .map(|target| config.validate(target))
        .collect::<Result<Vec<TargetScope>, _>>()?;

    let mut reports = Vec::with_capacity(scopes.len());
    let total = scopes.len();

    for (idx, target_scope) in scopes.into_iter().enumerate() {
        if let Some(ref callback) = progress_callback
            && total > 1
        {
            callback(format!(
                "Scanning host {}/{}: {}",
                idx + 1,
                total,
                target_scope.root()
            ));
        }

        let root = target_scope.root().to_string();
        let progress_bar = show_progress_bars.then(|| Arc::new(spinner()));

        let mut crawler = Crawler::new(target_scope)?;
        if let Some(ref pb) = progress_bar {
            let pb = pb.clone();
            crawler = crawler.with_progress_callback(Arc::new(move |count: usize, url: String| {
                pb.set_message(format!("Crawling... {} pages | {}", count, url));
            }));
        }
        if let Some(ref rx) = cancel {
            crawler = crawler.with_cancellation(rx.clone());
        }

        let started_at = Utc::now();
        let outcome = crawler.crawl().await;
        let finished_at = Utc::now();

        if let Some(ref pb) = progress_bar {
            pb.finish_with_message(format!(
                "Crawl complete! {} pages, {} endpoints ({})",
                outcome.pages.len(),
                outcome.registry.len(),
                outcome.stop_reason
            ));
        }
        info!(
            "Scan of {} finished: {} endpoints",
            root,
            outcome.registry.len()
        );

        let stop_reason = outcome.stop_reason;
        reports.push(ScanReport {
            root,
            registry: outcome.registry,
            pages: outcome.pages,
            stop_reason,
            started_at,
            finished_at,
        });

        if stop_reason == StopReason::Cancelled {
            if let Some(ref callback) = progress_callback
                && idx + 1 < total
            {
                callback(format!("[!] Cancelled, skipping {} remaining hosts", total - idx - 1));
            }
            break;
        }
    }

    Ok(reports)
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Starting crawl...");
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Terminal summary of a scan: totals, then pages and endpoints per host.
pub fn generate_scan_report(reports: &[ScanReport]) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");

    let pages: usize = reports.iter().map(|r| r.pages.len()).sum();
    let dead_ends: usize = reports.iter().map(|r| r.dead_ends()).sum();
    let endpoints: usize = reports.iter().map(|r| r.registry.len()).sum();
    let forms: usize = reports
        .iter()
        .flat_map(|r| &r.pages)
        .map(|p| p.forms_found)
        .sum();
    let api_calls: usize = reports
        .iter()
        .flat_map(|r| r.registry.records())
        .map(|record| record.api_endpoints.len())
        .sum();

    report.push_str(&format!("  Pages visited: {} ({} dead ends)\n", pages, dead_ends));
    report.push_str(&format!("  Endpoints found: {}\n", endpoints));
    report.push_str(&format!("  Forms found: {}\n", forms));
    report.push_str(&format!("  Script API calls found: {}\n", api_calls));

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    for scan in reports {
        report.push_str(&format!("## {}\n", host_label(&scan.root)));
        report.push_str(&format!(
            "  {} endpoints, {} pages in {}s ({})\n\n",
            scan.registry.len(),
            scan.pages.len(),
            scan.duration().num_seconds(),
            scan.stop_reason
        ));

        // Status per visited path; dead ends without a status are left out
        let statuses: BTreeMap<String, u16> = scan
            .pages
            .iter()
            .filter(|p| p.status_code != 0)
            .filter_map(|p| Url::parse(&p.url).ok().map(|u| (scope::canonical_path(&u), p.status_code)))
            .collect();

        for record in scan.registry.records() {
            let methods = record
                .methods
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(",");

            let status = match statuses.get(&record.path) {
                Some(code) => color_status(*code),
                None => "---".dimmed().to_string(),
            };

            let mut line = format!("  {} {} {}", status, record.path, methods.bold());
            if !record.form_fields.is_empty() {
                let fields = record.form_fields.keys().cloned().collect::<Vec<_>>().join(", ");
                line.push_str(&format!(" {}", format!("[{}]", fields).bright_black()));
            }
            report.push_str(&line);
            report.push('\n');

            for api in &record.api_endpoints {
                report.push_str(&format!("      {} {} {}\n", "↳".cyan(), api.method, api.url));
            }
        }
        report.push('\n');
    }

    report
}

fn host_label(root: &str) -> String {
    Url::parse(root)
        .ok()
        .and_then(|u| u.host_str().map(|host| match u.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }))
        .unwrap_or_else(|| root.to_string())
}

fn color_status(code: u16) -> String {
    let text = code.to_string();
    match code {
        200..=299 => text.green().to_string(),
        300..=399 => text.cyan().to_string(),
        400..=499 => text.yellow().to_string(),
        500..=599 => text.red().to_string(),
        _ => text,
    }
}
