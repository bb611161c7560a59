// Export of scan results to files and stdout

use crate::crawl::ScanReport;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;
use vulnerax_scanner::error::ScanError;
use vulnerax_scanner::registry::{ApiCallObservation, EndpointRecord, FormField};

/// Files written by [`write_output_dir`].
pub const VISITED_FILE: &str = "endpoints.json";
pub const DETAILED_FILE: &str = "detailed_endpoints.json";
pub const FORMATTED_FILE: &str = "formatted_endpoints.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    /// Registry as a JSON array of records
    Json,
    /// One JSON entry per (path, method)
    Flat,
    /// JSON array of visited page URLs
    Urls,
    Text,
    Markdown,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "flat" | "formatted" => Some(ExportFormat::Flat),
            "urls" => Some(ExportFormat::Urls),
            "text" | "txt" => Some(ExportFormat::Text),
            "markdown" | "md" => Some(ExportFormat::Markdown),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json | ExportFormat::Flat | ExportFormat::Urls => "json",
            ExportFormat::Text => "txt",
            ExportFormat::Markdown => "md",
            ExportFormat::Csv => "csv",
        }
    }

    pub const NAMES: &'static [&'static str] = &["json", "flat", "urls", "text", "markdown", "csv"];
}

/// A record seen through one of its methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatEndpoint {
    pub path: String,
    pub method: String,
    pub form_fields: Vec<FormField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_endpoints: Vec<ApiCallObservation>,
}

pub fn flatten(records: &[&EndpointRecord]) -> Vec<FlatEndpoint> {
    records
        .iter()
        .flat_map(|record| {
            record.methods.iter().map(move |method| FlatEndpoint {
                path: record.path.clone(),
                method: method.clone(),
                form_fields: record.form_fields.values().cloned().collect(),
                api_endpoints: record.api_endpoints.iter().cloned().collect(),
            })
        })
        .collect()
}

/// Render one report in `format`.
pub fn render(report: &ScanReport, format: ExportFormat) -> Result<String, ScanError> {
    let records: Vec<&EndpointRecord> = report.registry.records().collect();
    let content = match format {
        ExportFormat::Json => serde_json::to_string_pretty(&report.registry)?,
        ExportFormat::Flat => serde_json::to_string_pretty(&flatten(&records))?,
        ExportFormat::Urls => serde_json::to_string_pretty(&report.visited_urls())?,
        ExportFormat::Text => generate_text_report(report),
        ExportFormat::Markdown => generate_markdown_report(report),
        ExportFormat::Csv => generate_csv_report(&records),
    };
    Ok(content)
}

pub fn generate_text_report(report: &ScanReport) -> String {
    let mut out = String::new();

    out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    out.push_str("                      VULNERAX ATTACK SURFACE REPORT\n");
    out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    out.push_str(&format!("Target:       {}\n", report.root));
    out.push_str(&format!("Scan Date:    {}\n", report.started_at.format("%Y-%m-%d %H:%M:%S UTC")));
    out.push_str(&format!("Duration:     {} seconds\n", report.duration().num_seconds()));
    out.push_str(&format!("Stopped:      {}\n", report.stop_reason));
    out.push_str(&format!("Pages:        {} ({} dead ends)\n", report.pages.len(), report.dead_ends()));
    out.push_str(&format!("Endpoints:    {}\n\n", report.registry.len()));

    for record in report.registry.records() {
        let methods: Vec<&str> = record.methods.iter().map(String::as_str).collect();
        out.push_str(&format!("[{}] {}\n", methods.join(", "), record.path));

        for field in record.form_fields.values() {
            out.push_str(&format!("    field  {} ({}", field.name, field.field_type));
            if field.required {
                out.push_str(", required");
            }
            out.push(')');
            if let Some(ref placeholder) = field.placeholder {
                out.push_str(&format!(" \"{}\"", placeholder));
            }
            if let Some(ref options) = field.options {
                let options: Vec<&str> = options.iter().map(String::as_str).collect();
                out.push_str(&format!(" options: {}", options.join("|")));
            }
            out.push('\n');
        }
        for api in &record.api_endpoints {
            out.push_str(&format!("    api    {} {}\n", api.method, api.url));
        }
    }

    out.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    out.push_str("Generated by VulneraX. For authorized security testing only.\n");
    out
}

pub fn generate_markdown_report(report: &ScanReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Attack surface of {}\n\n", report.root));
    out.push_str(&format!(
        "- Scanned: {}\n- Pages visited: {}\n- Endpoints: {}\n- Stopped: {}\n\n",
        report.started_at.to_rfc3339(),
        report.pages.len(),
        report.registry.len(),
        report.stop_reason
    ));

    out.push_str("| Path | Methods | Form fields | Script API calls |\n");
    out.push_str("|------|---------|-------------|------------------|\n");
    for record in report.registry.records() {
        let methods: Vec<&str> = record.methods.iter().map(String::as_str).collect();
        let fields: Vec<String> = record
            .form_fields
            .values()
            .map(|f| {
                if f.required {
                    format!("`{}`*", f.name)
                } else {
                    format!("`{}`", f.name)
                }
            })
            .collect();
        let apis: Vec<String> = record
            .api_endpoints
            .iter()
            .map(|a| format!("{} `{}`", a.method, a.url))
            .collect();
        out.push_str(&format!(
            "| `{}` | {} | {} | {} |\n",
            record.path,
            methods.join(", "),
            fields.join(", "),
            apis.join("<br>")
        ));
    }
    out
}

/// One row per (path, method), like the flat JSON view.
pub fn generate_csv_report(records: &[&EndpointRecord]) -> String {
    let mut out = String::from("path,method,form_fields,api_endpoints\n");
    for entry in flatten(records) {
        let fields: Vec<&str> = entry.form_fields.iter().map(|f| f.name.as_str()).collect();
        let apis: Vec<String> = entry
            .api_endpoints
            .iter()
            .map(|a| format!("{} {}", a.method, a.url))
            .collect();
        out.push_str(&format!(
            "{},{},{},{}\n",
            csv_field(&entry.path),
            csv_field(&entry.method),
            csv_field(&fields.join(";")),
            csv_field(&apis.join(";"))
        ));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Write the visited URL list, the registry and the flat view into `dir`.
pub fn write_output_dir(report: &ScanReport, dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for (name, format) in [
        (VISITED_FILE, ExportFormat::Urls),
        (DETAILED_FILE, ExportFormat::Json),
        (FORMATTED_FILE, ExportFormat::Flat),
    ] {
        let path = dir.join(name);
        save_report(&render(report, format)?, &path)?;
        written.push(path);
    }
    Ok(written)
}

/// File-name safe label for a scan root, e.g. `example.com_8080`.
pub fn target_slug(root: &str) -> String {
    let label = match Url::parse(root) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}_{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => root.to_string(),
        },
        Err(_) => root.to_string(),
    };
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

/// `path` with the target slug added before the extension, used when one
/// output file is requested for several targets.
pub fn per_target_path(path: &Path, root: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("report");
    let slug = target_slug(root);
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}-{}.{}", stem, slug, ext),
        None => format!("{}-{}", stem, slug),
    };
    path.with_file_name(name)
}
