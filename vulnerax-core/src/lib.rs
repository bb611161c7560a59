pub mod config;
pub mod crawl;
pub mod export;

pub use config::ScanConfig;
pub use crawl::{ScanOptions, ScanReport, execute_scan, generate_scan_report};
pub use export::ExportFormat;

use colored::Colorize;

pub fn print_banner() {
    let banner = r#"
 __     __      _                      __  __
 \ \   / /_   _| |_ __   ___ _ __ __ _\ \/ /
  \ \ / /| | | | | '_ \ / _ \ '__/ _` |\  /
   \ V / | |_| | | | | |  __/ | | (_| |/  \
    \_/   \__,_|_|_| |_|\___|_|  \__,_/_/\_\
"#;
    eprintln!("{}", banner.bright_red().bold());
    eprintln!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_white(),
        "attack surface discovery. For authorized testing only.".dimmed()
    );
}
