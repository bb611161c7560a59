// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    build_scan_config, handle_scan, init_logging, load_urls_from_file, load_urls_from_source,
    parse_url_line, resolve_format,
};

// Re-export scan functionality from vulnerax-core
pub use vulnerax_core::crawl::{ScanOptions, ScanReport, execute_scan, generate_scan_report};
