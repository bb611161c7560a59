use crate::registry::EndpointRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What happened when one frontier URL was visited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub depth: usize,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub response_time: Duration,
    pub links_found: Vec<String>,
    pub forms_found: usize,
    pub inline_scripts: usize,
    pub api_calls_found: usize,
    /// Named inputs outside any form, counted but not registered
    pub standalone_fields: usize,
    pub error: Option<String>,
}

impl CrawlResult {
    pub fn new(url: String, depth: usize) -> Self {
        Self {
            url,
            depth,
            status_code: 0,
            content_type: None,
            response_time: Duration::from_secs(0),
            links_found: Vec::new(),
            forms_found: 0,
            inline_scripts: 0,
            api_calls_found: 0,
            standalone_fields: 0,
            error: None,
        }
    }

    pub fn with_error(url: String, depth: usize, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(url, depth)
        }
    }

    pub fn is_dead_end(&self) -> bool {
        self.error.is_some()
    }
}

/// Why the crawl loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Nothing left to visit
    Exhausted,
    /// `max_pages` reached with URLs still queued
    PageCap,
    /// Wall-clock budget ran out
    Deadline,
    Cancelled,
}

impl StopReason {
    /// True when the registry may be missing reachable endpoints.
    pub fn is_partial(&self) -> bool {
        !matches!(self, StopReason::Exhausted)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopReason::Exhausted => "frontier exhausted",
            StopReason::PageCap => "page limit reached",
            StopReason::Deadline => "time limit reached",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(reason)
    }
}

/// Everything a finished crawl hands back.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub registry: EndpointRegistry,
    /// One entry per visited URL, in completion order
    pub pages: Vec<CrawlResult>,
    pub stop_reason: StopReason,
}

impl CrawlOutcome {
    pub fn dead_ends(&self) -> usize {
        self.pages.iter().filter(|p| p.is_dead_end()).count()
    }
}
