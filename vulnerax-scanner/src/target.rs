use crate::error::ConfigError;
use crate::scope;
use std::time::Duration;
use url::{Origin, Url};

pub const DEFAULT_MAX_PAGES: usize = 200;
pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;
pub const DEFAULT_WORKERS: usize = 10;

pub fn default_user_agent() -> String {
    format!("VulneraX/{}", env!("CARGO_PKG_VERSION"))
}

/// Root URL plus the limits a scan runs under. Fixed for the lifetime of a
/// crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetScope {
    root: Url,
    /// `None` means unbounded
    pub max_pages: Option<usize>,
    /// Link distance from the root; `None` means unbounded
    pub max_depth: Option<usize>,
    pub timeout: Duration,
    pub user_agent: String,
    pub same_origin_only: bool,
    /// Wall-clock budget for the whole crawl
    pub max_duration: Option<Duration>,
    pub workers: usize,
}

impl TargetScope {
    /// Scope rooted at `root` with default limits.
    pub fn new(root: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(root.trim())
            .map_err(|e| ConfigError::InvalidUrl(root.to_string(), e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(parsed.scheme().to_string()));
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingHost(root.to_string()));
        }

        Ok(Self {
            root: scope::canonicalize(parsed),
            max_pages: Some(DEFAULT_MAX_PAGES),
            max_depth: Some(DEFAULT_MAX_DEPTH),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            user_agent: default_user_agent(),
            same_origin_only: true,
            max_duration: None,
            workers: DEFAULT_WORKERS,
        })
    }

    /// No page, depth or time caps.
    pub fn unbounded(mut self) -> Self {
        self.max_pages = None;
        self.max_depth = None;
        self.max_duration = None;
        self
    }

    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_same_origin_only(mut self, same_origin_only: bool) -> Self {
        self.same_origin_only = same_origin_only;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Option<Duration>) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    pub fn origin(&self) -> Origin {
        self.root.origin()
    }

    /// Check the limits. Called by the crawler before any request is sent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(self.timeout.as_secs_f64()));
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroLimit("workers"));
        }
        if self.max_pages == Some(0) {
            return Err(ConfigError::ZeroLimit("maxPages"));
        }
        if self.max_duration.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::ZeroLimit("maxDuration"));
        }
        Ok(())
    }
}
