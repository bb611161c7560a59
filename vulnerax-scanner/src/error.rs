use thiserror::Error;

/// Problems with the scan configuration. These are the only fatal errors:
/// they are raised before any request is sent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid root URL '{0}': {1}")]
    InvalidUrl(String, String),

    #[error("Unsupported scheme '{0}', expected http or https")]
    UnsupportedScheme(String),

    #[error("Root URL has no host: {0}")]
    MissingHost(String),

    #[error("Timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),

    #[error("Scan duration must be a positive number of seconds, got {0}")]
    InvalidDuration(f64),

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Failed to read config file {0}: {1}")]
    Unreadable(String, String),

    #[error("Invalid config file {0}: {1}")]
    Malformed(String, String),
}

/// Why a single page became a dead end. Logged and swallowed by the crawler.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Not an HTML document ({})", .0.as_deref().unwrap_or("no content-type"))]
    NotHtml(Option<String>),

    #[error("Redirected out of scope to {0}")]
    OutOfScope(String),
}

impl FetchError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Request(err)
        }
    }
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
