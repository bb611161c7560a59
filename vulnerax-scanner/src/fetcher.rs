use crate::error::{ConfigError, FetchError};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// A fetched HTML document. Handed straight to the analyzers.
#[derive(Debug, Clone)]
pub struct Page {
    /// URL after redirects
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    pub response_time: Duration,
}

/// Thin wrapper over a pooled `reqwest` client.
///
/// Only successful `text/html` responses come back as a [`Page`]; any other
/// outcome is a [`FetchError`] for the caller to log and drop.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(50) // Connection pooling
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &Url) -> Result<Page, FetchError> {
        debug!("Fetching {}", url);

        let start = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        if !is_html(content_type.as_deref()) {
            return Err(FetchError::NotHtml(content_type));
        }

        let body = response.text().await.map_err(FetchError::from_reqwest)?;

        Ok(Page {
            final_url,
            status: status.as_u16(),
            content_type,
            body,
            response_time: start.elapsed(),
        })
    }
}

/// Whether a content-type header announces an HTML document.
pub fn is_html(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
        .unwrap_or(false)
}
