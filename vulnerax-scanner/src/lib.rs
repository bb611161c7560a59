//! Crawling and attack-surface extraction for VulneraX.
//!
//! A [`Crawler`] walks a [`TargetScope`] breadth first, extracts links,
//! forms and inline-script API calls from every HTML page, and merges what
//! it finds into an [`EndpointRegistry`] keyed by path.

pub mod analyzer;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod frontier;
pub mod registry;
pub mod result;
pub mod scope;
pub mod script;
pub mod target;

pub use analyzer::{FormDescriptor, PageAnalysis, PageAnalyzer};
pub use crawler::{Crawler, ProgressCallback, ResultCallback};
pub use error::{ConfigError, FetchError, ScanError};
pub use registry::{ApiCallObservation, EndpointRecord, EndpointRegistry, FormField};
pub use result::{CrawlOutcome, CrawlResult, StopReason};
pub use script::{RegexScriptExtractor, ScriptExtractor};
pub use target::TargetScope;
