use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Only failures that abort a whole pipeline run. Per-candidate extraction
/// and summarization failures are absorbed into degraded outcomes instead.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("search failed: {0}")]
    Search(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Summary text used when a page yielded no extractable article content.
pub const NO_CONTENT_FALLBACK: &str = "No readable content was found on this page.";
/// Summary text used when extraction failed outright (network, status, parse).
pub const EXTRACTION_FALLBACK: &str = "Could not retrieve content from this page.";
/// Summary text used when the model call timed out.
pub const SUMMARIZE_TIMEOUT_FALLBACK: &str = "Summarization timed out for this page.";
/// Summary text used when the model call failed or returned nothing usable.
pub const SUMMARIZE_FAILED_FALLBACK: &str = "Failed to summarize the content of this page.";
/// Summary text used when a branch was abandoned at the pipeline deadline.
pub const DEADLINE_FALLBACK: &str = "Processing this page did not finish before the deadline.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    /// Result count cap; bounds downstream fan-out cost. Default 3, provider max 10.
    pub max_results: Option<usize>,
    /// Country restriction (provider `cr`, e.g. "countryUS").
    pub country: Option<String>,
    /// Geolocation bias (provider `gl`, e.g. "us").
    pub locale: Option<String>,
    /// Restrict results to a single site/host.
    pub site: Option<String>,
    /// Exact phrase all results must contain.
    pub exact_terms: Option<String>,
    /// Date restriction (provider syntax, e.g. "d7", "w2", "m6").
    pub date_restrict: Option<String>,
    /// Timeout for the provider call itself.
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// One ranked candidate page. List order encodes provider relevance and is
/// preserved end-to-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub thumbnail_url: Option<String>,
    pub full_image_url: Option<String>,
}

/// Outcome of one extraction attempt. `text.is_empty()` with `error: None`
/// means the page fetched fine but held no article content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub url: String,
    pub text: String,
    pub error: Option<String>,
}

impl Extraction {
    pub fn ok(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            error: None,
        }
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Per-candidate summary. `text` is never blank: failures degrade to one of
/// the fixed fallback strings instead of being dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub url: String,
    pub text: String,
    pub error: Option<String>,
}

/// The externally visible unit: one per input hit, same order, same count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchItem {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub thumbnail_url: Option<String>,
    pub full_image_url: Option<String>,
    pub summary: String,
}

impl ResearchItem {
    pub fn from_hit(hit: SearchHit, summary: String) -> Self {
        Self {
            title: hit.title,
            url: hit.url,
            snippet: hit.snippet,
            thumbnail_url: hit.thumbnail_url,
            full_image_url: hit.full_image_url,
            summary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    Search,
    Extract,
    Summarize,
    Aggregate,
}

impl std::fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Search => "search",
            Self::Extract => "extract",
            Self::Summarize => "summarize",
            Self::Aggregate => "aggregate",
        };
        f.write_str(s)
    }
}

/// Transient stage-transition notice. Never part of the pipeline result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(stage: ProgressStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;
    /// Ordered candidate list. An empty list is a valid non-error outcome.
    async fn search(&self, q: &SearchQuery) -> Result<Vec<SearchHit>>;
}

#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// Never errors: network/status/parse failures are captured in the outcome.
    async fn extract(&self, url: &str) -> Extraction;
}

#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    /// Never errors: failures degrade to a fixed fallback string. May return
    /// an empty string for a blank model response (callers substitute).
    async fn summarize(&self, text: &str, query: &str) -> String;
}

/// One-way event sink. Fire-and-forget: implementations must not block, and
/// sink failures must never affect pipeline correctness.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: ProgressEvent);
}

/// Sink that drops everything. Useful for tests and non-interactive callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn notify(&self, _event: ProgressEvent) {}
}
