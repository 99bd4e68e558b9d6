use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use webinsight_core::{
    Error, Extractor, ProgressEvent, ProgressSink, ProgressStage, ResearchItem, Result,
    SearchBackend, SearchHit, SearchQuery, Summarizer, Summary, DEADLINE_FALLBACK,
    EXTRACTION_FALLBACK, NO_CONTENT_FALLBACK, SUMMARIZE_FAILED_FALLBACK,
};

/// Cap on in-flight extraction/summarization branches. The search result cap
/// already bounds fan-out width, but a larger `max_results` must not turn
/// into a burst of simultaneous fetches against target servers.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_concurrent: usize,
    /// Outer deadline for the whole fan-out. Branches still in flight when it
    /// elapses are abandoned and contribute a fixed placeholder summary;
    /// completed branches keep their real ones.
    pub deadline: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            deadline: None,
        }
    }
}

/// The orchestration core: dispatch one search, fan out one
/// extract→summarize chain per candidate, fan in at a barrier, and merge in
/// the provider's ranking order.
///
/// Per-branch failures are absorbed into placeholder summaries; the call as a
/// whole fails only when the search itself does. Every invocation is
/// stateless and safely repeatable.
pub struct ResearchPipeline {
    search: Arc<dyn SearchBackend>,
    extractor: Arc<dyn Extractor>,
    summarizer: Arc<dyn Summarizer>,
    config: PipelineConfig,
}

impl ResearchPipeline {
    pub fn new(
        search: Arc<dyn SearchBackend>,
        extractor: Arc<dyn Extractor>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self::with_config(search, extractor, summarizer, PipelineConfig::default())
    }

    pub fn with_config(
        search: Arc<dyn SearchBackend>,
        extractor: Arc<dyn Extractor>,
        summarizer: Arc<dyn Summarizer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            search,
            extractor,
            summarizer,
            config,
        }
    }

    /// Run the full pipeline for one query.
    ///
    /// Returns one `ResearchItem` per search hit, in the search backend's
    /// order; zero hits is a valid empty response, not an error.
    pub async fn run(
        &self,
        q: &SearchQuery,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<ResearchItem>> {
        progress.notify(ProgressEvent::new(
            ProgressStage::Search,
            format!("searching: {}", q.query),
        ));

        let hits = self.search.search(q).await?;
        debug!(backend = self.search.name(), hits = hits.len(), "search done");
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let deadline = self.config.deadline.map(|d| Instant::now() + d);

        // Fan-out/fan-in: all branches started together (bounded in-flight),
        // one barrier at collect. The slowest branch, or the deadline, bounds
        // total latency.
        let summaries: Vec<Summary> = stream::iter(hits.iter().cloned())
            .map(|hit| self.process(hit, &q.query, progress, deadline))
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        // Branches complete in arbitrary order; merge by URL, never by
        // position. Duplicate hits share the first outcome for their URL.
        let mut by_url: HashMap<String, Summary> = HashMap::new();
        for s in summaries {
            by_url.entry(s.url.clone()).or_insert(s);
        }

        progress.notify(ProgressEvent::new(
            ProgressStage::Aggregate,
            "aggregating insights",
        ));

        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            // A miss here is a logic bug, not an environmental failure.
            let summary = by_url
                .get(&hit.url)
                .ok_or_else(|| Error::Internal(format!("no summary produced for {}", hit.url)))?;
            out.push(ResearchItem::from_hit(hit, summary.text.clone()));
        }
        Ok(out)
    }

    async fn process(
        &self,
        hit: SearchHit,
        query: &str,
        progress: &dyn ProgressSink,
        deadline: Option<Instant>,
    ) -> Summary {
        let url = hit.url.clone();
        let work = self.process_one(&hit, query, progress);
        match deadline {
            None => work.await,
            Some(at) => match tokio::time::timeout_at(at, work).await {
                Ok(summary) => summary,
                Err(_) => {
                    warn!(url = %url, "branch abandoned at pipeline deadline");
                    Summary {
                        url,
                        text: DEADLINE_FALLBACK.to_string(),
                        error: Some("deadline elapsed".to_string()),
                    }
                }
            },
        }
    }

    async fn process_one(
        &self,
        hit: &SearchHit,
        query: &str,
        progress: &dyn ProgressSink,
    ) -> Summary {
        progress.notify(ProgressEvent::new(
            ProgressStage::Extract,
            format!("extracting {}", hit.url),
        ));

        let extraction = self.extractor.extract(&hit.url).await;
        if let Some(err) = extraction.error.as_deref() {
            warn!(url = %hit.url, error = err, "extraction failed; degrading");
        }

        if extraction.text.chars().all(char::is_whitespace) {
            // Skip the model call: either the fetch failed (absorbed above)
            // or the page simply held no article content.
            let text = if extraction.error.is_some() {
                EXTRACTION_FALLBACK
            } else {
                NO_CONTENT_FALLBACK
            };
            return Summary {
                url: hit.url.clone(),
                text: text.to_string(),
                error: extraction.error,
            };
        }

        progress.notify(ProgressEvent::new(
            ProgressStage::Summarize,
            format!("summarizing {}", hit.url),
        ));

        let text = self.summarizer.summarize(&extraction.text, query).await;
        if text.chars().all(char::is_whitespace) {
            warn!(url = %hit.url, "model returned no text; degrading");
            return Summary {
                url: hit.url.clone(),
                text: SUMMARIZE_FAILED_FALLBACK.to_string(),
                error: Some("model returned no text".to_string()),
            };
        }

        Summary {
            url: hit.url.clone(),
            text,
            error: None,
        }
    }
}
