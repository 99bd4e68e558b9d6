use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use webinsight_core::SearchQuery;
use webinsight_local::aggregate::{PipelineConfig, ResearchPipeline, DEFAULT_MAX_CONCURRENT};
use webinsight_local::extract::PageExtractor;
use webinsight_local::progress::ChannelProgress;
use webinsight_local::search::GoogleSearchBackend;
use webinsight_local::summarize::GeminiSummarizer;

#[derive(Parser, Debug)]
#[command(name = "webinsight")]
#[command(about = "Query-focused web research aggregation (search -> extract -> summarize)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the research pipeline for one query; prints a JSON array of results.
    Research(ResearchCmd),
    /// Diagnose configuration/launch issues (json; no secrets).
    Doctor,
    /// Print version info.
    Version,
}

#[derive(clap::Args, Debug)]
struct ResearchCmd {
    /// Free-text search query.
    query: String,

    /// Result count cap; bounds downstream fan-out cost.
    #[arg(long, default_value_t = 3)]
    num: usize,
    /// Country restriction (provider `cr`, e.g. "countryUS").
    #[arg(long)]
    country: Option<String>,
    /// Geolocation bias (provider `gl`, e.g. "us").
    #[arg(long)]
    locale: Option<String>,
    /// Restrict results to a single site/host.
    #[arg(long)]
    site: Option<String>,
    /// Exact phrase all results must contain.
    #[arg(long)]
    exact: Option<String>,
    /// Date restriction in provider syntax (e.g. "d7", "w2", "m6").
    #[arg(long)]
    date_restrict: Option<String>,

    /// Cap on concurrently in-flight page branches.
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT)]
    max_concurrent: usize,
    /// Outer deadline for the whole fan-out, in milliseconds. Branches still
    /// in flight when it elapses degrade to placeholder summaries.
    #[arg(long)]
    deadline_ms: Option<u64>,
    /// Suppress progress notices on stderr.
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Research(cmd) => research(cmd).await,
        Commands::Doctor => doctor(),
        Commands::Version => version(),
    }
}

async fn research(cmd: ResearchCmd) -> Result<()> {
    let api = webinsight_local::api_client()?;
    let search = Arc::new(GoogleSearchBackend::from_env(api.clone())?);
    let summarizer = Arc::new(GeminiSummarizer::from_env(api)?);
    let extractor = Arc::new(PageExtractor::new()?);

    let pipeline = ResearchPipeline::with_config(
        search,
        extractor,
        summarizer,
        PipelineConfig {
            max_concurrent: cmd.max_concurrent,
            deadline: cmd.deadline_ms.map(Duration::from_millis),
        },
    );

    let q = SearchQuery {
        query: cmd.query,
        max_results: Some(cmd.num),
        country: cmd.country,
        locale: cmd.locale,
        site: cmd.site,
        exact_terms: cmd.exact,
        date_restrict: cmd.date_restrict,
        timeout_ms: None,
    };

    // Progress is a side channel: stdout stays pure JSON, notices go to
    // stderr, and a dropped receiver costs the pipeline nothing.
    let (sink, rx) = ChannelProgress::new();
    let drain = if cmd.quiet {
        drop(rx);
        None
    } else {
        let mut rx = rx;
        Some(tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                eprintln!("[{}] {}", ev.stage, ev.message);
            }
        }))
    };

    let items = pipeline.run(&q, &sink).await?;
    drop(sink);
    if let Some(handle) = drain {
        let _ = handle.await;
    }

    if items.is_empty() {
        eprintln!("no results found");
    }
    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}

fn env_present(keys: &[&str]) -> bool {
    keys.iter()
        .any(|k| std::env::var(k).map(|v| !v.trim().is_empty()).unwrap_or(false))
}

fn doctor() -> Result<()> {
    // Report which collaborators are configured; never echo the values.
    let report = serde_json::json!({
        "google_search": {
            "api_key": env_present(&["WEBINSIGHT_GOOGLE_API_KEY", "GOOGLE_API_KEY"]),
            "cx": env_present(&["WEBINSIGHT_GOOGLE_CX", "GOOGLE_CSE_ID"]),
            "endpoint_override": env_present(&["WEBINSIGHT_GOOGLE_ENDPOINT"]),
        },
        "gemini": {
            "api_key": env_present(&["WEBINSIGHT_GEMINI_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"]),
            "model_override": env_present(&["WEBINSIGHT_GEMINI_MODEL"]),
            "base_url_override": env_present(&["WEBINSIGHT_GEMINI_BASE_URL"]),
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn version() -> Result<()> {
    let v = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    });
    println!("{}", serde_json::to_string_pretty(&v)?);
    Ok(())
}
