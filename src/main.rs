// src/main.rs
// =============================================================================
// This is the entry point of the keysweep CLI.
//
// What happens here:
// 1. Parse command-line arguments using clap and set up logging
// 2. Dispatch to the subcommand handler (crawl, merge, search)
// 3. For a crawl: build the config, the keyspace and the shared collaborators,
//    run the orchestrator, then write or flush the results
// 4. Exit with a proper code:
//    0 = every query finished, 1 = some queries did not (malformed,
//    cancelled, or their results could not be written), 2 = the crawl could
//    not run (bad config, unreadable input, ...)
//
// Rust concepts used:
// - Arc<dyn Trait>: one collaborator shared by thousands of tasks
// - CancellationToken: a single switch that stops every worker
// - anyhow::Context: attach "what were we doing" to low-level errors
// =============================================================================

mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - crawl settings
mod crawl; // src/crawl/ - the crawl engine
mod dataset; // src/dataset/ - shards, merged data.json, search
mod error; // src/error.rs - typed errors
mod keyspace; // src/keyspace/ - query enumeration
mod logging; // src/logging.rs - tracing setup
mod model; // src/model.rs - queries and items
mod report; // src/report/ - item and diagnostic sinks

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, BufWriter};
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands, CrawlArgs, OutputMode};
use config::CrawlConfig;
use crawl::{
    AdmissionController, CrawlContext, CrawlSummary, HttpFetcher, Orchestrator, ResultAggregator,
    RetryPolicy,
};
use dataset::ShardStore;
use report::{ItemSink, JsonLinesSink, TracingDiagnostics};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Crawl(args) => handle_crawl(args).await,
        Commands::Merge { dir, output } => handle_merge(&dir, &output).await,
        Commands::Search { needle, data } => handle_search(&needle, &data),
    }
}

// Handles the 'crawl' subcommand
async fn handle_crawl(args: CrawlArgs) -> Result<i32> {
    let base = match &args.config {
        Some(path) => CrawlConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CrawlConfig::default(),
    };
    let config = args.apply(base);
    config.validate().context("invalid crawl configuration")?;

    let keyspace = config.keyspace()?;
    tracing::info!(
        "Keyspace: {} queries of length {} over {} symbols",
        keyspace.len(),
        keyspace.query_length(),
        keyspace.alphabet().len()
    );

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, config.deadline_secs.map(Duration::from_secs));

    let source = Arc::new(HttpFetcher::new(&config).context("failed to build HTTP client")?);
    let summary = match args.mode {
        OutputMode::Stream => {
            let out = open_output(args.output.as_deref()).await?;
            let sink = Arc::new(JsonLinesSink::new(out));
            let summary = Orchestrator::new(crawl_context(&config, source, sink.clone(), &cancel))
                .with_max_workers(config.max_workers)
                .run(keyspace.iter(), keyspace.len())
                .await;

            if summary.output_failed == 0 {
                sink.flush().await.context("failed to flush results")?;
            }
            summary
        }
        OutputMode::Batch => {
            let mut out = open_output(args.output.as_deref()).await?;
            let aggregator = Arc::new(ResultAggregator::new());
            let ctx = crawl_context(&config, source, aggregator.clone(), &cancel);
            let summary = Orchestrator::new(ctx)
                .with_max_workers(config.max_workers)
                .run(keyspace.iter(), keyspace.len())
                .await;

            let codes = report::write_batch(&mut out, &aggregator.snapshot())
                .await
                .context("failed to write results")?;
            tracing::info!("Wrote {} codes", codes);
            summary
        }
        OutputMode::Shards => {
            let dir = args.output.unwrap_or_else(|| PathBuf::from("shards"));
            let store = Arc::new(
                ShardStore::open(&dir)
                    .with_context(|| format!("failed to open shard directory {}", dir.display()))?,
            );
            let done = store.count_complete(&keyspace);
            if done > 0 {
                tracing::info!(
                    "Skipping {} queries already stored in {}",
                    done,
                    store.dir().display()
                );
            }
            Orchestrator::new(crawl_context(&config, source, store.clone(), &cancel))
                .with_max_workers(config.max_workers)
                .run(store.remaining(&keyspace), keyspace.len() - done)
                .await
        }
    };

    summary.log();
    Ok(exit_code(&summary))
}

// Handles the 'merge' subcommand
async fn handle_merge(dir: &Path, output: &Path) -> Result<i32> {
    let (merged, shards) = dataset::union_shards(dir)
        .with_context(|| format!("failed to merge shards in {}", dir.display()))?;
    if shards == 0 {
        tracing::warn!("No shards found in {}", dir.display());
    }

    dataset::write_json_atomic(output, &merged)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!("Wrote {} codes to {}", merged.len(), output.display());
    Ok(0)
}

// Handles the 'search' subcommand
fn handle_search(needle: &str, data: &Path) -> Result<i32> {
    let codes = dataset::load_dataset(data)
        .with_context(|| format!("failed to load {}", data.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (code, count) in dataset::search(&codes, needle) {
        writeln!(out, "{}", dataset::format_hit(code, count))?;
    }
    Ok(0)
}

// Shared collaborators for one crawl; only the item sink differs per mode
fn crawl_context(
    config: &CrawlConfig,
    source: Arc<HttpFetcher>,
    items: Arc<dyn ItemSink>,
    cancel: &CancellationToken,
) -> CrawlContext {
    CrawlContext {
        source,
        admission: AdmissionController::new(config.max_in_flight),
        retry: RetryPolicy::fixed(Duration::from_millis(config.retry_delay_ms)),
        page_size: config.page_size,
        items,
        diagnostics: Arc::new(TracingDiagnostics),
        cancel: cancel.clone(),
    }
}

fn exit_code(summary: &CrawlSummary) -> i32 {
    if summary.is_complete() {
        0
    } else {
        1
    }
}

// Stdout unless a file was given
async fn open_output(path: Option<&Path>) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(tokio::io::stdout())),
    })
}

// Ctrl-C always cancels; the deadline only when one is configured
fn spawn_cancel_triggers(cancel: &CancellationToken, deadline: Option<Duration>) {
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping workers");
            token.cancel();
        }
    });

    if let Some(deadline) = deadline {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(deadline) => {
                    tracing::warn!("Deadline of {}s reached, stopping workers", deadline.as_secs());
                    token.cancel();
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_follows_completion() {
        let complete = CrawlSummary {
            queries: 3,
            exhausted: 3,
            ..CrawlSummary::default()
        };
        assert_eq!(exit_code(&complete), 0);

        let partial = CrawlSummary {
            queries: 3,
            exhausted: 2,
            malformed: 1,
            ..CrawlSummary::default()
        };
        assert_eq!(exit_code(&partial), 1);

        let unwritten = CrawlSummary {
            queries: 3,
            exhausted: 2,
            output_failed: 1,
            ..CrawlSummary::default()
        };
        assert_eq!(exit_code(&unwritten), 1);
    }

    #[tokio::test]
    async fn test_merge_then_search() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("_ab.json"), r#"{"Kappa":["1"]}"#).unwrap();
        std::fs::write(dir.path().join("_ka.json"), r#"{"Kappa":["1","2"]}"#).unwrap();
        let output = dir.path().join("data.json");

        assert_eq!(handle_merge(dir.path(), &output).await.unwrap(), 0);

        let data = dataset::load_dataset(&output).unwrap();
        assert_eq!(data["Kappa"], vec!["1", "2"]);
        assert_eq!(handle_search("KAP", &output).unwrap(), 0);
    }

    #[test]
    fn test_search_missing_data_is_an_error() {
        assert!(handle_search("x", Path::new("/definitely/not/data.json")).is_err());
    }
}
