// src/cli.rs
// =============================================================================
// Command-line interface, built with clap's derive API.
//
// Three subcommands:
// - crawl:  sweep the keyspace against the search endpoint
// - merge:  fold a directory of per-query shards into one data.json
// - search: look codes up in data.json
//
// Every crawl flag is optional. When given it overrides the matching value
// from --config, which in turn overrides the built-in defaults.
// =============================================================================

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::CrawlConfig;

#[derive(Parser, Debug)]
#[command(
    name = "keysweep",
    version,
    about = "Exhaustively sweeps a fixed-length query keyspace against a paginated search API",
    long_about = "keysweep enumerates every query of a fixed length over an alphabet, pages through \
                  the search results of each one with a bounded number of requests in flight, and \
                  collects every (code, id) pair it finds."
)]
pub struct Cli {
    /// Log debug details (per-page events)
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl every query in the keyspace
    ///
    /// Example: keysweep crawl --alphabet abc --length 2 --mode batch
    Crawl(CrawlArgs),

    /// Merge shard files written by `crawl --mode shards`
    ///
    /// Example: keysweep merge --dir shards --output data.json
    Merge {
        /// Directory holding the `_<query>.json` shards
        #[arg(long)]
        dir: PathBuf,

        /// Where to write the merged map
        #[arg(long, default_value = "data.json")]
        output: PathBuf,
    },

    /// Find codes containing NEEDLE (case-insensitive)
    ///
    /// Example: keysweep search kappa
    Search {
        /// Substring to look for
        needle: String,

        /// Merged map produced by `merge`
        #[arg(long, default_value = "data.json")]
        data: PathBuf,
    },
}

// How discovered items leave the process
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// One JSON item per line, written as pages arrive
    #[default]
    Stream,
    /// One {"code", "ids"} line per code, written at the end
    Batch,
    /// One file per finished query; reruns skip finished queries
    Shards,
}

#[derive(Args, Debug, Default)]
pub struct CrawlArgs {
    /// TOML file with crawl settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Search endpoint URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Symbols queries are built from
    #[arg(long)]
    pub alphabet: Option<String>,

    /// Symbols per query
    #[arg(long)]
    pub length: Option<usize>,

    /// Items requested per page
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Maximum simultaneous requests
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Delay before retrying a rate-limited or failed request
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Limit the number of live workers (default: one per query)
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Stop the crawl after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    #[arg(long, value_enum, default_value_t = OutputMode::Stream)]
    pub mode: OutputMode,

    /// Output file for stream/batch (default: stdout), or the shard
    /// directory for shards (default: shards)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl CrawlArgs {
    // Layers the flags that were given on top of `config`
    pub fn apply(&self, mut config: CrawlConfig) -> CrawlConfig {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(alphabet) = &self.alphabet {
            config.alphabet = alphabet.clone();
        }
        if let Some(length) = self.length {
            config.query_length = length;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(max_in_flight) = self.max_in_flight {
            config.max_in_flight = max_in_flight;
        }
        if let Some(delay) = self.retry_delay_ms {
            config.retry_delay_ms = delay;
        }
        if self.max_workers.is_some() {
            config.max_workers = self.max_workers;
        }
        if self.deadline_secs.is_some() {
            config.deadline_secs = self.deadline_secs;
        }
        config
    }
}
