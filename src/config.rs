// src/config.rs
// =============================================================================
// Crawl settings.
//
// Sources, lowest priority first:
// 1. Built-in defaults (the BetterTTV shared-emote search, 3-symbol queries)
// 2. An optional TOML file (--config)
// 3. Command-line flags
//
// Every field has a serde default, so a config file only needs the values
// it wants to change:
//
//   endpoint = "https://api.example.com/search"
//   alphabet = "abc"
//   max_in_flight = 50
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tokio::sync::Semaphore;
use url::Url;

use crate::error::{KeysweepError, Result};
use crate::keyspace::KeySpace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlConfig {
    /// Search endpoint; query/offset/limit are appended per request
    #[serde(default = "defaults::endpoint")]
    pub endpoint: String,

    /// Symbols the queries are built from, in enumeration order
    #[serde(default = "defaults::alphabet")]
    pub alphabet: String,

    /// Symbols per query
    #[serde(default = "defaults::query_length")]
    pub query_length: usize,

    /// Items requested per page; a shorter page ends a query
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Upper bound on simultaneous requests (open sockets)
    #[serde(default = "defaults::max_in_flight")]
    pub max_in_flight: usize,

    /// Fixed wait before retrying a rate-limited or failed request
    #[serde(default = "defaults::retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "defaults::connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Bounded worker pool size; unset means one task per query
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// Cancel the whole run after this many seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::endpoint(),
            alphabet: defaults::alphabet(),
            query_length: defaults::query_length(),
            page_size: defaults::page_size(),
            max_in_flight: defaults::max_in_flight(),
            retry_delay_ms: defaults::retry_delay_ms(),
            request_timeout_secs: defaults::request_timeout_secs(),
            connect_timeout_secs: defaults::connect_timeout_secs(),
            user_agent: defaults::user_agent(),
            max_workers: None,
            deadline_secs: None,
        }
    }
}

impl CrawlConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    // Rejects values the crawler cannot run with
    pub fn validate(&self) -> Result<()> {
        let endpoint = Url::parse(&self.endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(KeysweepError::config(format!(
                "endpoint must be http or https, got '{}'",
                endpoint.scheme()
            )));
        }

        if self.alphabet.is_empty() {
            return Err(KeysweepError::config("alphabet is empty"));
        }
        let mut seen = Vec::new();
        for c in self.alphabet.chars() {
            if seen.contains(&c) {
                return Err(KeysweepError::config(format!(
                    "alphabet repeats the symbol {:?}",
                    c
                )));
            }
            seen.push(c);
        }

        if self.query_length == 0 {
            return Err(KeysweepError::config("query_length must be > 0"));
        }
        if self.page_size == 0 {
            return Err(KeysweepError::config("page_size must be > 0"));
        }
        if self.max_in_flight == 0 || self.max_in_flight > Semaphore::MAX_PERMITS {
            return Err(KeysweepError::config(format!(
                "max_in_flight must be between 1 and {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(KeysweepError::config("request_timeout_secs must be > 0"));
        }
        if self.max_workers == Some(0) {
            return Err(KeysweepError::config("max_workers must be > 0 when set"));
        }

        self.keyspace().map(|_| ())
    }

    pub fn keyspace(&self) -> Result<KeySpace> {
        KeySpace::new(&self.alphabet, self.query_length)
    }
}

mod defaults {
    pub fn endpoint() -> String {
        "https://api.betterttv.net/3/emotes/shared/search".into()
    }
    pub fn alphabet() -> String {
        "abcdefghijklmnopqrstuvwxyz0123456789'".into()
    }
    pub fn query_length() -> usize {
        3
    }
    pub fn page_size() -> u32 {
        100
    }
    pub fn max_in_flight() -> usize {
        500
    }
    pub fn retry_delay_ms() -> u64 {
        2000
    }
    pub fn request_timeout_secs() -> u64 {
        30
    }
    pub fn connect_timeout_secs() -> u64 {
        10
    }
    pub fn user_agent() -> String {
        format!("keysweep/{}", env!("CARGO_PKG_VERSION"))
    }
}
