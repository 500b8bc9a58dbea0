// src/dataset/shards.rs
// =============================================================================
// Per-query shard files, for crawls that survive a restart.
//
// While a query is being crawled its items are buffered in memory. When the
// worker reports Exhausted the buffer is written to `<dir>/_<query>.json`.
// Malformed and Cancelled queries are dropped without a file, so the next
// run picks them up again. A shard that cannot be written is an error for
// the worker: the query is not counted as done and the run exits non-zero.
//
// File names use form-urlencoding of the query (the apostrophe in the default
// alphabet becomes %27), so any alphabet maps to a safe file name.
// =============================================================================

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

use super::{write_json_atomic, CodeMap};
use crate::crawl::Termination;
use crate::error::Result;
use crate::keyspace::KeySpace;
use crate::model::{Item, Query};
use crate::report::ItemSink;

pub struct ShardStore {
    dir: PathBuf,
    pending: DashMap<Query, CodeMap>,
}

impl ShardStore {
    // Opens (and creates, if needed) a shard directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            pending: DashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn shard_path(&self, query: &Query) -> PathBuf {
        self.dir.join(shard_file_name(query.as_str()))
    }

    /// True when a previous run already finished this query
    pub fn is_complete(&self, query: &Query) -> bool {
        self.shard_path(query).is_file()
    }

    // How many queries of `keyspace` are already on disk
    pub fn count_complete(&self, keyspace: &KeySpace) -> usize {
        keyspace.iter().filter(|query| self.is_complete(query)).count()
    }

    // The queries of `keyspace` still to crawl, generated one at a time
    pub fn remaining<'a>(&'a self, keyspace: &'a KeySpace) -> impl Iterator<Item = Query> + 'a {
        keyspace.iter().filter(move |query| !self.is_complete(query))
    }
}

#[async_trait]
impl ItemSink for ShardStore {
    async fn accept(&self, query: &Query, item: &Item) -> Result<()> {
        self.pending
            .entry(query.clone())
            .or_default()
            .entry(item.code.clone())
            .or_default()
            .push(item.id.clone());
        Ok(())
    }

    async fn finish_query(&self, query: &Query, termination: Termination) -> Result<()> {
        let codes = self
            .pending
            .remove(query)
            .map(|(_, codes)| codes)
            .unwrap_or_default();

        if termination != Termination::Exhausted {
            tracing::debug!(query = %query, ?termination, "no shard written");
            return Ok(());
        }

        let path = self.shard_path(query);
        write_json_atomic(&path, &codes).await?;
        tracing::debug!(query = %query, "shard written to {}", path.display());
        Ok(())
    }
}

pub(crate) fn shard_file_name(query: &str) -> String {
    let escaped: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("_{}.json", escaped)
}
