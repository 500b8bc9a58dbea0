// src/crawl/aggregate.rs
// =============================================================================
// The Result Aggregator: code -> every id that was seen under that code.
//
// Thousands of workers merge into this map at once. A naive version would
// read the list for a key, append, and write it back, and two writers on the
// same key would lose one of the ids. Here the whole append happens inside
// DashMap's entry() call, which holds the shard lock for that key until the
// push is done, so there is nothing to lose.
//
// One instance is created by main.rs and handed to the orchestrator. There
// is no global map.
// =============================================================================

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{Item, Query};
use crate::report::ItemSink;

#[derive(Debug, Default)]
pub struct ResultAggregator {
    codes: DashMap<String, Vec<String>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    // Appends `id` under `code`, creating the entry when absent
    pub fn merge(&self, code: &str, id: &str) {
        self.codes
            .entry(code.to_string())
            .or_default()
            .push(id.to_string());
    }

    /// Number of distinct codes
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    // Copies the current contents, sorted by code
    //
    // Meant to be called once every worker has terminated.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.codes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[async_trait]
impl ItemSink for ResultAggregator {
    async fn accept(&self, _query: &Query, item: &Item) -> Result<()> {
        self.merge(&item.code, &item.id);
        Ok(())
    }
}
