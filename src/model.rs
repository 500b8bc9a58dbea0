// src/model.rs
// =============================================================================
// Domain types shared by every part of the crawler.
//
// - Query: one fixed-length search string from the keyspace
// - Item:  one record returned by the search endpoint
// - Page:  the items returned by a single fetch
//
// Only `code` and `id` matter to the engine. Everything else on an Item is
// payload that gets carried through to the output untouched, so those fields
// are Options: a missing or null field must not turn a good page into a
// format error.
//
// Rust concepts:
// - Newtype pattern: Query wraps Arc<str> so clones are cheap
// - serde rename: the wire format is camelCase, our fields are snake_case
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// An immutable query string
//
// Cloning a Query only bumps a reference count, which matters because the
// query travels with every diagnostic and every sink call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Query(Arc<str>);

impl Query {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Query {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Query {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A single search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Display code, the aggregation key
    pub code: String,
    /// Unique id, the aggregated value
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ItemUser>,
}

/// Owner metadata attached to an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
}

// One fetch worth of items, at most `page_size` long when the server honours
// the limit parameter
pub type Page = Vec<Item>;

#[cfg(test)]
pub(crate) fn sample_item(code: &str, id: &str) -> Item {
    Item {
        code: code.to_string(),
        id: id.to_string(),
        image_type: Some("png".to_string()),
        user: Some(ItemUser {
            id: Some("u1".to_string()),
            name: Some("someone".to_string()),
            display_name: Some("Someone".to_string()),
            provider_id: Some("12345".to_string()),
        }),
    }
}
