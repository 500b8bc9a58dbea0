// src/dataset/mod.rs
// =============================================================================
// On-disk results.
//
// - shards: one `_<query>.json` file per finished query, used to resume
// - union: folds a directory of shards into a single data.json
// - search: looks codes up in data.json
//
// Every file here is a JSON object mapping code -> list of ids.
// =============================================================================

mod search;
mod shards;
mod union;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

use crate::error::Result;

pub use search::{format_hit, load_dataset, search};
pub use shards::ShardStore;
pub use union::union_shards;

/// code -> ids
pub type CodeMap = BTreeMap<String, Vec<String>>;

// Writes JSON next to `path` first, then renames it into place, so a crash
// never leaves a half-written file that looks complete
pub async fn write_json_atomic<T: Serialize + Sync + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp = path.with_extension("tmp");
    let bytes = serde_json::to_vec(value)?;
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
