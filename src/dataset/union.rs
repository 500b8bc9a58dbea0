// src/dataset/union.rs
// =============================================================================
// Folds every shard in a directory into one code -> ids map.
//
// The same code usually shows up in many shards ("Kappa" matches "kap",
// "app", "ppa", ...). Its ids are concatenated across shards with duplicates
// removed, keeping the order in which each id was first seen. Shards are read
// in file-name order so the result does not depend on the directory listing.
// =============================================================================

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::CodeMap;
use crate::error::Result;

// Returns the merged map and the number of shards read
pub fn union_shards(dir: &Path) -> Result<(CodeMap, usize)> {
    let shards = list_shards(dir)?;

    let mut merged = CodeMap::new();
    let mut seen: HashMap<String, HashSet<String>> = HashMap::new();

    for path in &shards {
        let text = fs::read_to_string(path)?;
        let codes: CodeMap = serde_json::from_str(&text)?;

        for (code, ids) in codes {
            let known = seen.entry(code.clone()).or_default();
            let target = merged.entry(code).or_default();
            for id in ids {
                if known.insert(id.clone()) {
                    target.push(id);
                }
            }
        }
    }

    tracing::info!(
        "Merged {} shards from {} into {} codes",
        shards.len(),
        dir.display(),
        merged.len()
    );
    Ok((merged, shards.len()))
}

// `_*.json` files, sorted by name
fn list_shards(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut shards = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_shard = path.is_file()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with('_') && name.ends_with(".json"));
        if is_shard {
            shards.push(path);
        }
    }
    shards.sort();
    Ok(shards)
}
