// src/dataset/search.rs
// Case-insensitive substring lookup over a merged data.json

use std::fs;
use std::path::Path;

use super::CodeMap;
use crate::error::Result;

pub fn load_dataset(path: &Path) -> Result<CodeMap> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

// Codes containing `needle` (ignoring case) with their id counts,
// most ids first, ties broken by code
pub fn search<'a>(dataset: &'a CodeMap, needle: &str) -> Vec<(&'a str, usize)> {
    let needle = needle.to_lowercase();
    let mut hits: Vec<(&str, usize)> = dataset
        .iter()
        .filter(|(code, _)| code.to_lowercase().contains(&needle))
        .map(|(code, ids)| (code.as_str(), ids.len()))
        .collect();

    hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    hits
}

pub fn format_hit(code: &str, count: usize) -> String {
    format!("{:20} {}", code, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| i.to_string()).collect()
    }

    fn dataset() -> CodeMap {
        CodeMap::from([
            ("Kappa".to_string(), ids(3)),
            ("KappaPride".to_string(), ids(5)),
            ("keKW".to_string(), ids(3)),
            ("PogChamp".to_string(), ids(9)),
        ])
    }

    #[test]
    fn test_search_is_case_insensitive_and_sorted() {
        let data = dataset();
        let hits = search(&data, "K");

        assert_eq!(
            hits,
            vec![("KappaPride", 5), ("Kappa", 3), ("keKW", 3)]
        );
    }

    #[test]
    fn test_search_without_hits() {
        assert!(search(&dataset(), "monka").is_empty());
    }

    #[test]
    fn test_format_hit_pads_code() {
        assert_eq!(format_hit("Kappa", 3), "Kappa                3");
        assert_eq!(
            format_hit("AVeryLongEmoteCodeName", 1),
            "AVeryLongEmoteCodeName 1"
        );
    }

    #[test]
    fn test_load_dataset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{"Kappa":["1","2"]}"#).unwrap();

        let data = load_dataset(file.path()).unwrap();
        assert_eq!(search(&data, "kap"), vec![("Kappa", 2)]);
    }
}
