// src/keyspace/mod.rs
// =============================================================================
// This module enumerates the keyspace: every string of a fixed length over
// an alphabet, in product order ("aa", "ab", "ba", "bb" for {a,b} and 2).
//
// The generator is pure. Calling iter() again restarts the sequence from
// the beginning, so the same KeySpace can be walked as often as needed
// (once to filter out finished queries, once to crawl).
// =============================================================================

mod generator;

pub use generator::KeySpace;
