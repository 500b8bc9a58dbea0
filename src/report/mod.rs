// src/report/mod.rs
// =============================================================================
// Everything that leaves the crawl engine goes through this module.
//
// Submodules:
// - sink: where discovered items go (stream them, aggregate them, shard them)
// - diagnostic: where failures go (one structured record per failure)
// - marshal: JSON encoding that cannot fail
//
// The crawl engine only knows the two traits, ItemSink and DiagnosticSink.
// Swapping stdout for a file, or streaming for batch, does not touch it.
// =============================================================================

mod diagnostic;
mod marshal;
mod sink;

pub use diagnostic::{DiagnosticRecord, DiagnosticSink, TracingDiagnostics};
pub use sink::{write_batch, ItemSink, JsonLinesSink};

#[cfg(test)]
pub(crate) use diagnostic::CollectingDiagnostics;
#[cfg(test)]
pub(crate) use sink::ClosedPipe;
