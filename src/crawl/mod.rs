// src/crawl/mod.rs
// =============================================================================
// The crawl engine.
//
// Submodules, leaves first:
// - admission: caps the number of requests on the wire
// - fetcher: performs one paginated GET (PageSource trait + HttpFetcher)
// - classify: turns a response into exactly one FetchOutcome
// - retry: fixed-delay wait before re-fetching the same offset
// - worker: the per-query pagination state machine
// - aggregate: concurrent code -> ids map
// - orchestrator: one worker per query, wait for all of them
//
// Data flow:
//   queries -> workers -> admission -> fetcher -> classify
//           -> { retry | item sink | diagnostic sink } -> summary
// =============================================================================

mod admission;
mod aggregate;
mod classify;
mod fetcher;
mod orchestrator;
mod retry;
mod worker;

pub use admission::AdmissionController;
pub use aggregate::ResultAggregator;
pub use fetcher::{HttpFetcher, RequestSummary};
pub use orchestrator::{CrawlSummary, Orchestrator};
pub use retry::RetryPolicy;
pub use worker::{CrawlContext, Termination};

#[cfg(test)]
pub(crate) use fetcher::{Exchange, PageSource, RawReply};
#[cfg(test)]
pub(crate) use worker::testing;
