// src/crawl/worker.rs
// =============================================================================
// One worker drives one query through its pagination, start to finish.
//
// State machine:
//
//   Fetching(0) --fetch+classify--> Success, full page   -> Fetching(offset + P)
//                                   Success, short page  -> Terminate(Exhausted)
//                                   RateLimited          -> wait, Fetching(offset)
//                                   TransportError       -> wait, Fetching(offset)
//                                   FormatError          -> report, Terminate(Malformed)
//
// If the item sink cannot store what was found (disk full, closed pipe), the
// query ends as OutputFailed and the whole run is cancelled: every further
// request would produce results with nowhere to go.
//
// Guarantees:
// - Offsets go 0, P, 2P, ... with no gaps; a retry repeats the same offset
// - Fetches for one query are strictly sequential
// - The admission token is held only around the network call, and it is
//   released before the response is classified
// - Transient failures are never a reason to stop; only a short page, a
//   malformed response, a failing sink or cancellation ends the loop
//
// Everything the worker shares with other workers lives in CrawlContext and
// is reached through Arcs. The offset and the query are private.
// =============================================================================

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::admission::AdmissionController;
use super::classify::{classify, FetchOutcome};
use super::fetcher::{Exchange, PageSource};
use super::retry::RetryPolicy;
use crate::error::KeysweepError;
use crate::model::{Item, Query};
use crate::report::{DiagnosticRecord, DiagnosticSink, ItemSink};

// Why a worker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A page shorter than the page size arrived
    Exhausted,
    /// A response could not be understood; the query was abandoned
    Malformed,
    /// The run was cancelled while this query was still in progress
    Cancelled,
    /// The item sink failed to store this query's results
    OutputFailed,
}

// What one worker did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReport {
    pub query: Query,
    pub fetches: u32,
    pub retries: u32,
    pub items: usize,
    pub termination: Termination,
}

// The next state after classifying an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Continue(u64),
    RetryLocal(u64),
    Terminate(Termination),
}

// Pure transition function for one classified fetch at `offset`
//
// A page of at least `page_size` items continues; a server that ignores the
// limit and returns more must not end the query early.
pub fn transition(offset: u64, page_size: u32, outcome: &FetchOutcome) -> Transition {
    match outcome {
        FetchOutcome::Success(page) if page.len() >= page_size as usize => {
            Transition::Continue(offset + u64::from(page_size))
        }
        FetchOutcome::Success(_) => Transition::Terminate(Termination::Exhausted),
        outcome if outcome.is_transient() => Transition::RetryLocal(offset),
        _ => Transition::Terminate(Termination::Malformed),
    }
}

// Shared collaborators, one instance per crawl
#[derive(Clone)]
pub struct CrawlContext {
    pub source: Arc<dyn PageSource>,
    pub admission: AdmissionController,
    pub retry: RetryPolicy,
    pub page_size: u32,
    pub items: Arc<dyn ItemSink>,
    pub diagnostics: Arc<dyn DiagnosticSink>,
    pub cancel: CancellationToken,
}

pub struct CrawlWorker {
    ctx: CrawlContext,
}

impl CrawlWorker {
    pub fn new(ctx: CrawlContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, query: Query) -> QueryReport {
        let mut report = QueryReport {
            query: query.clone(),
            fetches: 0,
            retries: 0,
            items: 0,
            termination: Termination::Exhausted,
        };
        let mut offset = 0u64;

        let termination = loop {
            if self.ctx.cancel.is_cancelled() {
                break Termination::Cancelled;
            }

            let exchange = match self.fetch(&query, offset).await {
                Some(exchange) => exchange,
                None => break Termination::Cancelled,
            };
            report.fetches += 1;

            let outcome = classify(&exchange.reply);
            let next = transition(offset, self.ctx.page_size, &outcome);

            match outcome {
                FetchOutcome::Success(page) => {
                    if let Err(e) = self.deliver(&query, &page).await {
                        self.output_failed(&query, &e);
                        break Termination::OutputFailed;
                    }
                    report.items += page.len();
                    tracing::debug!(
                        query = %query,
                        offset,
                        items = page.len(),
                        "page fetched"
                    );
                }
                FetchOutcome::RateLimited => {
                    self.diagnose(&query, offset, &exchange, "rate limited (HTTP 429)");
                }
                FetchOutcome::TransportError(ref cause) => {
                    self.diagnose(&query, offset, &exchange, cause.as_str());
                }
                FetchOutcome::FormatError { ref cause, .. } => {
                    self.diagnose(&query, offset, &exchange, cause.as_str());
                }
            }

            match next {
                Transition::Continue(next_offset) => offset = next_offset,
                Transition::RetryLocal(_) => {
                    report.retries += 1;
                    if !self.ctx.retry.wait(&self.ctx.cancel).await {
                        break Termination::Cancelled;
                    }
                }
                Transition::Terminate(termination) => break termination,
            }
        };

        report.termination = match self.ctx.items.finish_query(&query, termination).await {
            Ok(()) => termination,
            Err(e) => {
                self.output_failed(&query, &e);
                Termination::OutputFailed
            }
        };
        report
    }

    async fn deliver(&self, query: &Query, page: &[Item]) -> Result<(), KeysweepError> {
        for item in page {
            self.ctx.items.accept(query, item).await?;
        }
        Ok(())
    }

    // Stops the run; only the first failure is worth an error line
    fn output_failed(&self, query: &Query, error: &KeysweepError) {
        if self.ctx.cancel.is_cancelled() {
            tracing::debug!(query = %query, "output failed after cancellation: {}", error);
        } else {
            tracing::error!(query = %query, "failed to store results, stopping the crawl: {}", error);
            self.ctx.cancel.cancel();
        }
    }

    // One network call under an admission token
    //
    // The token lives only inside this function, so it is back in the pool
    // before the caller starts parsing.
    async fn fetch(&self, query: &Query, offset: u64) -> Option<Exchange> {
        let token = self.ctx.admission.acquire(&self.ctx.cancel).await?;
        let exchange = self.ctx.source.fetch(query.as_str(), offset).await;
        token.release();
        Some(exchange)
    }

    fn diagnose(&self, query: &Query, offset: u64, exchange: &Exchange, cause: &str) {
        let (status, body) = match &exchange.reply {
            Ok(reply) => (
                Some(reply.status),
                Some(String::from_utf8_lossy(&reply.body).into_owned()),
            ),
            Err(_) => (None, None),
        };
        self.ctx.diagnostics.report(DiagnosticRecord::new(
            query,
            offset,
            &exchange.request,
            status,
            body,
            cause,
        ));
    }
}
