// src/crawl/orchestrator.rs
// =============================================================================
// The orchestrator gives every query its own worker and waits for all of them.
//
// How it works:
// 1. Pull queries lazily from the caller's iterator (normally the keyspace
//    generator itself) and turn each one into a spawned CrawlWorker task
// 2. Run them through buffer_unordered(N): N is the whole batch by default
//    (every task launched up front), or `max_workers` for a bounded pool.
//    With a bound, a query is only generated once a slot frees up
// 3. Fold each QueryReport into a CrawlSummary as tasks finish
//
// Physical concurrency is NOT decided here. However many workers are alive,
// only `max_in_flight` of them can be inside a network call at any moment,
// because they all share one AdmissionController.
//
// A worker that panics is logged and counted; it never takes the run down.
// =============================================================================

use futures::stream::{self, StreamExt};
use std::time::{Duration, Instant};

use super::worker::{CrawlContext, CrawlWorker, QueryReport, Termination};
use crate::model::Query;

// Totals for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub queries: usize,
    pub exhausted: usize,
    pub malformed: usize,
    pub cancelled: usize,
    pub output_failed: usize,
    pub panicked: usize,
    pub fetches: u64,
    pub retries: u64,
    pub items: u64,
    pub elapsed: Duration,
}

impl CrawlSummary {
    fn record(&mut self, report: &QueryReport) {
        self.fetches += u64::from(report.fetches);
        self.retries += u64::from(report.retries);
        self.items += report.items as u64;
        match report.termination {
            Termination::Exhausted => self.exhausted += 1,
            Termination::Malformed => self.malformed += 1,
            Termination::Cancelled => self.cancelled += 1,
            Termination::OutputFailed => self.output_failed += 1,
        }
    }

    /// True when every query paged through to its last page
    pub fn is_complete(&self) -> bool {
        self.exhausted == self.queries
    }

    pub fn log(&self) {
        tracing::info!("=== Crawl Statistics ===");
        tracing::info!("Queries:            {}", self.queries);
        tracing::info!("  exhausted:        {}", self.exhausted);
        tracing::info!("  malformed:        {}", self.malformed);
        tracing::info!("  cancelled:        {}", self.cancelled);
        if self.output_failed > 0 {
            tracing::info!("  output failed:    {}", self.output_failed);
        }
        if self.panicked > 0 {
            tracing::info!("  panicked:         {}", self.panicked);
        }
        tracing::info!("Fetches:            {}", self.fetches);
        tracing::info!("Retries:            {}", self.retries);
        tracing::info!("Items:              {}", self.items);
        tracing::info!("Total duration:     {:.2}s", self.elapsed.as_secs_f64());
    }
}

pub struct Orchestrator {
    ctx: CrawlContext,
    max_workers: Option<usize>,
}

impl Orchestrator {
    pub fn new(ctx: CrawlContext) -> Self {
        Self {
            ctx,
            max_workers: None,
        }
    }

    // Caps how many workers exist at once (a bounded pool instead of one
    // task per query up front)
    pub fn with_max_workers(mut self, max_workers: Option<usize>) -> Self {
        self.max_workers = max_workers.filter(|&n| n > 0);
        self
    }

    // Crawls every query and returns once every worker has terminated
    //
    // `total` is how many queries the iterator will yield; it sizes the
    // unbounded pool and drives the progress log. The summary counts the
    // queries that were actually pulled.
    pub async fn run<I>(&self, queries: I, total: usize) -> CrawlSummary
    where
        I: IntoIterator<Item = Query>,
    {
        let started = Instant::now();
        let width = self.max_workers.unwrap_or(total).max(1);

        tracing::info!(
            "Crawling {} queries (workers: {}, max in flight: {}, page size: {})",
            total,
            width,
            self.ctx.admission.capacity(),
            self.ctx.page_size
        );

        let mut summary = CrawlSummary::default();

        let mut finished = stream::iter(queries)
            .map(|query| {
                let worker = CrawlWorker::new(self.ctx.clone());
                let task_query = query.clone();
                let handle = tokio::spawn(async move { worker.run(task_query).await });
                async move { (query, handle.await) }
            })
            .buffer_unordered(width);

        let mut done = 0usize;
        let mut last_percent = 0usize;
        while let Some((query, joined)) = finished.next().await {
            match joined {
                Ok(report) => {
                    tracing::debug!(
                        query = %report.query,
                        termination = ?report.termination,
                        "query finished after {} fetches",
                        report.fetches
                    );
                    summary.record(&report);
                }
                Err(e) => {
                    summary.panicked += 1;
                    tracing::error!(query = %query, "worker task failed: {}", e);
                }
            }

            done += 1;
            let percent = (done * 100 / total.max(1)).min(100);
            if percent > last_percent {
                last_percent = percent;
                tracing::info!("{}% ({}/{})", percent, done, total);
            }
        }

        summary.queries = done;
        summary.elapsed = started.elapsed();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::testing::{json_reply, Scripted, ScriptedSource};
    use crate::crawl::{
        AdmissionController, Exchange, HttpFetcher, PageSource, RawReply, RequestSummary,
        ResultAggregator, RetryPolicy,
    };
    use crate::keyspace::KeySpace;
    use crate::report::{ClosedPipe, CollectingDiagnostics, JsonLinesSink};
    use async_trait::async_trait;
    use httpmock::{Method::GET, MockServer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    fn context(
        source: Arc<dyn PageSource>,
        capacity: usize,
        page_size: u32,
        items: Arc<ResultAggregator>,
        diagnostics: Arc<CollectingDiagnostics>,
    ) -> CrawlContext {
        CrawlContext {
            source,
            admission: AdmissionController::new(capacity),
            retry: RetryPolicy::fixed(Duration::from_millis(5)),
            page_size,
            items,
            diagnostics,
            cancel: CancellationToken::new(),
        }
    }

    fn queries(alphabet: &str, length: usize) -> Vec<Query> {
        KeySpace::new(alphabet, length).unwrap().iter().collect()
    }

    fn page_body(count: usize, offset: u64) -> Vec<u8> {
        json_reply(count, offset).body
    }

    // Scenario A against a real HTTP server: "aa" has 100 + 100 + 50 items,
    // every other query is a single short page
    #[tokio::test]
    async fn test_pagination_over_http() {
        let server = MockServer::start_async().await;

        let mut aa_mocks = Vec::new();
        for (offset, count) in [(0u64, 100usize), (100, 100), (200, 50)] {
            let body = page_body(count, offset);
            aa_mocks.push(
                server
                    .mock_async(move |when, then| {
                        when.method(GET)
                            .path("/search")
                            .query_param("query", "aa")
                            .query_param("offset", offset.to_string())
                            .query_param("limit", "100");
                        then.status(200)
                            .header("content-type", "application/json; charset=utf-8")
                            .body(body);
                    })
                    .await,
            );
        }

        let mut other_mocks = Vec::new();
        for query in ["ab", "ba", "bb"] {
            let body = serde_json::to_vec(&vec![crate::model::sample_item(query, query)]).unwrap();
            other_mocks.push(
                server
                    .mock_async(move |when, then| {
                        when.method(GET)
                            .path("/search")
                            .query_param("query", query)
                            .query_param("offset", "0");
                        then.status(200)
                            .header("content-type", "application/json; charset=utf-8")
                            .body(body);
                    })
                    .await,
            );
        }

        let endpoint = url::Url::parse(&server.url("/search")).unwrap();
        let source = Arc::new(HttpFetcher::with_client(reqwest::Client::new(), endpoint, 100));
        let aggregator = Arc::new(ResultAggregator::new());
        let diagnostics = Arc::new(CollectingDiagnostics::default());

        let summary = Orchestrator::new(context(source, 2, 100, aggregator.clone(), diagnostics.clone()))
            .run(queries("ab", 2), 4)
            .await;

        for mock in aa_mocks.iter().chain(other_mocks.iter()) {
            mock.assert_async().await;
        }
        assert_eq!(summary.queries, 4);
        assert_eq!(summary.exhausted, 4);
        assert_eq!(summary.fetches, 6);
        assert_eq!(summary.items, 253);
        assert!(summary.is_complete());
        assert!(diagnostics.records().is_empty());

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.len(), 253);
        assert_eq!(snapshot["ab"], vec!["ab"]);
    }

    // Scenario B through the orchestrator: two 429s then a final page
    #[tokio::test]
    async fn test_rate_limited_query_finishes_after_retries() {
        let source = Arc::new(ScriptedSource::default().script(
            "ab",
            vec![Scripted::Status(429), Scripted::Status(429), Scripted::Items(7)],
        ));
        let aggregator = Arc::new(ResultAggregator::new());
        let diagnostics = Arc::new(CollectingDiagnostics::default());

        let summary = Orchestrator::new(context(source.clone(), 4, 10, aggregator, diagnostics.clone()))
            .run(queries("ab", 2), 4)
            .await;

        assert_eq!(source.offsets_for("ab"), vec![0, 0, 0]);
        assert_eq!(summary.retries, 2);
        assert_eq!(summary.exhausted, 4);
        assert_eq!(diagnostics.records().len(), 2);
    }

    // Scenario C over HTTP: one query answers with HTML
    #[tokio::test]
    async fn test_non_json_query_stops_others_continue() {
        let server = MockServer::start_async().await;
        let html = server
            .mock_async(|when, then| {
                when.method(GET).path("/search").query_param("query", "ba");
                then.status(200)
                    .header("content-type", "text/html; charset=utf-8")
                    .body("<html>Cloudflare</html>");
            })
            .await;
        let mut json_mocks = Vec::new();
        for query in ["aa", "ab", "bb"] {
            json_mocks.push(
                server
                    .mock_async(move |when, then| {
                        when.method(GET).path("/search").query_param("query", query);
                        then.status(200)
                            .header("content-type", "application/json; charset=utf-8")
                            .body("[]");
                    })
                    .await,
            );
        }

        let endpoint = url::Url::parse(&server.url("/search")).unwrap();
        let source = Arc::new(HttpFetcher::with_client(reqwest::Client::new(), endpoint, 100));
        let aggregator = Arc::new(ResultAggregator::new());
        let diagnostics = Arc::new(CollectingDiagnostics::default());

        let summary = Orchestrator::new(context(source, 4, 100, aggregator, diagnostics.clone()))
            .run(queries("ab", 2), 4)
            .await;

        html.assert_async().await;
        for mock in &json_mocks {
            mock.assert_async().await;
        }
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.exhausted, 3);
        assert_eq!(summary.fetches, 4);
        assert!(!summary.is_complete());

        let records = diagnostics.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].query, "ba");
        assert_eq!(records[0].http_response.data.as_deref(), Some("<html>Cloudflare</html>"));
        assert_eq!(records[0].http_response.args["offset"], vec!["0".to_string()]);
    }

    // Counts how many fetches are inside `fetch` at the same time
    #[derive(Default)]
    struct InstrumentedSource {
        current: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageSource for InstrumentedSource {
        async fn fetch(&self, _query: &str, offset: u64) -> Exchange {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(3)).await;

            self.current.fetch_sub(1, Ordering::SeqCst);
            // Two full pages then a short one, for every query
            let count = if offset < 20 { 10 } else { 4 };
            Exchange {
                request: RequestSummary::default(),
                reply: Ok::<RawReply, String>(json_reply(count, offset)),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_never_exceeds_capacity() {
        let source = Arc::new(InstrumentedSource::default());
        let aggregator = Arc::new(ResultAggregator::new());
        let diagnostics = Arc::new(CollectingDiagnostics::default());
        let all = queries("abcd", 2);

        let summary = Orchestrator::new(context(source.clone(), 3, 10, aggregator, diagnostics))
            .run(all, 16)
            .await;

        assert_eq!(summary.queries, 16);
        assert_eq!(summary.exhausted, 16);
        assert_eq!(source.calls.load(Ordering::SeqCst), 16 * 3);
        let peak = source.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in flight was {}", peak);
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_bounded_worker_pool_still_visits_every_query() {
        let source = Arc::new(ScriptedSource::default());
        let aggregator = Arc::new(ResultAggregator::new());
        let diagnostics = Arc::new(CollectingDiagnostics::default());
        let all = queries("abc", 2);

        let summary = Orchestrator::new(context(source.clone(), 2, 10, aggregator, diagnostics))
            .with_max_workers(Some(2))
            .run(all.clone(), 9)
            .await;

        assert_eq!(summary.exhausted, 9);
        for query in &all {
            assert_eq!(source.offsets_for(query.as_str()), vec![0]);
        }
    }

    #[tokio::test]
    async fn test_cancelled_run_terminates_every_worker() {
        let source = Arc::new(ScriptedSource::default().script("aa", vec![Scripted::Transport; 10_000]));
        let aggregator = Arc::new(ResultAggregator::new());
        let diagnostics = Arc::new(CollectingDiagnostics::default());
        let ctx = context(source, 2, 10, aggregator, diagnostics);
        let cancel = ctx.cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let summary = Orchestrator::new(ctx).run(queries("ab", 2), 4).await;

        assert_eq!(summary.queries, 4);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.exhausted, 3);
    }

    #[tokio::test]
    async fn test_empty_query_list_is_a_noop() {
        let source = Arc::new(ScriptedSource::default());
        let summary = Orchestrator::new(context(
            source.clone(),
            1,
            10,
            Arc::new(ResultAggregator::new()),
            Arc::new(CollectingDiagnostics::default()),
        ))
        .run(Vec::new(), 0)
        .await;

        assert_eq!(summary.queries, 0);
        assert!(summary.is_complete());
        assert_eq!(source.total_calls(), 0);
    }

    // Records, at every fetch, how many queries had been pulled so far
    struct PullWatch {
        pulled: Arc<AtomicUsize>,
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl PageSource for PullWatch {
        async fn fetch(&self, _query: &str, offset: u64) -> Exchange {
            self.seen.lock().unwrap().push(self.pulled.load(Ordering::SeqCst));
            tokio::time::sleep(Duration::from_millis(1)).await;
            Exchange {
                request: RequestSummary::default(),
                reply: Ok::<RawReply, String>(json_reply(0, offset)),
            }
        }
    }

    #[tokio::test]
    async fn test_bounded_pool_pulls_queries_lazily() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let source = Arc::new(PullWatch {
            pulled: pulled.clone(),
            seen: Mutex::new(Vec::new()),
        });
        let space = KeySpace::new("abcd", 3).unwrap();
        let counter = pulled.clone();
        let lazy = space.iter().inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let summary = Orchestrator::new(context(
            source.clone(),
            2,
            10,
            Arc::new(ResultAggregator::new()),
            Arc::new(CollectingDiagnostics::default()),
        ))
        .with_max_workers(Some(2))
        .run(lazy, space.len())
        .await;

        assert_eq!(summary.queries, 64);
        assert_eq!(summary.exhausted, 64);
        assert_eq!(pulled.load(Ordering::SeqCst), 64);
        // At the k-th fetch at most k - 1 queries are done, and only two more
        // may be waiting in the pool
        let seen = source.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 64);
        for (k, &pulled_then) in seen.iter().enumerate() {
            assert!(pulled_then <= k + 2, "fetch {} saw {} queries pulled", k + 1, pulled_then);
        }
    }

    struct PanickingSource;

    #[async_trait]
    impl PageSource for PanickingSource {
        async fn fetch(&self, query: &str, _offset: u64) -> Exchange {
            tokio::task::yield_now().await;
            panic!("source failed for {}", query);
        }
    }

    #[tokio::test]
    async fn test_panicking_fetch_returns_its_token() {
        let ctx = context(
            Arc::new(PanickingSource),
            2,
            10,
            Arc::new(ResultAggregator::new()),
            Arc::new(CollectingDiagnostics::default()),
        );
        let admission = ctx.admission.clone();

        let summary = Orchestrator::new(ctx).run(queries("abc", 1), 3).await;

        assert_eq!(summary.queries, 3);
        assert_eq!(summary.panicked, 3);
        assert_eq!(admission.available(), 2);
        assert!(!summary.is_complete());
    }

    // stdout closed under us (`keysweep crawl | head`): stop fetching
    #[tokio::test]
    async fn test_closed_output_stops_the_crawl() {
        let source = Arc::new(ScriptedSource::default().script("aa", vec![Scripted::Items(3)]));
        let ctx = CrawlContext {
            source: source.clone(),
            admission: AdmissionController::new(2),
            retry: RetryPolicy::fixed(Duration::from_millis(5)),
            page_size: 10,
            items: Arc::new(JsonLinesSink::new(ClosedPipe)),
            diagnostics: Arc::new(CollectingDiagnostics::default()),
            cancel: CancellationToken::new(),
        };
        let cancel = ctx.cancel.clone();

        let summary = Orchestrator::new(ctx)
            .with_max_workers(Some(1))
            .run(queries("ab", 2), 4)
            .await;

        assert!(cancel.is_cancelled());
        assert_eq!(source.total_calls(), 1);
        assert_eq!(summary.exhausted, 0);
        assert_eq!(summary.output_failed, 4);
        assert!(!summary.is_complete());
    }
}
