// src/crawl/retry.rs
// =============================================================================
// Fixed-delay retry for transient outcomes (rate limiting, transport errors).
//
// Rules:
// - Always the same delay, no exponential growth, no jitter
// - No retry limit: a query is never abandoned because the network is bad
// - The caller retries the SAME offset; the policy never touches offsets
//
// The only way out of a retry loop other than success is cancellation.
// =============================================================================

use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    // Sleeps for the retry delay
    //
    // Returns false when cancelled during the sleep, true otherwise.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.delay) => true,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(2))
    }
}
