// src/crawl/admission.rs
// =============================================================================
// Admission control: a hard cap on how many requests are on the wire.
//
// Every query gets its own task, so there can be tens of thousands of
// workers alive at once. That is cheap. What is NOT cheap is an open socket
// per worker. The controller hands out at most `capacity` tokens and a
// worker must hold one for the duration of a network call.
//
// A token is an RAII guard. Dropping it returns the capacity, which means
// the release happens on every exit path: success, error, panic, or the
// future being dropped mid-request.
//
// Rust concepts:
// - tokio::sync::Semaphore: async counting semaphore with fair (FIFO) wakeups
// - OwnedSemaphorePermit: a permit that owns an Arc to its semaphore, so it
//   can be moved into other tasks
// - tokio::select!: wait on whichever future finishes first
// =============================================================================

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct AdmissionController {
    permits: Arc<Semaphore>,
    capacity: usize,
}

// Proof that the holder may perform one fetch
//
// Not Clone. Release happens exactly once, on drop.
#[derive(Debug)]
pub struct AdmissionToken {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionToken {
    // Explicit release, for call sites that want to read like acquire/release
    pub fn release(self) {
        drop(self);
    }
}

impl AdmissionController {
    // Creates a controller with a fixed number of tokens
    //
    // Capacity is clamped to [1, Semaphore::MAX_PERMITS]; config validation
    // rejects values outside that range before we get here.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tokens not currently held by anyone
    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    // Waits until a token is free
    //
    // Returns None if `cancel` fires first. The semaphore is never closed,
    // so cancellation is the only way to come back empty-handed.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<AdmissionToken> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&self.permits).acquire_owned() => {
                permit.ok().map(|permit| AdmissionToken { _permit: permit })
            }
        }
    }
}
