// Monotonic per-proxy request sequence number. The sole writer is the
// application thread; readers (logging, the wire layer) may be anyone.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SequenceAllocator {
    next: AtomicU64,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    // Returns the current sequence and increments it. Only ever called by
    // the application thread driving this proxy.
    pub fn next_sequence(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    // Advances the counter by `delta` without allocating a request for it.
    // Used on a successor during replay to re-align its counter with what
    // the predecessor already spent.
    pub fn increment_sequence(&self, delta: u64) {
        self.next.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn current(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}
