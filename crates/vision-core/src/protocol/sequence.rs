//! Correlation-id allocation for outbound requests.
//!
//! Every request carries a `seq` value that the device echoes in its
//! response; the correlator resolves pending requests by that value alone.
//! Ids must therefore be unique among concurrently pending requests, which
//! a process-lifetime monotonic counter guarantees by construction.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing allocator for request correlation ids.
///
/// Ids start at 1; 0 is never issued, so it can never collide with a live
/// request. Shared freely across tasks — allocation is a single atomic
/// `fetch_add`.
pub struct MessageIdCounter {
    inner: AtomicU64,
}

impl MessageIdCounter {
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(1),
        }
    }

    /// Returns the next correlation id.
    ///
    /// `Ordering::Relaxed` suffices: the counter orders nothing but itself.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// The id the next call to [`next`](Self::next) would return.
    pub fn peek(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for MessageIdCounter {
    fn default() -> Self {
        Self::new()
    }
}
