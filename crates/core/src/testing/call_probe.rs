//! Concurrency probe for counting in-flight calls.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts calls currently executing and remembers the highest overlap seen.
///
/// Clones share the same counters, so one probe can be handed to several
/// mocks to measure their combined concurrency.
#[derive(Debug, Clone, Default)]
pub struct CallProbe {
    inner: Arc<ProbeCounters>,
}

#[derive(Debug, Default)]
struct ProbeCounters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicU64,
}

impl CallProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a call as started. The call ends when the guard is dropped.
    pub fn enter(&self) -> ProbeGuard {
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        self.inner.total.fetch_add(1, Ordering::SeqCst);
        ProbeGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Calls currently executing.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping calls observed.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    /// Calls started since creation.
    pub fn total(&self) -> u64 {
        self.inner.total.load(Ordering::SeqCst)
    }
}

/// Live call registered with a [`CallProbe`].
#[derive(Debug)]
pub struct ProbeGuard {
    inner: Arc<ProbeCounters>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
