//! Counting admission gate.
//!
//! A [`Gate`] admits at most `capacity` concurrent holders. Excess callers
//! wait in arrival order: the underlying Tokio semaphore is fair, and a
//! released permit is handed directly to the longest-waiting acquirer rather
//! than being returned to the pool where a newcomer could take it.
//!
//! Permits are RAII guards. Releasing happens only when a [`GatePermit`] is
//! dropped, so every exit path of the holder (normal return, error, panic
//! unwinding, or the future being dropped) gives the permit back, and
//! releasing more times than acquired cannot be expressed.
//!
//! A gate is scoped to one orchestration run. Clones share the same permits,
//! which is how the run hands the gate to every component that needs it.
//!
//! # Example
//!
//! ```ignore
//! use docflow_core::Gate;
//!
//! let gate = Gate::new(3, "backend")?;
//!
//! let answer = gate.with_permit(|| async { call_backend().await }).await?;
//!
//! // Refuse further admissions; current holders are unaffected.
//! gate.close();
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Errors produced by a [`Gate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// A gate needs at least one permit.
    #[error("gate capacity must be at least 1")]
    ZeroCapacity,

    /// The gate no longer admits new holders.
    #[error("gate '{0}' is closed")]
    Closed(String),

    /// All permits are currently held (only from [`Gate::try_acquire`]).
    #[error("gate '{0}' has no free permits")]
    Exhausted(String),
}

/// Point-in-time view of a gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStatus {
    /// Gate label (e.g. "items", "backend").
    pub label: String,
    /// Maximum concurrent holders.
    pub capacity: usize,
    /// Permits not currently held.
    pub available: usize,
    /// Current holders.
    pub holders: usize,
    /// Callers suspended in `acquire`.
    pub waiting: usize,
    /// Highest number of simultaneous holders observed.
    pub peak: usize,
    /// Total permits granted since creation.
    pub granted: u64,
    /// Whether the gate refuses new admissions.
    pub closed: bool,
}

#[derive(Debug, Default)]
struct GateCounters {
    holders: AtomicUsize,
    waiting: AtomicUsize,
    peak: AtomicUsize,
    granted: AtomicU64,
}

impl GateCounters {
    fn on_granted(&self) {
        let current = self.holders.fetch_add(1, Ordering::SeqCst) + 1;
        self.granted.fetch_add(1, Ordering::Relaxed);

        let mut peak = self.peak.load(Ordering::Relaxed);
        while current > peak {
            match self.peak.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }
}

/// Counting admission primitive with FIFO hand-off.
#[derive(Debug, Clone)]
pub struct Gate {
    semaphore: Arc<Semaphore>,
    counters: Arc<GateCounters>,
    capacity: usize,
    label: Arc<str>,
}

impl Gate {
    /// Creates a gate admitting at most `capacity` concurrent holders.
    pub fn new(capacity: usize, label: impl Into<String>) -> Result<Self, GateError> {
        if capacity == 0 {
            return Err(GateError::ZeroCapacity);
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            counters: Arc::new(GateCounters::default()),
            capacity,
            label: Arc::from(label.into()),
        })
    }

    /// Whether `other` is a handle to this same gate.
    pub(crate) fn same_gate(&self, other: &Gate) -> bool {
        Arc::ptr_eq(&self.semaphore, &other.semaphore)
    }

    /// Suspends until a permit is available, then grants it.
    ///
    /// Waiters are served in the order they called `acquire`. Dropping the
    /// returned future before it completes gives up the place in line
    /// without consuming a permit.
    pub async fn acquire(&self) -> Result<GatePermit, GateError> {
        let waiting = WaitingGuard::enter(&self.counters);
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GateError::Closed(self.label.to_string()))?;
        drop(waiting);

        self.counters.on_granted();
        Ok(GatePermit {
            counters: Arc::clone(&self.counters),
            _permit: permit,
        })
    }

    /// Grants a permit only if one is free right now.
    pub fn try_acquire(&self) -> Result<GatePermit, GateError> {
        let permit = Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::Closed => GateError::Closed(self.label.to_string()),
                TryAcquireError::NoPermits => GateError::Exhausted(self.label.to_string()),
            })?;

        self.counters.on_granted();
        Ok(GatePermit {
            counters: Arc::clone(&self.counters),
            _permit: permit,
        })
    }

    /// Acquires a permit, runs `op`, and releases the permit on every exit
    /// path of `op`.
    pub async fn with_permit<F, Fut, T>(&self, op: F) -> Result<T, GateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _permit = self.acquire().await?;
        Ok(op().await)
    }

    /// Stops admitting new holders.
    ///
    /// Pending and future `acquire` calls fail with [`GateError::Closed`];
    /// permits already granted stay valid until dropped.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Gate label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Maximum concurrent holders.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Current number of holders.
    pub fn holders(&self) -> usize {
        self.counters.holders.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous holders observed.
    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of the gate's counters.
    pub fn status(&self) -> GateStatus {
        GateStatus {
            label: self.label.to_string(),
            capacity: self.capacity,
            available: self.available(),
            holders: self.holders(),
            waiting: self.counters.waiting.load(Ordering::SeqCst),
            peak: self.peak(),
            granted: self.counters.granted.load(Ordering::Relaxed),
            closed: self.is_closed(),
        }
    }
}

/// A granted admission. The permit returns to its gate when dropped.
#[derive(Debug)]
pub struct GatePermit {
    counters: Arc<GateCounters>,
    // Declared last: released only after the holder count is decremented in
    // `drop`, so `holders` never exceeds `capacity`.
    _permit: OwnedSemaphorePermit,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        let previous = self.counters.holders.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "gate holder count underflow");
    }
}

/// Counts a caller as waiting for as long as it is suspended in `acquire`,
/// including when the acquiring future is dropped mid-wait.
struct WaitingGuard<'a> {
    counters: &'a GateCounters,
}

impl<'a> WaitingGuard<'a> {
    fn enter(counters: &'a GateCounters) -> Self {
        counters.waiting.fetch_add(1, Ordering::SeqCst);
        Self { counters }
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.counters.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}
