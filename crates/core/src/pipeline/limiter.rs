//! Shared backend-call limiter.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::gate::{Gate, GateStatus};
use crate::metrics;
use crate::stage::StageError;

/// Bounds raw backend calls across a whole run.
///
/// One limiter wraps the run's inner gate and is cloned into every item
/// pipeline and the ranking side task, so all of them draw from one budget.
/// The optional per-call timeout starts once the permit is granted; time
/// spent waiting in line does not count against it.
#[derive(Debug, Clone)]
pub struct BackendLimiter {
    gate: Gate,
    call_timeout: Option<Duration>,
}

impl BackendLimiter {
    pub fn new(gate: Gate) -> Self {
        Self {
            gate,
            call_timeout: None,
        }
    }

    /// Sets the per-call timeout. `None` disables it.
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// The underlying gate.
    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn status(&self) -> GateStatus {
        self.gate.status()
    }

    /// Runs one backend call under a permit.
    ///
    /// Fails with [`StageError::Cancelled`] if the gate is closed and with
    /// [`StageError::BackendTimeout`] if the call outlives the timeout.
    pub async fn call<T, Fut>(&self, operation: &str, fut: Fut) -> Result<T, StageError>
    where
        Fut: Future<Output = Result<T, StageError>>,
    {
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                metrics::BACKEND_CALLS
                    .with_label_values(&[operation, "rejected"])
                    .inc();
                return Err(StageError::cancelled(e.to_string()));
            }
        };

        debug!(operation, holders = self.gate.holders(), "Backend call started");
        let start = Instant::now();

        let result = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(operation, timeout_secs = limit.as_secs_f64(), "Backend call timed out");
                    Err(StageError::backend_timeout(operation, limit))
                }
            },
            None => fut.await,
        };

        metrics::BACKEND_CALL_DURATION
            .with_label_values(&[operation])
            .observe(start.elapsed().as_secs_f64());
        let status = match &result {
            Ok(_) => "success",
            Err(StageError::BackendTimeout { .. }) => "timeout",
            Err(_) => "error",
        };
        metrics::BACKEND_CALLS
            .with_label_values(&[operation, status])
            .inc();

        result
    }
}
