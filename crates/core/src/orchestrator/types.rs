//! Types for the batch orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::gate::{Gate, GateError, GateStatus};
use crate::pipeline::ItemOutcome;
use crate::profile::{ConcurrencyProfile, ResourceHints};
use crate::stage::{BatchRanker, ErrorKind, Item, RankingResult};

/// Errors that reject a batch before any work starts.
///
/// Everything that happens after admission is reported inside the
/// [`BatchEnvelope`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The batch is larger than the configured limit.
    #[error("batch of {count} items exceeds the limit of {max}")]
    TooManyItems { count: usize, max: usize },

    /// A gate could not be created.
    #[error("gate error: {0}")]
    Gate(#[from] GateError),
}

/// Batch-level progress: items finished so far out of the total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

impl BatchProgress {
    /// Whether every item has finished.
    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

/// Overall result of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Every item completed (also used for an empty batch).
    Success,
    /// Some items completed, some failed.
    Partial,
    /// No item completed.
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub(crate) fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => Self::Success,
            (0, _) => Self::Failed,
            _ => Self::Partial,
        }
    }
}

/// Aggregate numbers for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
    /// Wall-clock time divided by item count (0 for an empty batch).
    pub avg_ms_per_item: u64,
}

/// Profiles selected for the run's two gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProfile {
    /// Hints reported by the host at run start.
    pub hints: ResourceHints,
    /// Outer item gate.
    pub items: ConcurrencyProfile,
    /// Inner backend-call gate.
    pub backend: ConcurrencyProfile,
}

/// Final state of the run's gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub items: GateStatus,
    pub backend: GateStatus,
}

/// Result of the ranking side task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SideTaskOutcome {
    Completed {
        ranker: String,
        result: RankingResult,
        duration_ms: u64,
    },
    Failed {
        ranker: String,
        kind: ErrorKind,
        message: String,
    },
}

impl SideTaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// The ranking, if the side task completed.
    pub fn result(&self) -> Option<&RankingResult> {
        match self {
            Self::Completed { result, .. } => Some(result),
            Self::Failed { .. } => None,
        }
    }
}

/// The orchestrator's single return value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEnvelope {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: BatchStatus,
    pub profile: RunProfile,
    /// One outcome per submitted item, in submission order.
    pub outcomes: Vec<ItemOutcome>,
    /// Present when the ranking side task ran.
    pub ranking: Option<SideTaskOutcome>,
    pub progress: BatchProgress,
    pub summary: BatchSummary,
    pub gates: GateReport,
}

impl BatchEnvelope {
    /// Outcome for the item with `item_id`.
    pub fn outcome(&self, item_id: &str) -> Option<&ItemOutcome> {
        self.outcomes.iter().find(|o| o.item_id() == item_id)
    }

    pub fn completed(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| o.is_completed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_completed())
    }
}

/// Input to [`BatchOrchestrator::run_with`](super::BatchOrchestrator::run_with).
#[derive(Default)]
pub struct BatchRequest {
    pub items: Vec<Item>,
    /// Ranking side task. Skipped when `None`.
    pub ranker: Option<Arc<dyn BatchRanker>>,
    /// Receives a progress update after each item finishes.
    pub progress: Option<mpsc::UnboundedSender<BatchProgress>>,
    /// Handle that can stop admitting new items.
    pub stop: Option<StopHandle>,
}

impl BatchRequest {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn BatchRanker>) -> Self {
        self.ranker = Some(ranker);
        self
    }

    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<BatchProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn with_stop(mut self, stop: StopHandle) -> Self {
        self.stop = Some(stop);
        self
    }
}

/// Stops a run from admitting new items.
///
/// Stopping closes the run's outer item gate: items still waiting for
/// admission fail as cancelled, while items already in flight and the
/// ranking side task run to completion. A handle stopped before the run
/// starts closes the gate as soon as the run creates it.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    stopped: AtomicBool,
    gates: Mutex<Vec<Gate>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops admitting new items.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        for gate in self.gates().iter() {
            gate.close();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Registers a gate to close on stop.
    pub(crate) fn attach(&self, gate: &Gate) {
        self.gates().push(gate.clone());
        // A stop that raced with registration must still close the gate.
        if self.is_stopped() {
            gate.close();
        }
    }

    /// Forgets a gate registered with [`attach`](Self::attach). Runs call
    /// this when they finish so a reused handle only holds live gates.
    pub(crate) fn detach(&self, gate: &Gate) {
        self.gates().retain(|g| !g.same_gate(gate));
    }

    #[cfg(test)]
    pub(crate) fn attached(&self) -> usize {
        self.gates().len()
    }

    fn gates(&self) -> std::sync::MutexGuard<'_, Vec<Gate>> {
        self.inner
            .gates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_counts() {
        assert_eq!(BatchStatus::from_counts(0, 0), BatchStatus::Success);
        assert_eq!(BatchStatus::from_counts(3, 0), BatchStatus::Success);
        assert_eq!(BatchStatus::from_counts(2, 1), BatchStatus::Partial);
        assert_eq!(BatchStatus::from_counts(0, 2), BatchStatus::Failed);
    }

    #[test]
    fn test_stop_closes_attached_gates() {
        let stop = StopHandle::new();
        let gate = Gate::new(2, "items").unwrap();
        stop.attach(&gate);
        assert!(!gate.is_closed());

        stop.clone().stop();
        assert!(stop.is_stopped());
        assert!(gate.is_closed());
    }

    #[test]
    fn test_detach_forgets_only_that_gate() {
        let stop = StopHandle::new();
        let first = Gate::new(1, "items").unwrap();
        let second = Gate::new(1, "items").unwrap();
        stop.attach(&first);
        stop.attach(&second);

        stop.detach(&first.clone());
        assert_eq!(stop.attached(), 1);

        stop.stop();
        assert!(!first.is_closed());
        assert!(second.is_closed());
    }

    #[test]
    fn test_stop_before_attach() {
        let stop = StopHandle::new();
        stop.stop();

        let gate = Gate::new(1, "items").unwrap();
        stop.attach(&gate);
        assert!(gate.is_closed());
    }

    #[test]
    fn test_side_task_serialization() {
        let outcome = SideTaskOutcome::Failed {
            ranker: "mock".to_string(),
            kind: ErrorKind::BackendTimeout,
            message: "too slow".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "backend_timeout");
        assert!(outcome.result().is_none());
    }
}
