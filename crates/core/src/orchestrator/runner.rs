//! Batch orchestrator runner.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::OrchestratorConfig;
use super::types::{
    BatchEnvelope, BatchProgress, BatchRequest, BatchStatus, BatchSummary, GateReport,
    OrchestratorError, RunProfile, SideTaskOutcome,
};
use crate::gate::Gate;
use crate::mapper::{bounded_map_observed, MapError};
use crate::metrics;
use crate::pipeline::{elapsed_ms, BackendLimiter, ItemFailure, ItemOutcome, ItemPipeline, Stage};
use crate::profile::{select_profile, ResourceProbe, StaticResources};
use crate::stage::{Analyzer, BatchRanker, Extractor, Item, StageError};

/// Processes batches of items under two concurrency caps.
///
/// Each run creates its own pair of gates:
/// - **items** (outer): how many items are in their pipeline at once
/// - **backend** (inner): how many backend calls are outstanding, shared by
///   every item's stages and the ranking side task
///
/// Gate sizes come from the configured ceilings, reduced to 1 when the host
/// reports constrained resources at run start. Runs are independent: two
/// concurrent runs never share a budget.
pub struct BatchOrchestrator {
    config: OrchestratorConfig,
    extractor: Arc<dyn Extractor>,
    analyzer: Arc<dyn Analyzer>,
    probe: Arc<dyn ResourceProbe>,
}

impl BatchOrchestrator {
    /// Creates an orchestrator. Resource hints default to unknown.
    pub fn new(
        config: OrchestratorConfig,
        extractor: Arc<dyn Extractor>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        Self {
            config,
            extractor,
            analyzer,
            probe: Arc::new(StaticResources::default()),
        }
    }

    /// Use `probe` to read host resource hints at the start of each run.
    pub fn with_resource_probe(mut self, probe: Arc<dyn ResourceProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs a batch, optionally with a ranking side task.
    pub async fn run(
        &self,
        items: Vec<Item>,
        ranker: Option<Arc<dyn BatchRanker>>,
    ) -> Result<BatchEnvelope, OrchestratorError> {
        self.run_with(BatchRequest {
            ranker,
            ..BatchRequest::new(items)
        })
        .await
    }

    /// Runs a batch with progress reporting and cancellation.
    pub async fn run_with(&self, request: BatchRequest) -> Result<BatchEnvelope, OrchestratorError> {
        let BatchRequest {
            items,
            ranker,
            progress,
            stop,
        } = request;

        if items.len() > self.config.max_items {
            return Err(OrchestratorError::TooManyItems {
                count: items.len(),
                max: self.config.max_items,
            });
        }

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();
        let total = items.len();

        // Resource profile, read once per run
        let hints = self.probe.resource_hints();
        let profile = RunProfile {
            hints,
            items: select_profile(&hints, &self.config.resources, self.config.max_concurrent_items),
            backend: select_profile(&hints, &self.config.resources, self.config.max_backend_calls),
        };
        if profile.items.conservative {
            warn!(
                "Run {}: constrained host (memory {:?} GiB, parallelism {:?}), using conservative mode",
                run_id, hints.memory_gb, hints.parallelism
            );
        }
        info!(
            "Run {}: starting batch of {} items (item ceiling {}, backend ceiling {})",
            run_id, total, profile.items.ceiling, profile.backend.ceiling
        );

        let item_gate = Gate::new(profile.items.ceiling, "items")?;
        let backend = BackendLimiter::new(Gate::new(profile.backend.ceiling, "backend")?)
            .with_call_timeout(self.config.backend_timeout());
        if let Some(ref stop) = stop {
            stop.attach(&item_gate);
        }

        // Items are immutable from here on; index follows submission order.
        let items: Arc<[Item]> = items
            .into_iter()
            .enumerate()
            .map(|(index, mut item)| {
                item.index = index;
                item
            })
            .collect();

        // Side task first, so it competes for the backend from the start
        let side_task = match ranker {
            Some(ranker) if self.config.ranking_enabled && total > 1 => Some(spawn_ranking(
                ranker,
                Arc::clone(&items),
                backend.clone(),
            )),
            Some(_) => {
                debug!("Run {}: ranking skipped", run_id);
                None
            }
            None => None,
        };

        // Per-item pipelines under the outer gate
        let pipeline = Arc::new(ItemPipeline::new(
            Arc::clone(&self.extractor),
            Arc::clone(&self.analyzer),
            backend.clone(),
        ));
        let mut tracker = ProgressTracker::new(total, progress);
        let indices: Vec<usize> = (0..total).collect();
        let op_items = Arc::clone(&items);

        let results = bounded_map_observed(
            indices,
            &item_gate,
            move |index, _| {
                let pipeline = Arc::clone(&pipeline);
                let items = Arc::clone(&op_items);
                async move { pipeline.run(&items[index]).await }
            },
            |index, result| tracker.record(&items[index], result),
        )
        .await;

        let outcomes: Vec<ItemOutcome> = results
            .into_iter()
            .zip(items.iter())
            .map(|(result, item)| result.unwrap_or_else(|e| map_failure(item, e)))
            .collect();

        // Join the side task regardless of when it finishes
        let ranking = match side_task {
            Some(task) => Some(task.join().await),
            None => None,
        };
        if let Some(ref stop) = stop {
            stop.detach(&item_gate);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_completed()).count();
        let failed = total - succeeded;
        let status = BatchStatus::from_counts(succeeded, failed);
        let elapsed = elapsed_ms(start);

        metrics::BATCH_DURATION
            .with_label_values(&[status.as_str()])
            .observe(start.elapsed().as_secs_f64());
        info!(
            "Run {}: finished with status {} ({}/{} items succeeded) in {} ms",
            run_id,
            status.as_str(),
            succeeded,
            total,
            elapsed
        );

        Ok(BatchEnvelope {
            run_id,
            started_at,
            finished_at: Utc::now(),
            status,
            profile,
            outcomes,
            ranking,
            progress: tracker.snapshot(),
            summary: BatchSummary {
                total,
                succeeded,
                failed,
                elapsed_ms: elapsed,
                avg_ms_per_item: if total > 0 { elapsed / total as u64 } else { 0 },
            },
            gates: GateReport {
                items: item_gate.status(),
                backend: backend.status(),
            },
        })
    }
}

/// Converts a mapper-level failure into the item's outcome.
fn map_failure(item: &Item, error: MapError) -> ItemOutcome {
    let (stage, stage_error) = match &error {
        MapError::Rejected { reason, .. } => (
            Some(Stage::Admission),
            StageError::cancelled(reason.clone()),
        ),
        MapError::Panicked { .. } | MapError::Lost { .. } => {
            (None, StageError::internal(error.to_string()))
        }
    };
    ItemOutcome::Failed(ItemFailure::new(item, stage, &stage_error))
}

/// Counts finished items and publishes progress.
struct ProgressTracker {
    progress: BatchProgress,
    tx: Option<tokio::sync::mpsc::UnboundedSender<BatchProgress>>,
}

impl ProgressTracker {
    fn new(total: usize, tx: Option<tokio::sync::mpsc::UnboundedSender<BatchProgress>>) -> Self {
        let tracker = Self {
            progress: BatchProgress { completed: 0, total },
            tx,
        };
        tracker.publish();
        tracker
    }

    fn record(&mut self, item: &Item, result: &Result<ItemOutcome, MapError>) {
        let label = match result {
            Ok(ItemOutcome::Completed(_)) => {
                info!("Item {} ({}) completed", item.id, item.name);
                "completed"
            }
            Ok(ItemOutcome::Failed(failure)) => {
                warn!(
                    "Item {} ({}) failed at {:?}: {}",
                    item.id, item.name, failure.stage, failure.message
                );
                "failed"
            }
            Err(e) => {
                warn!("Item {} ({}) did not run: {}", item.id, item.name, e);
                "failed"
            }
        };
        metrics::ITEMS_PROCESSED.with_label_values(&[label]).inc();

        self.progress.completed = (self.progress.completed + 1).min(self.progress.total);
        self.publish();
    }

    fn publish(&self) {
        if let Some(ref tx) = self.tx {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(self.progress);
        }
    }

    fn snapshot(&self) -> BatchProgress {
        self.progress
    }
}

/// Handle to a spawned ranking side task.
struct RankingTask {
    ranker: String,
    start: Instant,
    handle: JoinHandle<Result<crate::stage::RankingResult, StageError>>,
}

fn spawn_ranking(
    ranker: Arc<dyn BatchRanker>,
    items: Arc<[Item]>,
    backend: BackendLimiter,
) -> RankingTask {
    let name = ranker.name().to_string();
    info!("Starting ranking side task with {} over {} items", name, items.len());

    let handle = tokio::spawn(async move { ranker.rank(items, backend).await });
    RankingTask {
        ranker: name,
        start: Instant::now(),
        handle,
    }
}

impl RankingTask {
    async fn join(self) -> SideTaskOutcome {
        let result = match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(StageError::internal(format!("ranking task aborted: {}", e))),
        };

        match result {
            Ok(result) => {
                let duration_ms = elapsed_ms(self.start);
                info!(
                    "Ranking by {} completed in {} ms ({} entries)",
                    self.ranker,
                    duration_ms,
                    result.entries.len()
                );
                metrics::RANKING_RUNS.with_label_values(&["completed"]).inc();
                SideTaskOutcome::Completed {
                    ranker: self.ranker,
                    result,
                    duration_ms,
                }
            }
            Err(e) => {
                error!("Ranking by {} failed: {}", self.ranker, e);
                metrics::RANKING_RUNS.with_label_values(&["failed"]).inc();
                SideTaskOutcome::Failed {
                    ranker: self.ranker,
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        }
    }
}
