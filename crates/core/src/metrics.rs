//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Item pipelines (outcomes, stage durations)
//! - Backend calls made under the shared backend gate
//! - Batches and the ranking side task
//!
//! Permit counts are not exported here; they are scoped to each run's gates
//! and reported in the batch envelope.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Item Pipeline Metrics
// =============================================================================

/// Items processed total by result.
pub static ITEMS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("docflow_items_processed_total", "Total items processed"),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "docflow_stage_duration_seconds",
            "Duration of pipeline stages per item",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
        &["stage"], // "extract", "primary_analysis", "enrichment"
    )
    .unwrap()
});

// =============================================================================
// Backend Metrics
// =============================================================================

/// Backend calls total by operation and status.
pub static BACKEND_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("docflow_backend_calls_total", "Total backend calls"),
        &["operation", "status"], // status: "success", "error", "timeout", "rejected"
    )
    .unwrap()
});

/// Backend call duration in seconds, measured after the permit is granted.
pub static BACKEND_CALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "docflow_backend_call_duration_seconds",
            "Duration of backend calls",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batch duration in seconds.
pub static BATCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("docflow_batch_duration_seconds", "Duration of batch runs")
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["status"], // "success", "partial", "failed"
    )
    .unwrap()
});

/// Ranking side-task runs by result.
pub static RANKING_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("docflow_ranking_runs_total", "Total ranking side-task runs"),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Items
        Box::new(ITEMS_PROCESSED.clone()),
        Box::new(STAGE_DURATION.clone()),
        // Backend
        Box::new(BACKEND_CALLS.clone()),
        Box::new(BACKEND_CALL_DURATION.clone()),
        // Batch
        Box::new(BATCH_DURATION.clone()),
        Box::new(RANKING_RUNS.clone()),
    ]
}
