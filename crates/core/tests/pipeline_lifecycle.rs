//! Item pipeline integration tests.
//!
//! These tests compose the building blocks directly, without the
//! orchestrator:
//! - Bounded mapper driving item pipelines under an outer gate
//! - One backend limiter shared by every pipeline
//! - Stage failures staying inside their item

use std::sync::Arc;
use std::time::Duration;

use docflow_core::{
    bounded_map,
    testing::{fixtures, AnalyzerOp, CallProbe, MockAnalyzer, MockExtractor},
    BackendLimiter, ErrorKind, Gate, ItemOutcome, ItemPipeline, Stage, StageError,
};

/// Test helper holding two independent gates and a pipeline over mocks.
struct TestHarness {
    item_gate: Gate,
    pipeline: Arc<ItemPipeline>,
    extractor: MockExtractor,
    analyzer: MockAnalyzer,
    probe: CallProbe,
}

impl TestHarness {
    fn new(item_ceiling: usize, backend_ceiling: usize, delay: Duration) -> Self {
        let probe = CallProbe::new();
        let extractor = MockExtractor::new();
        let analyzer = MockAnalyzer::new().with_delay(delay).with_probe(probe.clone());
        let backend = BackendLimiter::new(
            Gate::new(backend_ceiling, "backend").expect("Failed to create backend gate"),
        );

        let pipeline = Arc::new(ItemPipeline::new(
            Arc::new(extractor.clone()),
            Arc::new(analyzer.clone()),
            backend,
        ));

        Self {
            item_gate: Gate::new(item_ceiling, "items").expect("Failed to create item gate"),
            pipeline,
            extractor,
            analyzer,
            probe,
        }
    }

    async fn run(&self, texts: &[&str]) -> Vec<ItemOutcome> {
        let pipeline = Arc::clone(&self.pipeline);
        bounded_map(fixtures::items(texts), &self.item_gate, move |item, _| {
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.run(&item).await }
        })
        .await
        .into_iter()
        .map(|result| result.expect("mapper should not reject or lose items"))
        .collect()
    }
}

const TEXTS: &[&str] = &[
    "rust",
    "tokio",
    "postgres",
    "kubernetes",
    "rust tokio",
    "postgres kubernetes",
];

// =============================================================================
// Gate Composition Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_backend_gate_is_global_across_items() {
    let harness = TestHarness::new(6, 2, Duration::from_millis(10));

    let outcomes = harness.run(TEXTS).await;

    assert_eq!(outcomes.len(), 6);
    assert!(outcomes.iter().all(ItemOutcome::is_completed));
    assert!(harness.probe.peak() <= 2, "peak was {}", harness.probe.peak());
    assert_eq!(harness.probe.total(), 18);
    assert_eq!(harness.pipeline.backend().status().granted, 18);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_item_gate_independent_of_backend_gate() {
    let harness = TestHarness::new(1, 8, Duration::from_millis(10));

    let outcomes = harness.run(TEXTS).await;

    assert!(outcomes.iter().all(ItemOutcome::is_completed));
    assert_eq!(harness.item_gate.peak(), 1);
    // One item at a time still fans out its two enrichment calls.
    assert_eq!(harness.probe.peak(), 2);
}

#[tokio::test]
async fn test_gates_drained_after_batch() {
    let harness = TestHarness::new(2, 3, Duration::from_millis(2));

    harness.run(TEXTS).await;

    let items = harness.item_gate.status();
    let backend = harness.pipeline.backend().status();
    assert_eq!((items.available, items.holders, items.waiting), (2, 0, 0));
    assert_eq!((backend.available, backend.holders, backend.waiting), (3, 0, 0));
    assert_eq!(items.granted, 6);
}

// =============================================================================
// Failure Isolation Tests
// =============================================================================

#[tokio::test]
async fn test_stage_failures_stay_with_their_item() {
    let harness = TestHarness::new(3, 3, Duration::ZERO);
    harness.extractor.fail_item("item-0").await;
    harness
        .analyzer
        .fail("item-3", AnalyzerOp::Analyze, StageError::backend_unavailable("analyze", "503"))
        .await;
    harness
        .analyzer
        .fail("item-5", AnalyzerOp::Compare, StageError::backend_timeout("compare", Duration::from_secs(1)))
        .await;

    let outcomes = harness.run(TEXTS).await;

    let stages: Vec<Option<(Stage, ErrorKind)>> = outcomes
        .iter()
        .map(|o| o.failure().map(|f| (f.stage.unwrap(), f.kind)))
        .collect();
    assert_eq!(
        stages,
        vec![
            Some((Stage::Extract, ErrorKind::Content)),
            None,
            None,
            Some((Stage::PrimaryAnalysis, ErrorKind::BackendUnavailable)),
            None,
            Some((Stage::Enrichment, ErrorKind::BackendTimeout)),
        ]
    );
    assert_eq!(harness.probe.in_flight(), 0);
}

#[tokio::test]
async fn test_record_carries_all_stage_outputs() {
    let harness = TestHarness::new(2, 2, Duration::ZERO);

    let outcomes = harness.run(&["Jane Doe\nrust tokio"]).await;

    let record = outcomes[0].record().unwrap();
    assert_eq!(record.name, "item-0.txt");
    assert_eq!(record.context, vec!["Jane Doe".to_string()]);
    assert_eq!(record.analysis.matched, vec!["rust".to_string(), "tokio".to_string()]);
    assert_eq!(record.analysis.overall_score, 50);
    assert_eq!(record.suggestions.len(), 2);
    assert_eq!(record.comparisons.len(), 4);
    assert!(record.timings.total_ms >= record.timings.extract_ms);
}
