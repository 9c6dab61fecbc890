//! Per-item stage pipeline.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::limiter::BackendLimiter;
use super::types::{ItemFailure, ItemOutcome, ItemRecord, Stage, StageTimings};
use crate::metrics;
use crate::stage::{Analyzer, Extractor, Item, StageError};

/// Drives one item through Extract, PrimaryAnalysis, Enrichment and
/// Assemble.
///
/// Stages run in order and the first failure ends the item. Extraction is
/// local work and runs outside the backend gate; every analyzer call goes
/// through the shared [`BackendLimiter`]. Nothing is retried.
#[derive(Clone)]
pub struct ItemPipeline {
    extractor: Arc<dyn Extractor>,
    analyzer: Arc<dyn Analyzer>,
    backend: BackendLimiter,
}

impl ItemPipeline {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        analyzer: Arc<dyn Analyzer>,
        backend: BackendLimiter,
    ) -> Self {
        Self {
            extractor,
            analyzer,
            backend,
        }
    }

    /// The limiter shared by this pipeline's backend calls.
    pub fn backend(&self) -> &BackendLimiter {
        &self.backend
    }

    /// Processes one item. Always produces an outcome.
    pub async fn run(&self, item: &Item) -> ItemOutcome {
        match self.run_stages(item).await {
            Ok(record) => {
                debug!(
                    item_id = %item.id,
                    total_ms = record.timings.total_ms,
                    "Item completed"
                );
                ItemOutcome::Completed(record)
            }
            Err((stage, error)) => {
                warn!(item_id = %item.id, %stage, error = %error, "Item failed");
                ItemOutcome::Failed(ItemFailure::new(item, Some(stage), &error))
            }
        }
    }

    async fn run_stages(&self, item: &Item) -> Result<ItemRecord, (Stage, StageError)> {
        let start = Instant::now();
        let mut timings = StageTimings::default();

        // Stage 1: Extract
        let stage_start = Instant::now();
        let content = self
            .extractor
            .extract(item)
            .await
            .map_err(|e| (Stage::Extract, e))?;
        timings.extract_ms = observe(Stage::Extract, stage_start);

        // Stage 2: PrimaryAnalysis
        let stage_start = Instant::now();
        let analysis = self
            .backend
            .call("analyze", self.analyzer.analyze(&content))
            .await
            .map_err(|e| (Stage::PrimaryAnalysis, e))?;
        timings.analysis_ms = observe(Stage::PrimaryAnalysis, stage_start);

        // Stage 3: Enrichment. Both calls are launched together and each
        // waits for its own backend permit.
        let stage_start = Instant::now();
        let (suggestions, comparisons) = tokio::join!(
            self.backend.call(
                "suggest",
                self.analyzer.suggest_improvements(&content, &analysis)
            ),
            self.backend.call(
                "compare",
                self.analyzer.compare_requirements(&content, &analysis)
            ),
        );
        let suggestions = suggestions.map_err(|e| (Stage::Enrichment, e))?;
        let comparisons = comparisons.map_err(|e| (Stage::Enrichment, e))?;
        timings.enrichment_ms = observe(Stage::Enrichment, stage_start);

        // Stage 4: Assemble
        timings.total_ms = elapsed_ms(start);
        Ok(ItemRecord {
            item_id: item.id.clone(),
            index: item.index,
            name: item.name.clone(),
            metadata: item.metadata.clone(),
            context: content.context,
            analysis,
            suggestions,
            comparisons,
            timings,
        })
    }
}

fn observe(stage: Stage, start: Instant) -> u64 {
    metrics::STAGE_DURATION
        .with_label_values(&[stage.as_str()])
        .observe(start.elapsed().as_secs_f64());
    elapsed_ms(start)
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
}
