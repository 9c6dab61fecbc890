//! Mock ranker for testing.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::call_probe::CallProbe;
use super::fixtures::REQUIREMENTS;
use crate::pipeline::BackendLimiter;
use crate::stage::{BatchRanker, Item, RankedEntry, RankingResult, StageError};

/// Mock implementation of the BatchRanker trait.
///
/// Scores every item with one backend call made through the limiter it is
/// given, so its calls compete with the item pipelines for the same budget.
/// The score is the share of fixture requirements found in the item text.
#[derive(Debug, Clone)]
pub struct MockRanker {
    /// If set, the whole ranking fails with this error.
    failure: Arc<RwLock<Option<StageError>>>,
    /// Item IDs whose individual scoring fails.
    failing_items: Arc<RwLock<HashSet<String>>>,
    /// Simulated latency per scoring call.
    delay: Duration,
    runs: Arc<AtomicUsize>,
    probe: CallProbe,
}

impl Default for MockRanker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRanker {
    /// Create a new mock ranker.
    pub fn new() -> Self {
        Self {
            failure: Arc::new(RwLock::new(None)),
            failing_items: Arc::new(RwLock::new(HashSet::new())),
            delay: Duration::ZERO,
            runs: Arc::new(AtomicUsize::new(0)),
            probe: CallProbe::new(),
        }
    }

    /// Simulate latency on every scoring call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Count calls through a shared probe.
    pub fn with_probe(mut self, probe: CallProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Make the next rankings fail with `error`.
    pub async fn set_failure(&self, error: StageError) {
        *self.failure.write().await = Some(error);
    }

    /// Make scoring of one item fail; the item is ranked with score 0.
    pub async fn fail_item(&self, item_id: &str) {
        self.failing_items.write().await.insert(item_id.to_string());
    }

    /// Number of times `rank` was invoked.
    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    async fn score(&self, item: &Item) -> Result<RankedEntry, StageError> {
        let _guard = self.probe.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(error) = self.failure.read().await.clone() {
            return Err(error);
        }
        if self.failing_items.read().await.contains(&item.id) {
            return Err(StageError::backend_unavailable("rank", "scoring rejected"));
        }

        let text = String::from_utf8_lossy(&item.data).to_lowercase();
        let matched: Vec<String> = REQUIREMENTS
            .iter()
            .filter(|r| text.contains(**r))
            .map(|r| r.to_string())
            .collect();
        let score = (matched.len() * 100 / REQUIREMENTS.len()) as u8;

        Ok(RankedEntry {
            item_id: item.id.clone(),
            score,
            reasoning: format!("Matched {} of {} requirements", matched.len(), REQUIREMENTS.len()),
            matched,
        })
    }
}

#[async_trait]
impl BatchRanker for MockRanker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn rank(
        &self,
        items: Arc<[Item]>,
        backend: BackendLimiter,
    ) -> Result<RankingResult, StageError> {
        self.runs.fetch_add(1, Ordering::SeqCst);

        let scored = join_all(
            items
                .iter()
                .map(|item| backend.call("rank", self.score(item))),
        )
        .await;

        // A run-wide failure fails the side task; a single rejected item
        // only loses its score.
        let run_failed = self.failure.read().await.is_some();
        let mut entries = Vec::with_capacity(scored.len());
        for (item, result) in items.iter().zip(scored) {
            match result {
                Ok(entry) => entries.push(entry),
                Err(e) if run_failed => return Err(e),
                Err(e) => entries.push(RankedEntry::unscored(&item.id, e)),
            }
        }

        Ok(RankingResult::new(entries))
    }
}
