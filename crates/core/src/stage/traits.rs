//! Interfaces to the external collaborators driven by the pipeline.

use async_trait::async_trait;
use std::sync::Arc;

use super::error::StageError;
use super::types::{Comparison, Item, NormalizedContent, PrimaryAnalysis, RankingResult, Suggestion};
use crate::pipeline::BackendLimiter;

/// Turns a raw item into normalized content.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns the name of this extractor implementation.
    fn name(&self) -> &str;

    /// Extracts normalized content. Fails with [`StageError::Content`] on
    /// unusable input.
    async fn extract(&self, item: &Item) -> Result<NormalizedContent, StageError>;
}

/// Backend-driven analysis of normalized content.
///
/// Every method is one backend call. The pipeline runs each of them under
/// the run's shared backend gate, so implementations must not add their own
/// admission control.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Returns the name of this analyzer implementation.
    fn name(&self) -> &str;

    /// Core scoring and matching.
    async fn analyze(&self, content: &NormalizedContent) -> Result<PrimaryAnalysis, StageError>;

    /// Generates improvement suggestions from the primary result.
    async fn suggest_improvements(
        &self,
        content: &NormalizedContent,
        analysis: &PrimaryAnalysis,
    ) -> Result<Vec<Suggestion>, StageError>;

    /// Compares the content requirement by requirement.
    async fn compare_requirements(
        &self,
        content: &NormalizedContent,
        analysis: &PrimaryAnalysis,
    ) -> Result<Vec<Comparison>, StageError>;
}

/// Whole-batch ranking side task.
///
/// A ranker typically issues several backend calls; each must go through
/// `backend` so it competes for the same budget as the item pipelines.
#[async_trait]
pub trait BatchRanker: Send + Sync {
    /// Returns the name of this ranker implementation.
    fn name(&self) -> &str;

    /// Ranks every item of the batch.
    async fn rank(
        &self,
        items: Arc<[Item]>,
        backend: BackendLimiter,
    ) -> Result<RankingResult, StageError>;
}
