//! Types for the pipeline module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::stage::{Comparison, ErrorKind, Item, PrimaryAnalysis, StageError, Suggestion};

/// Step of the per-item pipeline at which an item can fail.
///
/// Assembly only merges outputs that already exist, so it never fails and
/// has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Waiting for the outer item gate. Failures here mean the item never ran.
    Admission,
    Extract,
    PrimaryAnalysis,
    /// Parallel fan-out of the suggestion and comparison calls.
    Enrichment,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admission => "admission",
            Self::Extract => "extract",
            Self::PrimaryAnalysis => "primary_analysis",
            Self::Enrichment => "enrichment",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-stage wall-clock durations for one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub extract_ms: u64,
    pub analysis_ms: u64,
    pub enrichment_ms: u64,
    pub total_ms: u64,
}

/// Assembled result for one successfully processed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub item_id: String,
    pub index: usize,
    pub name: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Auxiliary context produced by extraction.
    #[serde(default)]
    pub context: Vec<String>,
    pub analysis: PrimaryAnalysis,
    pub suggestions: Vec<Suggestion>,
    pub comparisons: Vec<Comparison>,
    pub timings: StageTimings,
}

/// Failure of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_id: String,
    pub index: usize,
    pub name: String,
    /// Stage that failed, or `None` when the failure happened outside any
    /// stage (e.g. the item's task panicked).
    pub stage: Option<Stage>,
    pub kind: ErrorKind,
    pub message: String,
}

impl ItemFailure {
    pub fn new(item: &Item, stage: Option<Stage>, error: &StageError) -> Self {
        Self {
            item_id: item.id.clone(),
            index: item.index,
            name: item.name.clone(),
            stage,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Final result for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Completed(ItemRecord),
    Failed(ItemFailure),
}

impl ItemOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn item_id(&self) -> &str {
        match self {
            Self::Completed(record) => &record.item_id,
            Self::Failed(failure) => &failure.item_id,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Completed(record) => record.index,
            Self::Failed(failure) => failure.index,
        }
    }

    pub fn record(&self) -> Option<&ItemRecord> {
        match self {
            Self::Completed(record) => Some(record),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ItemFailure> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let stages = [
            Stage::Admission,
            Stage::Extract,
            Stage::PrimaryAnalysis,
            Stage::Enrichment,
        ];
        for stage in stages {
            let json = serde_json::to_value(stage).unwrap();
            assert_eq!(json, stage.as_str());
        }
        assert!(serde_json::from_str::<Stage>("\"assemble\"").is_err());
    }

    #[test]
    fn test_failure_from_stage_error() {
        let item = Item::from_text("cv-2", "text");
        let failure = ItemFailure::new(
            &item,
            Some(Stage::Enrichment),
            &StageError::backend_unavailable("suggest", "503"),
        );

        assert_eq!(failure.item_id, "cv-2");
        assert_eq!(failure.stage, Some(Stage::Enrichment));
        assert_eq!(failure.kind, ErrorKind::BackendUnavailable);
        assert_eq!(failure.message, "Backend unavailable during suggest: 503");
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let item = Item::from_text("cv-1", "text");
        let outcome = ItemOutcome::Failed(ItemFailure::new(
            &item,
            Some(Stage::Extract),
            &StageError::content("not UTF-8"),
        ));

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "extract");
        assert_eq!(json["kind"], "content");
        assert!(!outcome.is_completed());
        assert_eq!(outcome.item_id(), "cv-1");
    }
}
