//! Types exchanged between the pipeline and its collaborators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One unit of batch work (an input document).
///
/// Items are immutable once submitted. `index` is assigned by the
/// orchestrator from the item's position in the batch.
#[derive(Debug, Clone)]
pub struct Item {
    /// Stable identifier used to correlate results.
    pub id: String,
    /// Position in the submitted batch.
    pub index: usize,
    /// Display name (e.g. the file name).
    pub name: String,
    /// Raw document bytes.
    pub data: Arc<[u8]>,
    /// Free-form metadata copied into the assembled record.
    pub metadata: BTreeMap<String, String>,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id: id.into(),
            index: 0,
            name: name.into(),
            data: data.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Creates an item from text content.
    pub fn from_text(id: impl Into<String>, text: &str) -> Self {
        let id = id.into();
        Self::new(id.clone(), id, text.as_bytes())
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Size of the raw data in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Output of the extract stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedContent {
    /// Item the content was extracted from.
    pub item_id: String,
    /// Normalized text.
    pub text: String,
    /// Auxiliary context (e.g. section headings, detected skills).
    #[serde(default)]
    pub context: Vec<String>,
}

/// Output of the primary analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryAnalysis {
    /// Overall match score, 0-100.
    pub overall_score: u8,
    /// Keyword/format compatibility score, 0-100.
    pub ats_score: u8,
    /// Requirements found in the content.
    pub matched: Vec<String>,
    /// Requirements not found in the content. Input to enrichment.
    pub missing: Vec<String>,
}

/// Priority of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// An improvement suggested during enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Section of the document the suggestion applies to.
    pub section: String,
    /// Current text.
    pub original: String,
    /// Proposed text.
    pub suggestion: String,
    pub priority: Priority,
}

/// How well one requirement is covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementStatus {
    Matched,
    Partial,
    Missing,
}

/// A requirement-by-requirement comparison produced during enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub requirement: String,
    pub status: RequirementStatus,
    /// Supporting excerpt from the content, if any.
    #[serde(default)]
    pub evidence: String,
}

/// One ranked item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub item_id: String,
    /// Relevance score, 0-100.
    pub score: u8,
    pub reasoning: String,
    /// Requirements the item matched.
    #[serde(default)]
    pub matched: Vec<String>,
}

impl RankedEntry {
    /// Entry for an item that could not be scored.
    pub fn unscored(item_id: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            item_id: item_id.into(),
            score: 0,
            reasoning: format!("Scoring failed: {error}"),
            matched: Vec::new(),
        }
    }
}

/// Result of the whole-batch ranking side task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingResult {
    /// Entries sorted by descending score.
    pub entries: Vec<RankedEntry>,
}

impl RankingResult {
    /// Builds a result, sorting entries by descending score. Ties keep
    /// their submission order.
    pub fn new(mut entries: Vec<RankedEntry>) -> Self {
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        Self { entries }
    }

    /// Highest-scoring entry.
    pub fn top(&self) -> Option<&RankedEntry> {
        self.entries.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, score: u8) -> RankedEntry {
        RankedEntry {
            item_id: id.to_string(),
            score,
            reasoning: String::new(),
            matched: vec![],
        }
    }

    #[test]
    fn test_item_builder() {
        let item = Item::from_text("cv-1", "Rust engineer").with_metadata("path", "/tmp/cv-1.txt");

        assert_eq!(item.id, "cv-1");
        assert_eq!(item.name, "cv-1");
        assert_eq!(item.index, 0);
        assert_eq!(item.size_bytes(), 13);
        assert_eq!(item.metadata.get("path").map(String::as_str), Some("/tmp/cv-1.txt"));
    }

    #[test]
    fn test_ranking_sorted_descending_and_stable() {
        let ranking = RankingResult::new(vec![
            entry("a", 40),
            entry("b", 90),
            entry("c", 40),
            entry("d", 75),
        ]);

        let ids: Vec<&str> = ranking.entries.iter().map(|e| e.item_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
        assert_eq!(ranking.top().unwrap().item_id, "b");
    }

    #[test]
    fn test_unscored_entry() {
        let e = RankedEntry::unscored("cv-3", "backend offline");
        assert_eq!(e.score, 0);
        assert_eq!(e.reasoning, "Scoring failed: backend offline");
    }

    #[test]
    fn test_status_serialization() {
        let c = Comparison {
            requirement: "Kubernetes".to_string(),
            status: RequirementStatus::Partial,
            evidence: "Docker Swarm".to_string(),
        };
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["status"], "partial");

        let p = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(p, "\"high\"");
    }
}
