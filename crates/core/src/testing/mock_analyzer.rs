//! Mock analyzer for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::call_probe::CallProbe;
use super::fixtures::REQUIREMENTS;
use crate::stage::{
    Analyzer, Comparison, NormalizedContent, PrimaryAnalysis, Priority, RequirementStatus,
    StageError, Suggestion,
};

/// Analyzer operation, used to target failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyzerOp {
    Analyze,
    Suggest,
    Compare,
}

/// Mock implementation of the Analyzer trait.
///
/// Results are a pure function of the content text: a requirement is
/// matched when its keyword appears in the (lowercased) text. This makes
/// repeated runs produce identical outcomes.
///
/// Provides controllable behavior for testing:
/// - Fail a specific operation for a specific item
/// - Simulate backend latency, globally or per item
/// - Count in-flight calls through a shared [`CallProbe`]
///
/// # Example
///
/// ```rust,ignore
/// use docflow_core::testing::{AnalyzerOp, CallProbe, MockAnalyzer};
///
/// let probe = CallProbe::new();
/// let analyzer = MockAnalyzer::new().with_probe(probe.clone());
/// analyzer.fail("item-2", AnalyzerOp::Suggest, StageError::backend_unavailable("suggest", "503")).await;
///
/// // ... run a batch ...
///
/// assert!(probe.peak() <= 3);
/// ```
#[derive(Debug, Clone)]
pub struct MockAnalyzer {
    requirements: Arc<Vec<String>>,
    /// Errors to return, by item ID and operation.
    failures: Arc<RwLock<HashMap<(String, AnalyzerOp), StageError>>>,
    /// Simulated latency applied to every call.
    delay: Duration,
    /// Per-item latency overriding `delay`.
    item_delays: Arc<RwLock<HashMap<String, Duration>>>,
    /// Recorded calls (item ID, operation).
    calls: Arc<RwLock<Vec<(String, AnalyzerOp)>>>,
    probe: CallProbe,
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnalyzer {
    /// Create a new mock analyzer matching against the fixture requirements.
    pub fn new() -> Self {
        Self {
            requirements: Arc::new(REQUIREMENTS.iter().map(|r| r.to_string()).collect()),
            failures: Arc::new(RwLock::new(HashMap::new())),
            delay: Duration::ZERO,
            item_delays: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            probe: CallProbe::new(),
        }
    }

    /// Use the given requirement keywords instead of the fixture set.
    pub fn with_requirements(mut self, requirements: &[&str]) -> Self {
        self.requirements = Arc::new(requirements.iter().map(|r| r.to_string()).collect());
        self
    }

    /// Simulate latency on every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Count calls through a shared probe.
    pub fn with_probe(mut self, probe: CallProbe) -> Self {
        self.probe = probe;
        self
    }

    /// The probe counting this analyzer's calls.
    pub fn probe(&self) -> &CallProbe {
        &self.probe
    }

    /// Configure `op` to fail for `item_id`.
    pub async fn fail(&self, item_id: &str, op: AnalyzerOp, error: StageError) {
        self.failures
            .write()
            .await
            .insert((item_id.to_string(), op), error);
    }

    /// Set the simulated latency for one item's calls.
    pub async fn set_item_delay(&self, item_id: &str, delay: Duration) {
        self.item_delays
            .write()
            .await
            .insert(item_id.to_string(), delay);
    }

    /// All recorded calls.
    pub async fn recorded_calls(&self) -> Vec<(String, AnalyzerOp)> {
        self.calls.read().await.clone()
    }

    /// Number of calls made for `op`.
    pub async fn calls_for(&self, op: AnalyzerOp) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|(_, o)| *o == op)
            .count()
    }

    /// Simulates one backend call: records it, holds the probe for the
    /// configured latency, then returns the configured failure if any.
    async fn backend_call(&self, item_id: &str, op: AnalyzerOp) -> Result<(), StageError> {
        self.calls.write().await.push((item_id.to_string(), op));
        let _guard = self.probe.enter();

        let delay = self
            .item_delays
            .read()
            .await
            .get(item_id)
            .copied()
            .unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .read()
            .await
            .get(&(item_id.to_string(), op))
            .cloned();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn is_matched(&self, content: &NormalizedContent, requirement: &str) -> bool {
        content.text.to_lowercase().contains(requirement)
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze(&self, content: &NormalizedContent) -> Result<PrimaryAnalysis, StageError> {
        self.backend_call(&content.item_id, AnalyzerOp::Analyze)
            .await?;

        let (matched, missing): (Vec<String>, Vec<String>) = self
            .requirements
            .iter()
            .cloned()
            .partition(|r| self.is_matched(content, r));

        let total = self.requirements.len().max(1);
        let overall_score = (matched.len() * 100 / total) as u8;

        Ok(PrimaryAnalysis {
            overall_score,
            ats_score: 50 + overall_score / 2,
            matched,
            missing,
        })
    }

    async fn suggest_improvements(
        &self,
        content: &NormalizedContent,
        analysis: &PrimaryAnalysis,
    ) -> Result<Vec<Suggestion>, StageError> {
        self.backend_call(&content.item_id, AnalyzerOp::Suggest)
            .await?;

        Ok(analysis
            .missing
            .iter()
            .enumerate()
            .map(|(i, requirement)| Suggestion {
                section: "skills".to_string(),
                original: String::new(),
                suggestion: format!("Add experience with {requirement}"),
                priority: if i == 0 { Priority::High } else { Priority::Medium },
            })
            .collect())
    }

    async fn compare_requirements(
        &self,
        content: &NormalizedContent,
        analysis: &PrimaryAnalysis,
    ) -> Result<Vec<Comparison>, StageError> {
        self.backend_call(&content.item_id, AnalyzerOp::Compare)
            .await?;

        Ok(self
            .requirements
            .iter()
            .map(|requirement| {
                let matched = analysis.matched.contains(requirement);
                Comparison {
                    requirement: requirement.clone(),
                    status: if matched {
                        RequirementStatus::Matched
                    } else {
                        RequirementStatus::Missing
                    },
                    evidence: if matched {
                        requirement.clone()
                    } else {
                        String::new()
                    },
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(text: &str) -> NormalizedContent {
        NormalizedContent {
            item_id: "item-0".to_string(),
            text: text.to_string(),
            context: vec![],
        }
    }

    #[tokio::test]
    async fn test_keyword_analysis() {
        let analyzer = MockAnalyzer::new().with_requirements(&["rust", "go"]);

        let analysis = analyzer.analyze(&content("Senior RUST engineer")).await.unwrap();
        assert_eq!(analysis.matched, vec!["rust".to_string()]);
        assert_eq!(analysis.missing, vec!["go".to_string()]);
        assert_eq!(analysis.overall_score, 50);
        assert_eq!(analysis.ats_score, 75);

        let suggestions = analyzer
            .suggest_improvements(&content("rust"), &analysis)
            .await
            .unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn test_configured_failure() {
        let analyzer = MockAnalyzer::new();
        analyzer
            .fail("item-0", AnalyzerOp::Analyze, StageError::backend_unavailable("analyze", "down"))
            .await;

        let err = analyzer.analyze(&content("rust")).await.unwrap_err();
        assert!(matches!(err, StageError::BackendUnavailable { .. }));
        assert_eq!(analyzer.calls_for(AnalyzerOp::Analyze).await, 1);
        assert_eq!(analyzer.probe().in_flight(), 0);
    }
}
