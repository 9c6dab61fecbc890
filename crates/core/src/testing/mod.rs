//! Testing utilities and mock collaborators.
//!
//! This module provides mock implementations of the collaborator traits so
//! orchestration can be tested without a real backend. The mocks are
//! deterministic: the same items always produce the same outcomes.
//!
//! # Example
//!
//! ```rust,ignore
//! use docflow_core::testing::{fixtures, CallProbe, MockAnalyzer, MockExtractor, MockRanker};
//!
//! let probe = CallProbe::new();
//! let analyzer = MockAnalyzer::new().with_probe(probe.clone());
//! let ranker = MockRanker::new().with_probe(probe.clone());
//!
//! let items = fixtures::items(&["rust tokio", "go", "rust postgres"]);
//! // ... run a batch, then:
//! assert!(probe.peak() <= 3);
//! ```

mod call_probe;
mod mock_analyzer;
mod mock_extractor;
mod mock_ranker;

pub use call_probe::{CallProbe, ProbeGuard};
pub use mock_analyzer::{AnalyzerOp, MockAnalyzer};
pub use mock_extractor::MockExtractor;
pub use mock_ranker::MockRanker;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::stage::Item;

    /// Requirement keywords the mock analyzer and ranker match against.
    pub const REQUIREMENTS: &[&str] = &["rust", "tokio", "postgres", "kubernetes"];

    /// Create a text item with ID `item-{index}`.
    pub fn item(index: usize, text: &str) -> Item {
        let mut item = Item::new(
            format!("item-{}", index),
            format!("item-{}.txt", index),
            text.as_bytes(),
        );
        item.index = index;
        item
    }

    /// Create one item per text, indexed by position.
    pub fn items(texts: &[&str]) -> Vec<Item> {
        texts
            .iter()
            .enumerate()
            .map(|(index, text)| item(index, text))
            .collect()
    }
}
