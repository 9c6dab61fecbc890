//! Mock extractor for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::stage::{Extractor, Item, NormalizedContent, StageError};

/// Mock implementation of the Extractor trait.
///
/// Decodes the item as UTF-8 text. The first non-empty line becomes the
/// auxiliary context. Items can be configured to fail or to take a while.
#[derive(Debug, Clone, Default)]
pub struct MockExtractor {
    /// Item IDs that fail with a content error.
    failing: Arc<RwLock<HashSet<String>>>,
    /// Simulated extraction time per item ID.
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    /// Item IDs in the order they were extracted.
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockExtractor {
    /// Create a new mock extractor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make extraction of the given item fail with a content error.
    pub async fn fail_item(&self, item_id: &str) {
        self.failing.write().await.insert(item_id.to_string());
    }

    /// Set the simulated extraction time for an item.
    pub async fn set_delay(&self, item_id: &str, delay: Duration) {
        self.delays.write().await.insert(item_id.to_string(), delay);
    }

    /// Item IDs extracted so far.
    pub async fn recorded_calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract(&self, item: &Item) -> Result<NormalizedContent, StageError> {
        self.calls.write().await.push(item.id.clone());

        let delay = self.delays.read().await.get(&item.id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.read().await.contains(&item.id) {
            return Err(StageError::content(format!(
                "Unreadable document: {}",
                item.name
            )));
        }

        let text = String::from_utf8_lossy(&item.data).trim().to_string();
        if text.is_empty() {
            return Err(StageError::content(format!("Empty document: {}", item.name)));
        }

        let context = text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| vec![line.to_string()])
            .unwrap_or_default();

        Ok(NormalizedContent {
            item_id: item.id.clone(),
            text,
            context,
        })
    }
}
