//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::profile::ResourcePolicy;

/// Configuration for the batch orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum items processed concurrently (outer gate).
    /// Drops to 1 when the host looks constrained.
    #[serde(default = "default_max_concurrent_items")]
    pub max_concurrent_items: usize,

    /// Maximum concurrent backend calls across all items and the ranking
    /// side task (inner gate). Drops to 1 when the host looks constrained.
    #[serde(default = "default_max_backend_calls")]
    pub max_backend_calls: usize,

    /// Largest batch accepted by `run`.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Run the ranking side task for batches with more than one item.
    #[serde(default = "default_ranking_enabled")]
    pub ranking_enabled: bool,

    /// Timeout for a single backend call once it holds a permit
    /// (seconds, 0 = no timeout).
    #[serde(default = "default_backend_timeout_secs")]
    pub backend_timeout_secs: u64,

    /// Thresholds for conservative mode.
    #[serde(default)]
    pub resources: ResourcePolicy,
}

fn default_max_concurrent_items() -> usize {
    2
}

fn default_max_backend_calls() -> usize {
    3
}

fn default_max_items() -> usize {
    20
}

fn default_ranking_enabled() -> bool {
    true
}

fn default_backend_timeout_secs() -> u64 {
    120
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_items: default_max_concurrent_items(),
            max_backend_calls: default_max_backend_calls(),
            max_items: default_max_items(),
            ranking_enabled: default_ranking_enabled(),
            backend_timeout_secs: default_backend_timeout_secs(),
            resources: ResourcePolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Set the outer item ceiling.
    pub fn with_max_concurrent_items(mut self, n: usize) -> Self {
        self.max_concurrent_items = n;
        self
    }

    /// Set the inner backend-call ceiling.
    pub fn with_max_backend_calls(mut self, n: usize) -> Self {
        self.max_backend_calls = n;
        self
    }

    /// Set the batch size limit.
    pub fn with_max_items(mut self, n: usize) -> Self {
        self.max_items = n;
        self
    }

    /// Enable or disable the ranking side task.
    pub fn with_ranking(mut self, enabled: bool) -> Self {
        self.ranking_enabled = enabled;
        self
    }

    /// Set the per-call backend timeout (0 disables it).
    pub fn with_backend_timeout_secs(mut self, secs: u64) -> Self {
        self.backend_timeout_secs = secs;
        self
    }

    /// Set the resource policy.
    pub fn with_resources(mut self, resources: ResourcePolicy) -> Self {
        self.resources = resources;
        self
    }

    /// Per-call backend timeout, if enabled.
    pub fn backend_timeout(&self) -> Option<Duration> {
        (self.backend_timeout_secs > 0).then(|| Duration::from_secs(self.backend_timeout_secs))
    }
}
