//! Resource profile selection.
//!
//! The orchestrator asks the host for [`ResourceHints`] once per run and
//! derives a [`ConcurrencyProfile`] for each of its gates with
//! [`select_profile`]. Selection is a pure function so it can be exercised
//! with arbitrary hints.

use serde::{Deserialize, Serialize};

/// Host capability hints. `None` means the host does not expose the value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceHints {
    /// Memory budget in GiB.
    pub memory_gb: Option<f64>,
    /// Available hardware parallelism.
    pub parallelism: Option<usize>,
}

impl ResourceHints {
    /// Hints for a host that exposes nothing.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn with_memory_gb(mut self, memory_gb: f64) -> Self {
        self.memory_gb = Some(memory_gb);
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }
}

/// Concurrency ceiling derived for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyProfile {
    /// Maximum concurrent holders, always at least 1.
    pub ceiling: usize,
    /// Whether the host looked constrained.
    pub conservative: bool,
}

/// Thresholds that put a run into conservative mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    /// When false, hints are ignored and the default ceiling always applies.
    #[serde(default = "default_monitoring_enabled")]
    pub monitoring_enabled: bool,

    /// Memory budgets below this many GiB are considered low.
    #[serde(default = "default_low_memory_threshold_gb")]
    pub low_memory_threshold_gb: f64,

    /// Parallelism below this value is considered low.
    #[serde(default = "default_low_parallelism_threshold")]
    pub low_parallelism_threshold: usize,
}

fn default_monitoring_enabled() -> bool {
    true
}

fn default_low_memory_threshold_gb() -> f64 {
    4.0
}

fn default_low_parallelism_threshold() -> usize {
    2
}

impl Default for ResourcePolicy {
    fn default() -> Self {
        Self {
            monitoring_enabled: default_monitoring_enabled(),
            low_memory_threshold_gb: default_low_memory_threshold_gb(),
            low_parallelism_threshold: default_low_parallelism_threshold(),
        }
    }
}

impl ResourcePolicy {
    /// Whether `hints` describe a constrained host under this policy.
    ///
    /// Unknown hints never count as constrained.
    pub fn is_constrained(&self, hints: &ResourceHints) -> bool {
        if !self.monitoring_enabled {
            return false;
        }

        let low_memory = hints
            .memory_gb
            .is_some_and(|gb| gb < self.low_memory_threshold_gb);
        let low_parallelism = hints
            .parallelism
            .is_some_and(|n| n < self.low_parallelism_threshold);

        low_memory || low_parallelism
    }
}

/// Derives the concurrency profile for a gate whose normal ceiling is
/// `default_ceiling`.
///
/// A constrained host gets `ceiling = 1` in conservative mode. Otherwise the
/// default applies (clamped to at least 1).
pub fn select_profile(
    hints: &ResourceHints,
    policy: &ResourcePolicy,
    default_ceiling: usize,
) -> ConcurrencyProfile {
    if policy.is_constrained(hints) {
        ConcurrencyProfile {
            ceiling: 1,
            conservative: true,
        }
    } else {
        ConcurrencyProfile {
            ceiling: default_ceiling.max(1),
            conservative: false,
        }
    }
}

/// Source of host capability hints.
pub trait ResourceProbe: Send + Sync {
    /// Reports the current hints. Must not block.
    fn resource_hints(&self) -> ResourceHints;
}

/// Probe returning fixed hints.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticResources(pub ResourceHints);

impl ResourceProbe for StaticResources {
    fn resource_hints(&self) -> ResourceHints {
        self.0
    }
}
