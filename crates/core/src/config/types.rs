use serde::{Deserialize, Serialize};

use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Inference backend used by the host's analyzer and ranker.
    #[serde(default)]
    pub backend: Option<BackendConfig>,
}

/// Inference backend configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend base URL (e.g., "http://localhost:11434")
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// Model name
    #[serde(default = "default_model")]
    pub model: String,
    /// HTTP request timeout in seconds (default: 120)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            model: default_model(),
            timeout_secs: default_timeout(),
            temperature: default_temperature(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama2".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.3
}
