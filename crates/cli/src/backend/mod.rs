//! LLM-backed analyzer and ranker.
//!
//! Both talk to the inference backend through an [`LlmClient`]. Model
//! replies are free text that usually contains a JSON payload; the helpers
//! here locate and parse it. Replies that cannot be parsed fall back to
//! neutral values instead of failing the item.

mod analyzer;
mod ollama;
mod ranker;

pub use analyzer::LlmAnalyzer;
pub use ollama::{CompletionRequest, LlmClient, OllamaClient};
pub use ranker::LlmRanker;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::de::DeserializeOwned;

/// JSON object inside a fenced code block.
static FENCED_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"));

/// Outermost JSON object.
static BARE_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

/// Outermost JSON array.
static BARE_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"));

/// Parses the first JSON object found in a model reply.
pub(crate) fn parse_json_object<T: DeserializeOwned>(text: &str) -> Option<T> {
    if let Ok(value) = serde_json::from_str(text.trim()) {
        return Some(value);
    }

    let fenced = FENCED_OBJECT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| serde_json::from_str(m.as_str()).ok());
    if fenced.is_some() {
        return fenced;
    }

    BARE_OBJECT
        .find(text)
        .and_then(|m| serde_json::from_str(m.as_str()).ok())
}

/// Parses the first JSON array found in a model reply.
pub(crate) fn parse_json_array<T: DeserializeOwned>(text: &str) -> Option<Vec<T>> {
    BARE_ARRAY
        .find(text)
        .and_then(|m| serde_json::from_str(m.as_str()).ok())
}

/// Clamps a model-reported score to 0-100.
pub(crate) fn clamp_score(score: f64) -> u8 {
    if score.is_nan() {
        0
    } else {
        score.round().clamp(0.0, 100.0) as u8
    }
}
