//! Batch ranker backed by an LLM.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use docflow_core::{
    BackendLimiter, BatchRanker, ErrorKind, Item, RankedEntry, RankingResult, StageError,
};

use super::{clamp_score, parse_json_object, CompletionRequest, LlmClient};

/// Characters of each document sent to the model.
const MAX_DOCUMENT_CHARS: usize = 4000;

#[derive(Debug, Deserialize)]
struct RelevanceReply {
    #[serde(default)]
    relevance_score: Option<f64>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    matched_skills: Vec<String>,
}

/// Ranks every document of a batch against one job description.
///
/// Each document is scored by its own backend call; the calls share the
/// run's backend budget with the item pipelines. A document whose call
/// fails is ranked last with score 0. The run fails only when every call
/// failed at the backend.
pub struct LlmRanker {
    client: Arc<dyn LlmClient>,
    job_description: String,
}

impl LlmRanker {
    pub fn new(client: Arc<dyn LlmClient>, job_description: impl Into<String>) -> Self {
        Self {
            client,
            job_description: job_description.into(),
        }
    }

    fn prompt(&self, item: &Item) -> String {
        let text = String::from_utf8_lossy(&item.data);
        let excerpt: String = text.chars().take(MAX_DOCUMENT_CHARS).collect();
        format!(
            "Rate how relevant this document is to the job description.\n\n\
             Job Description:\n{}\n\nDocument ({}):\n{}\n\n\
             Respond with JSON in a ```json block:\n\
             {{\"relevance_score\": <0-100>, \"reasoning\": \"short explanation\", \
             \"matched_skills\": [\"skill\"]}}",
            self.job_description, item.name, excerpt
        )
    }

    async fn score(&self, item: &Item) -> Result<RankedEntry, StageError> {
        let request = CompletionRequest::new(self.prompt(item)).with_max_tokens(512);
        let response = self
            .client
            .complete(request)
            .await
            .map_err(|e| e.into_stage_error("rank"))?;

        Ok(match parse_json_object::<RelevanceReply>(&response.text) {
            Some(reply) => RankedEntry {
                item_id: item.id.clone(),
                score: reply.relevance_score.map(clamp_score).unwrap_or(0),
                reasoning: reply.reasoning,
                matched: reply.matched_skills,
            },
            None => {
                warn!("Unparseable ranking reply for {}", item.id);
                RankedEntry {
                    item_id: item.id.clone(),
                    score: 0,
                    reasoning: "Could not parse relevance score".to_string(),
                    matched: Vec::new(),
                }
            }
        })
    }
}

fn is_backend_error(err: &StageError) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BackendUnavailable | ErrorKind::BackendTimeout | ErrorKind::Cancelled
    )
}

#[async_trait]
impl BatchRanker for LlmRanker {
    fn name(&self) -> &str {
        "llm"
    }

    async fn rank(
        &self,
        items: Arc<[Item]>,
        backend: BackendLimiter,
    ) -> Result<RankingResult, StageError> {
        let results = join_all(
            items
                .iter()
                .map(|item| backend.call("rank", self.score(item))),
        )
        .await;

        if results.iter().all(|r| matches!(r, Err(e) if is_backend_error(e))) {
            if let Some(first) = results.iter().find_map(|r| r.as_ref().err()) {
                return Err(first.clone());
            }
        }

        let entries: Vec<RankedEntry> = items
            .iter()
            .zip(results)
            .map(|(item, result)| match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Ranking failed for {}: {}", item.id, e);
                    RankedEntry::unscored(item.id.clone(), e)
                }
            })
            .collect();

        info!("Ranked {} documents", entries.len());
        Ok(RankingResult::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::ScriptedClient;
    use docflow_core::Gate;

    fn items(texts: &[&str]) -> Arc<[Item]> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let mut item = Item::from_text(format!("doc-{i}"), text);
                item.index = i;
                item
            })
            .collect()
    }

    fn limiter() -> BackendLimiter {
        BackendLimiter::new(Gate::new(2, "backend").unwrap())
    }

    #[tokio::test]
    async fn test_rank_sorts_by_score() {
        let client = ScriptedClient::keyed(&[
            ("alpha", Some("```json\n{\"relevance_score\": 40, \"reasoning\": \"meh\"}\n```")),
            (
                "beta",
                Some("{\"relevance_score\": 91, \"reasoning\": \"strong\", \"matched_skills\": [\"python\"]}"),
            ),
            ("gamma", Some("no idea")),
        ]);
        let ranker = LlmRanker::new(Arc::new(client), "python role");
        let backend = limiter();

        let result = ranker
            .rank(items(&["alpha", "beta", "gamma"]), backend.clone())
            .await
            .unwrap();

        let order: Vec<(&str, u8)> = result
            .entries
            .iter()
            .map(|e| (e.item_id.as_str(), e.score))
            .collect();
        assert_eq!(order, vec![("doc-1", 91), ("doc-0", 40), ("doc-2", 0)]);
        assert_eq!(result.entries[0].matched, vec!["python".to_string()]);
        assert_eq!(backend.status().granted, 3);
    }

    #[tokio::test]
    async fn test_item_failure_is_unscored() {
        let client = ScriptedClient::keyed(&[
            ("alpha", Some("{\"relevance_score\": 75, \"reasoning\": \"ok\"}")),
            ("beta", None),
        ]);
        let ranker = LlmRanker::new(Arc::new(client), "role");

        let result = ranker.rank(items(&["alpha", "beta"]), limiter()).await.unwrap();

        assert_eq!(result.entries[0].item_id, "doc-0");
        assert_eq!(result.entries[1].score, 0);
        assert!(result.entries[1].reasoning.starts_with("Scoring failed"));
    }

    #[tokio::test]
    async fn test_all_calls_failing_fails_the_run() {
        let ranker = LlmRanker::new(Arc::new(ScriptedClient::failing()), "role");

        let err = ranker
            .rank(items(&["alpha", "beta"]), limiter())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[tokio::test]
    async fn test_empty_batch_ranks_nothing() {
        let ranker = LlmRanker::new(Arc::new(ScriptedClient::failing()), "role");

        let result = ranker.rank(items(&[]), limiter()).await.unwrap();

        assert!(result.entries.is_empty());
    }

    #[tokio::test]
    async fn test_all_calls_failing_returns_first_error() {
        let client = ScriptedClient::keyed(&[("alpha", None), ("beta", None)]);
        let ranker = LlmRanker::new(Arc::new(client), "role");

        let err = ranker
            .rank(items(&["alpha", "beta"]), limiter())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StageError::backend_unavailable("rank", "cannot reach backend: no reply scripted")
        );
    }

    #[tokio::test]
    async fn test_closed_gate_cancels_ranking() {
        let ranker = LlmRanker::new(Arc::new(ScriptedClient::new(&[])), "role");
        let backend = limiter();
        backend.gate().close();

        let err = ranker.rank(items(&["alpha"]), backend).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_prompt_truncates_document() {
        let ranker = LlmRanker::new(Arc::new(ScriptedClient::new(&[])), "role");
        let long = "x".repeat(MAX_DOCUMENT_CHARS + 500);
        let item = Item::from_text("doc", &long);

        let prompt = ranker.prompt(&item);
        assert!(prompt.contains(&"x".repeat(MAX_DOCUMENT_CHARS)));
        assert!(!prompt.contains(&"x".repeat(MAX_DOCUMENT_CHARS + 1)));
    }
}
