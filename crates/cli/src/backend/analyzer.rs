//! Document analyzer backed by an LLM.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use docflow_core::{
    Analyzer, Comparison, NormalizedContent, PrimaryAnalysis, Priority, RequirementStatus,
    StageError, Suggestion,
};

use super::{clamp_score, parse_json_array, parse_json_object, CompletionRequest, LlmClient};

/// Skills detected by keyword in both the job description and documents.
const KNOWN_SKILLS: &[&str] = &[
    "python",
    "java",
    "javascript",
    "react",
    "node.js",
    "sql",
    "aws",
    "docker",
    "kubernetes",
    "git",
    "machine learning",
    "data analysis",
    "fastapi",
    "django",
    "flask",
    "mongodb",
    "postgresql",
    "redis",
    "typescript",
    "vue.js",
    "angular",
    "ci/cd",
    "jenkins",
    "terraform",
    "agile",
    "scrum",
    "project management",
    "leadership",
    "communication",
];

const FALLBACK_OVERALL_SCORE: u8 = 70;
const FALLBACK_ATS_SCORE: u8 = 65;

const SYSTEM_PROMPT: &str = "You are an expert resume reviewer. Respond only with JSON.";

/// Returns the known skills mentioned in `text`, in list order.
pub(crate) fn detect_skills(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    KNOWN_SKILLS
        .iter()
        .filter(|skill| lower.contains(**skill))
        .map(|skill| skill.to_string())
        .collect()
}

#[derive(Debug, Deserialize)]
struct ScoreReply {
    #[serde(default)]
    overall_score: Option<f64>,
    #[serde(default)]
    ats_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SuggestionReply {
    #[serde(default)]
    section: String,
    #[serde(default)]
    original: Option<String>,
    #[serde(default)]
    suggestion: String,
    #[serde(default)]
    priority: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ComparisonReply {
    #[serde(default)]
    requirement: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    resume_evidence: Option<String>,
}

fn parse_priority(value: Option<&str>) -> Priority {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        Some("high") => Priority::High,
        Some("low") => Priority::Low,
        _ => Priority::Medium,
    }
}

fn parse_status(value: Option<&str>) -> RequirementStatus {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        Some("matched") => RequirementStatus::Matched,
        Some("partial") => RequirementStatus::Partial,
        _ => RequirementStatus::Missing,
    }
}

/// Scores documents against one job description.
///
/// Skill matching is local. Scores, suggestions and comparisons come from
/// the model; unparseable replies degrade to neutral values with a warning.
pub struct LlmAnalyzer {
    client: Arc<dyn LlmClient>,
    job_description: String,
    required_skills: Vec<String>,
    temperature: f32,
}

impl LlmAnalyzer {
    pub fn new(client: Arc<dyn LlmClient>, job_description: impl Into<String>) -> Self {
        let job_description = job_description.into();
        let required_skills = detect_skills(&job_description);
        Self {
            client,
            job_description,
            required_skills,
            temperature: 0.3,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Skills the job description asks for.
    pub fn required_skills(&self) -> &[String] {
        &self.required_skills
    }

    async fn complete(&self, operation: &str, prompt: String) -> Result<String, StageError> {
        let request = CompletionRequest::new(prompt)
            .with_system(SYSTEM_PROMPT)
            .with_temperature(self.temperature);

        let response = self
            .client
            .complete(request)
            .await
            .map_err(|e| e.into_stage_error(operation))?;

        debug!(
            "{} reply from {} ({} chars)",
            operation,
            response.model,
            response.text.len()
        );
        Ok(response.text)
    }
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    fn name(&self) -> &str {
        "llm"
    }

    async fn analyze(&self, content: &NormalizedContent) -> Result<PrimaryAnalysis, StageError> {
        let found = detect_skills(&content.text);
        let (matched, missing): (Vec<String>, Vec<String>) = self
            .required_skills
            .iter()
            .cloned()
            .partition(|skill| found.contains(skill));

        let prompt = format!(
            "Analyze how well this resume matches the job description.\n\n\
             Job Description:\n{}\n\nResume:\n{}\n\n\
             Provide an overall compatibility score (0-100) and an ATS-friendliness \
             score (0-100) based on keyword usage and formatting.\n\n\
             Respond in JSON format:\n{{\"overall_score\": <number>, \"ats_score\": <number>}}",
            self.job_description, content.text
        );
        let reply = self.complete("analyze", prompt).await?;

        let (overall_score, ats_score) = match parse_json_object::<ScoreReply>(&reply) {
            Some(scores) => (
                scores.overall_score.map(clamp_score).unwrap_or(FALLBACK_OVERALL_SCORE),
                scores.ats_score.map(clamp_score).unwrap_or(FALLBACK_ATS_SCORE),
            ),
            None => {
                warn!("Unparseable analysis reply for {}, using fallback scores", content.item_id);
                (FALLBACK_OVERALL_SCORE, FALLBACK_ATS_SCORE)
            }
        };

        Ok(PrimaryAnalysis {
            overall_score,
            ats_score,
            matched,
            missing,
        })
    }

    async fn suggest_improvements(
        &self,
        content: &NormalizedContent,
        analysis: &PrimaryAnalysis,
    ) -> Result<Vec<Suggestion>, StageError> {
        let prompt = format!(
            "Based on the job description and resume provided, suggest specific improvements.\n\n\
             Job Description:\n{}\n\nResume:\n{}\n\nMissing Skills: {}\n\n\
             Provide 5-7 specific, actionable improvements. Format as a JSON array:\n\
             [{{\"section\": \"section name\", \"original\": \"current text\", \
             \"suggestion\": \"improvement\", \"priority\": \"high/medium/low\"}}]",
            self.job_description,
            content.text,
            analysis.missing.join(", ")
        );
        let reply = self.complete("suggest", prompt).await?;

        let Some(parsed) = parse_json_array::<SuggestionReply>(&reply) else {
            warn!("Unparseable suggestions reply for {}", content.item_id);
            return Ok(Vec::new());
        };

        Ok(parsed
            .into_iter()
            .filter(|s| !s.suggestion.trim().is_empty())
            .map(|s| Suggestion {
                section: s.section,
                original: s.original.unwrap_or_default(),
                suggestion: s.suggestion,
                priority: parse_priority(s.priority.as_deref()),
            })
            .collect())
    }

    async fn compare_requirements(
        &self,
        content: &NormalizedContent,
        _analysis: &PrimaryAnalysis,
    ) -> Result<Vec<Comparison>, StageError> {
        let prompt = format!(
            "Compare the job requirements against the resume content.\n\n\
             Job Description:\n{}\n\nResume:\n{}\n\n\
             For each major requirement, determine if it is \"matched\", \"partial\" or \
             \"missing\". Return as a JSON array:\n\
             [{{\"requirement\": \"requirement text\", \"status\": \"matched/partial/missing\", \
             \"resume_evidence\": \"quote from resume or null\"}}]",
            self.job_description, content.text
        );
        let reply = self.complete("compare", prompt).await?;

        let Some(parsed) = parse_json_array::<ComparisonReply>(&reply) else {
            warn!("Unparseable comparison reply for {}", content.item_id);
            return Ok(Vec::new());
        };

        Ok(parsed
            .into_iter()
            .filter(|c| !c.requirement.trim().is_empty())
            .map(|c| Comparison {
                requirement: c.requirement,
                status: parse_status(c.status.as_deref()),
                evidence: c.resume_evidence.unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::ScriptedClient;
    use docflow_core::ErrorKind;

    const JOB: &str = "Senior engineer: Python, Docker, Kubernetes and PostgreSQL. Agile team.";

    fn content(text: &str) -> NormalizedContent {
        NormalizedContent {
            item_id: "cv-1".to_string(),
            text: text.to_string(),
            context: Vec::new(),
        }
    }

    fn analyzer(replies: &[&str]) -> (LlmAnalyzer, ScriptedClient) {
        let client = ScriptedClient::new(replies);
        (LlmAnalyzer::new(Arc::new(client.clone()), JOB), client)
    }

    #[test]
    fn test_detect_skills() {
        assert_eq!(
            detect_skills(JOB),
            vec!["python", "sql", "docker", "kubernetes", "postgresql", "agile"]
        );
        assert!(detect_skills("").is_empty());
    }

    #[tokio::test]
    async fn test_analyze_parses_scores() {
        let (analyzer, client) = analyzer(&["Sure!\n{\"overall_score\": 82, \"ats_score\": 140}"]);

        let analysis = analyzer
            .analyze(&content("Python developer, Docker daily"))
            .await
            .unwrap();

        assert_eq!(analysis.overall_score, 82);
        assert_eq!(analysis.ats_score, 100);
        assert_eq!(analysis.matched, vec!["python", "docker"]);
        assert_eq!(analysis.missing, vec!["sql", "kubernetes", "postgresql", "agile"]);
        assert!(client.prompts()[0].contains("Python developer"));
    }

    #[tokio::test]
    async fn test_analyze_falls_back_on_garbage() {
        let (analyzer, _) = analyzer(&["I cannot score this."]);

        let analysis = analyzer.analyze(&content("nothing relevant")).await.unwrap();

        assert_eq!(analysis.overall_score, FALLBACK_OVERALL_SCORE);
        assert_eq!(analysis.ats_score, FALLBACK_ATS_SCORE);
        assert!(analysis.matched.is_empty());
        assert_eq!(analysis.missing.len(), 6);
    }

    #[tokio::test]
    async fn test_analyze_backend_error() {
        let client = ScriptedClient::failing();
        let analyzer = LlmAnalyzer::new(Arc::new(client), JOB);

        let err = analyzer.analyze(&content("python")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[tokio::test]
    async fn test_suggestions_parsed_and_defaulted() {
        let reply = r#"[
            {"section": "Skills", "suggestion": "Add Kubernetes", "priority": "HIGH"},
            {"section": "Summary", "original": "Dev", "suggestion": "Say senior", "priority": "whatever"},
            {"section": "Empty", "suggestion": "  "}
        ]"#;
        let (analyzer, client) = analyzer(&[reply]);
        let analysis = PrimaryAnalysis {
            overall_score: 50,
            ats_score: 50,
            matched: vec![],
            missing: vec!["kubernetes".to_string()],
        };

        let suggestions = analyzer
            .suggest_improvements(&content("python"), &analysis)
            .await
            .unwrap();

        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].priority, Priority::High);
        assert_eq!(suggestions[0].original, "");
        assert_eq!(suggestions[1].priority, Priority::Medium);
        assert!(client.prompts()[0].contains("Missing Skills: kubernetes"));
    }

    #[tokio::test]
    async fn test_unparseable_enrichment_yields_empty() {
        let (analyzer, _) = analyzer(&["nope", "still nope"]);
        let analysis = PrimaryAnalysis {
            overall_score: 50,
            ats_score: 50,
            matched: vec![],
            missing: vec![],
        };

        let suggestions = analyzer
            .suggest_improvements(&content("python"), &analysis)
            .await
            .unwrap();
        let comparisons = analyzer
            .compare_requirements(&content("python"), &analysis)
            .await
            .unwrap();

        assert!(suggestions.is_empty());
        assert!(comparisons.is_empty());
    }

    #[tokio::test]
    async fn test_comparisons_parsed() {
        let reply = r#"[
            {"requirement": "Python", "status": "matched", "resume_evidence": "5y Python"},
            {"requirement": "Kubernetes", "status": "missing", "resume_evidence": null},
            {"requirement": "Docker", "status": "Partial"}
        ]"#;
        let (analyzer, _) = analyzer(&[reply]);
        let analysis = PrimaryAnalysis {
            overall_score: 50,
            ats_score: 50,
            matched: vec![],
            missing: vec![],
        };

        let comparisons = analyzer
            .compare_requirements(&content("python"), &analysis)
            .await
            .unwrap();

        let statuses: Vec<_> = comparisons.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![
                RequirementStatus::Matched,
                RequirementStatus::Missing,
                RequirementStatus::Partial
            ]
        );
        assert_eq!(comparisons[0].evidence, "5y Python");
        assert_eq!(comparisons[1].evidence, "");
    }
}
