//! Plain-text extractor.

use async_trait::async_trait;
use tracing::debug;

use docflow_core::{Extractor, Item, NormalizedContent, StageError};

/// Default character budget for extracted text.
pub const DEFAULT_MAX_CHARS: usize = 20_000;

/// Lines kept as context.
const CONTEXT_LINES: usize = 3;

/// Decodes UTF-8 documents and normalizes their whitespace.
pub struct PlainTextExtractor {
    max_chars: usize,
}

impl PlainTextExtractor {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS)
    }
}

/// Collapses runs of spaces and tabs, trims every line and drops blank lines.
fn normalize(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

#[async_trait]
impl Extractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "plain_text"
    }

    async fn extract(&self, item: &Item) -> Result<NormalizedContent, StageError> {
        let raw = std::str::from_utf8(&item.data).map_err(|e| {
            StageError::content(format!("{} is not valid UTF-8: {}", item.name, e))
        })?;

        let lines = normalize(raw);
        if lines.is_empty() {
            return Err(StageError::content(format!("Empty document: {}", item.name)));
        }

        let joined = lines.join("\n");
        let text: String = joined.chars().take(self.max_chars).collect();
        if text.len() < joined.len() {
            debug!("Truncated {} to {} characters", item.name, self.max_chars);
        }

        Ok(NormalizedContent {
            item_id: item.id.clone(),
            text,
            context: lines.into_iter().take(CONTEXT_LINES).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_core::ErrorKind;

    #[tokio::test]
    async fn test_extract_normalizes_whitespace() {
        let item = Item::from_text("cv", "  Jane   Doe \n\n\tSenior\t engineer\n\nRust, Tokio\nextra");

        let content = PlainTextExtractor::default().extract(&item).await.unwrap();

        assert_eq!(content.item_id, "cv");
        assert_eq!(content.text, "Jane Doe\nSenior engineer\nRust, Tokio\nextra");
        assert_eq!(content.context, vec!["Jane Doe", "Senior engineer", "Rust, Tokio"]);
    }

    #[tokio::test]
    async fn test_extract_truncates() {
        let item = Item::from_text("cv", "héllo world");

        let content = PlainTextExtractor::new(4).extract(&item).await.unwrap();

        assert_eq!(content.text, "héll");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_content_error() {
        let item = Item::new("bin", "photo.jpg", vec![0xff, 0xd8, 0xff, 0xe0]);

        let err = PlainTextExtractor::default().extract(&item).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Content);
        assert!(err.to_string().contains("photo.jpg"));
    }

    #[tokio::test]
    async fn test_blank_document_is_content_error() {
        let item = Item::from_text("blank", " \n\t\n ");

        let err = PlainTextExtractor::default().extract(&item).await.unwrap_err();

        assert_eq!(err, StageError::content("Empty document: blank"));
    }
}
