use crate::submission::{Critique, DerivativeContent};
use crate::types::{ExtractorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// What the critique generator knows about the article besides its text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub source: String,
    pub url: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
}

/// Inputs shared by every derivative generator for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    pub submission_id: Uuid,
    pub source: String,
    pub title: Option<String>,
    pub url: Option<String>,
    /// Longest reply the source platform accepts.
    pub char_limit: usize,
}

/// Analysis stage. Real implementations call an LLM.
#[async_trait]
pub trait CritiqueGenerator: Send + Sync {
    fn generator_name(&self) -> String;

    async fn analyze(&self, text: &str, metadata: &ArticleMetadata) -> Result<Critique>;
}

/// One kind of derivative content produced from a critique.
#[async_trait]
pub trait DerivativeGenerator: Send + Sync {
    /// Stored as the `kind` column; unique per pipeline.
    fn kind(&self) -> &str;

    async fn generate(&self, context: &GenerationContext, critique: &Critique) -> Result<DerivativeContent>;
}

/// Extractive critique generator for development and testing
pub struct MockCritiqueGenerator {
    name: String,
    response_delay_ms: u64,
    failure: Option<String>,
}

impl MockCritiqueGenerator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response_delay_ms: 0,
            failure: None,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay_ms = delay_ms;
        self
    }

    /// Every `analyze` call fails with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    async fn simulate_processing(&self) {
        if self.response_delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.response_delay_ms)).await;
        }
    }
}

#[async_trait]
impl CritiqueGenerator for MockCritiqueGenerator {
    fn generator_name(&self) -> String {
        format!("Mock critique generator ({})", self.name)
    }

    async fn analyze(&self, text: &str, metadata: &ArticleMetadata) -> Result<Critique> {
        self.simulate_processing().await;

        if let Some(message) = &self.failure {
            return Err(ExtractorError::Collaborator(message.clone()));
        }

        let sentences: Vec<&str> = text
            .split(['.', '!', '?'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let lead = sentences.first().copied().unwrap_or("No content");
        let summary = match &metadata.title {
            Some(title) => format!("{}: {}.", title, lead),
            None => format!("{}.", lead),
        };

        // Flag absolute claims and bare statistics, the usual suspects
        let issues: Vec<String> = sentences
            .iter()
            .filter(|s| {
                let lower = s.to_lowercase();
                lower.contains("always")
                    || lower.contains("never")
                    || lower.contains("everyone")
                    || s.chars().any(|c| c.is_ascii_digit())
            })
            .take(5)
            .map(|s| format!("Unsupported claim: {}", s))
            .collect();

        debug!("Mock critique: {} issues from {} sentences", issues.len(), sentences.len());

        Ok(Critique {
            summary,
            issues,
            generated_at: Utc::now(),
        })
    }
}

/// Derivative generator that formats the critique and clamps it to the platform limit.
pub struct MockDerivativeGenerator {
    kind: String,
    failure: Option<String>,
}

impl MockDerivativeGenerator {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            failure: None,
        }
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }
}

#[async_trait]
impl DerivativeGenerator for MockDerivativeGenerator {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn generate(&self, context: &GenerationContext, critique: &Critique) -> Result<DerivativeContent> {
        if let Some(message) = &self.failure {
            return Err(ExtractorError::Collaborator(message.clone()));
        }

        let mut parts: Vec<String> = Vec::new();
        if self.kind == "thread" {
            parts.push(clamp_chars(&critique.summary, context.char_limit));
            for issue in &critique.issues {
                parts.push(clamp_chars(issue, context.char_limit));
            }
        }

        let body = if critique.issues.is_empty() {
            critique.summary.clone()
        } else {
            format!("{} {}", critique.summary, critique.issues.join(" "))
        };

        let content = if self.kind == "letter" {
            body
        } else {
            clamp_chars(&body, context.char_limit)
        };

        Ok(DerivativeContent {
            kind: self.kind.clone(),
            content,
            parts,
            generated_at: Utc::now(),
        })
    }
}

/// Cut `text` to at most `limit` chars, ending in `…` when shortened.
pub fn clamp_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    if limit == 0 {
        return String::new();
    }
    let mut clamped: String = text.chars().take(limit - 1).collect();
    clamped.push('…');
    clamped
}
