use crate::classifier;
use crate::tables::SourceTables;
use crate::types::{ExtractionMethod, ExtractorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const MAX_TITLE_CHARS: usize = 500;
pub const MAX_AUTHOR_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    Extracting,
    Analyzing,
    Generating,
    Completed,
    Failed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Extracting => "extracting",
            SubmissionStatus::Analyzing => "analyzing",
            SubmissionStatus::Generating => "generating",
            SubmissionStatus::Completed => "completed",
            SubmissionStatus::Failed => "failed",
        }
    }

    /// Forward edges of the pipeline plus the retry (`failed`) and
    /// regenerate (`completed`) re-entry points.
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (Submitted, Extracting)
                | (Submitted, Analyzing)
                | (Extracting, Analyzing)
                | (Extracting, Failed)
                | (Analyzing, Generating)
                | (Analyzing, Failed)
                | (Generating, Completed)
                | (Generating, Failed)
                | (Failed, Extracting)
                | (Failed, Analyzing)
                | (Completed, Analyzing)
        )
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = ExtractorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "submitted" => Ok(SubmissionStatus::Submitted),
            "extracting" => Ok(SubmissionStatus::Extracting),
            "analyzing" => Ok(SubmissionStatus::Analyzing),
            "generating" => Ok(SubmissionStatus::Generating),
            "completed" => Ok(SubmissionStatus::Completed),
            "failed" => Ok(SubmissionStatus::Failed),
            other => Err(ExtractorError::General(format!("Unknown submission status: {}", other))),
        }
    }
}

/// A URL or pasted article moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub share_id: Uuid,
    /// Absent for pasted text.
    pub original_url: Option<String>,
    /// Mirror or archive copy the text actually came from.
    pub archive_url: Option<String>,
    pub extraction_method: ExtractionMethod,
    /// Platform or publication tag.
    pub source: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    pub extracted_text: Option<String>,
    pub is_paywalled: bool,
    pub status: SubmissionStatus,
    pub error_message: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    fn blank(source: String, extraction_method: ExtractionMethod) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            share_id: Uuid::new_v4(),
            original_url: None,
            archive_url: None,
            extraction_method,
            source,
            title: None,
            author: None,
            publication_date: None,
            extracted_text: None,
            is_paywalled: false,
            status: SubmissionStatus::Submitted,
            error_message: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// New submission for a URL; rejects anything that is not an http(s) URL.
    pub fn from_url(tables: &SourceTables, url: &str) -> Result<Self> {
        let classification = classifier::classify(tables, url)?;
        let mut submission = Self::blank(classification.source, ExtractionMethod::Direct);
        submission.original_url = Some(url.trim().to_string());
        Ok(submission)
    }

    /// New submission from pasted article text. Skips extraction entirely.
    pub fn from_text(text: &str, title: Option<String>, author: Option<String>) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(ExtractorError::NoContentFound("Article text is required".to_string()));
        }
        let mut submission = Self::blank(classifier::OTHER.to_string(), ExtractionMethod::Manual);
        submission.extracted_text = Some(text.to_string());
        submission.title = title.map(|t| truncate_chars(&t, MAX_TITLE_CHARS));
        submission.author = author.map(|a| truncate_chars(&a, MAX_AUTHOR_CHARS));
        Ok(submission)
    }

    pub fn has_text(&self) -> bool {
        self.extracted_text
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Structured output of the critique generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub summary: String,
    #[serde(default)]
    pub issues: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Text derived from a critique, such as a reply post or a letter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivativeContent {
    /// `tweet`, `thread`, `letter` and so on.
    pub kind: String,
    pub content: String,
    /// Individual posts when the content is split, e.g. a thread.
    #[serde(default)]
    pub parts: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.trim().chars().take(max_chars).collect()
}
