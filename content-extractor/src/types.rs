use crate::submission::SubmissionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// How the text of a submission was obtained. Stored as the `extraction_method` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Direct,
    ArchiveMirror,
    BypassProxy,
    SearchCache,
    Manual,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Direct => "direct",
            ExtractionMethod::ArchiveMirror => "archive_mirror",
            ExtractionMethod::BypassProxy => "bypass_proxy",
            ExtractionMethod::SearchCache => "search_cache",
            ExtractionMethod::Manual => "manual",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionMethod {
    type Err = ExtractorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "direct" => Ok(ExtractionMethod::Direct),
            "archive_mirror" => Ok(ExtractionMethod::ArchiveMirror),
            "bypass_proxy" => Ok(ExtractionMethod::BypassProxy),
            "search_cache" => Ok(ExtractionMethod::SearchCache),
            "manual" => Ok(ExtractionMethod::Manual),
            other => Err(ExtractorError::General(format!("Unknown extraction method: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// One failed strategy in a cascade run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeAttempt {
    pub method: String,
    pub error: String,
}

/// Uniform result shape returned by every strategy and by the cascade itself.
///
/// `success == true` always carries non-blank `text` and no `error`; use the
/// constructors rather than building the struct by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub success: bool,
    pub text: String,
    pub metadata: FetchMetadata,
    pub method: Option<ExtractionMethod>,
    pub strategy: Option<String>,
    pub archive_url: Option<String>,
    pub is_paywalled: bool,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<CascadeAttempt>,
    pub fetched_at: DateTime<Utc>,
}

impl FetchResult {
    pub fn succeeded(strategy: &str, method: ExtractionMethod, text: String, metadata: FetchMetadata) -> Self {
        if text.trim().is_empty() {
            return Self::failed(
                strategy,
                method,
                &ExtractorError::NoContentFound("Could not extract article content".to_string()),
            );
        }

        Self {
            success: true,
            text,
            metadata,
            method: Some(method),
            strategy: Some(strategy.to_string()),
            archive_url: None,
            is_paywalled: false,
            error: None,
            attempts: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    pub fn failed(strategy: &str, method: ExtractionMethod, error: &ExtractorError) -> Self {
        Self {
            success: false,
            text: String::new(),
            metadata: FetchMetadata::default(),
            method: Some(method),
            strategy: Some(strategy.to_string()),
            archive_url: None,
            is_paywalled: matches!(error, ExtractorError::PaywallDetected),
            error: Some(error.to_string()),
            attempts: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    /// Terminal cascade failure carrying the full attempt log.
    pub fn exhausted(attempts: Vec<CascadeAttempt>, is_paywalled: bool) -> Self {
        let error = ExtractorError::AllMethodsExhausted { attempts: attempts.clone() };
        Self {
            success: false,
            text: String::new(),
            metadata: FetchMetadata::default(),
            method: None,
            strategy: None,
            archive_url: None,
            is_paywalled,
            error: Some(error.to_string()),
            attempts,
            fetched_at: Utc::now(),
        }
    }

    pub fn with_archive_url(mut self, archive_url: impl Into<String>) -> Self {
        self.archive_url = Some(archive_url.into());
        self
    }

    pub fn with_paywall_flag(mut self, is_paywalled: bool) -> Self {
        self.is_paywalled = is_paywalled;
        self
    }

    pub fn with_metadata(mut self, metadata: FetchMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The error a caller should surface when this result is a cascade failure.
    pub fn exhaustion_error(&self) -> Option<ExtractorError> {
        if self.success {
            return None;
        }
        Some(ExtractorError::AllMethodsExhausted { attempts: self.attempts.clone() })
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_redirects: usize,
    pub max_page_size_mb: usize,
    /// Articles must be longer than this many characters to count as extracted.
    pub min_content_chars: usize,
    /// Posts from short-form platforms only need to clear this.
    pub min_post_chars: usize,
    /// Paywall phrases only count when they appear inside this prefix.
    pub paywall_scan_chars: usize,
    pub cache_ttl_hours: i64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            timeout_seconds: 30,
            max_retries: 1,
            retry_delay_ms: 500,
            max_redirects: 10,
            max_page_size_mb: 10,
            min_content_chars: 300,
            min_post_chars: 20,
            paywall_scan_chars: 500,
            cache_ttl_hours: 24,
        }
    }
}

impl FetchConfig {
    pub fn max_page_bytes(&self) -> usize {
        self.max_page_size_mb.saturating_mul(1024 * 1024)
    }

    /// Defaults overridden by `EXTRACTOR_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(user_agent) = env::var("EXTRACTOR_USER_AGENT") {
            config.user_agent = user_agent;
        }
        config.timeout_seconds = env_or("EXTRACTOR_TIMEOUT_SECONDS", config.timeout_seconds)?;
        config.max_retries = env_or("EXTRACTOR_MAX_RETRIES", config.max_retries)?;
        config.retry_delay_ms = env_or("EXTRACTOR_RETRY_DELAY_MS", config.retry_delay_ms)?;
        config.max_redirects = env_or("EXTRACTOR_MAX_REDIRECTS", config.max_redirects)?;
        config.max_page_size_mb = env_or("EXTRACTOR_MAX_PAGE_SIZE_MB", config.max_page_size_mb)?;
        config.min_content_chars = env_or("EXTRACTOR_MIN_CONTENT_CHARS", config.min_content_chars)?;
        config.min_post_chars = env_or("EXTRACTOR_MIN_POST_CHARS", config.min_post_chars)?;
        config.paywall_scan_chars = env_or("EXTRACTOR_PAYWALL_SCAN_CHARS", config.paywall_scan_chars)?;
        config.cache_ttl_hours = env_or("EXTRACTOR_CACHE_TTL_HOURS", config.cache_ttl_hours)?;

        if config.cache_ttl_hours <= 0 {
            return Err(ExtractorError::Config("EXTRACTOR_CACHE_TTL_HOURS must be positive".to_string()));
        }

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache_ttl_hours)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ExtractorError::Config(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

fn http_message(status: &u16) -> String {
    match *status {
        403 => "Access denied (403). The page may be private or restricted.".to_string(),
        404 => "Page not found (404). The content may have been deleted.".to_string(),
        other => format!("HTTP error: {}", other),
    }
}

pub fn format_attempts(attempts: &[CascadeAttempt]) -> String {
    attempts
        .iter()
        .map(|attempt| format!("{}: {}", attempt.method, attempt.error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractorError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Network(String),

    #[error("{}", http_message(.status))]
    Http { status: u16 },

    #[error("{0}")]
    NoContentFound(String),

    #[error("Paywall detected")]
    PaywallDetected,

    #[error("Content extraction failed: {}", format_attempts(.attempts))]
    AllMethodsExhausted { attempts: Vec<CascadeAttempt> },

    #[error("Submission not found: {id}")]
    SubmissionNotFound { id: Uuid },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: SubmissionStatus, to: SubmissionStatus },

    #[error("Submission {id} was modified by another pipeline run")]
    StaleSubmission { id: Uuid },

    #[error("Pipeline queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("{0}")]
    Collaborator(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("General error: {0}")]
    General(String),
}

impl From<url::ParseError> for ExtractorError {
    fn from(e: url::ParseError) -> Self {
        ExtractorError::InvalidUrl(e.to_string())
    }
}

impl From<reqwest::Error> for ExtractorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExtractorError::Network("Request timed out".to_string())
        } else if e.is_connect() {
            ExtractorError::Network("Connection error".to_string())
        } else if let Some(status) = e.status() {
            ExtractorError::Http { status: status.as_u16() }
        } else {
            ExtractorError::Network(format!("Request failed: {}", e))
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractorError>;
