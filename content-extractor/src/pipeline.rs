use crate::cascade::ContentSource;
use crate::classifier::{self, SourceKind};
use crate::collaborators::{ArticleMetadata, CritiqueGenerator, DerivativeGenerator, GenerationContext};
use crate::store::SubmissionStore;
use crate::submission::{truncate_chars, Critique, Submission, SubmissionStatus, MAX_AUTHOR_CHARS, MAX_TITLE_CHARS};
use crate::tables::SourceTables;
use crate::types::{ExtractorError, FetchResult, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const EMPTY_CONTENT: &str = "No article content available for analysis";

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub submission: Submission,
    /// Derivative generators that failed without failing the submission.
    pub partial_failures: Vec<String>,
}

/// Sequences extract -> analyze -> generate for one submission and persists
/// every transition.
pub struct SubmissionPipeline {
    store: Arc<dyn SubmissionStore>,
    extractor: Arc<dyn ContentSource>,
    critic: Arc<dyn CritiqueGenerator>,
    generators: Vec<Arc<dyn DerivativeGenerator>>,
    tables: Arc<SourceTables>,
    timeout: Duration,
}

impl SubmissionPipeline {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        extractor: Arc<dyn ContentSource>,
        critic: Arc<dyn CritiqueGenerator>,
        tables: Arc<SourceTables>,
    ) -> Self {
        Self {
            store,
            extractor,
            critic,
            generators: Vec::new(),
            tables,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn DerivativeGenerator>) -> Self {
        info!("Adding derivative generator: {}", generator.kind());
        self.generators.push(generator);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn submit_url(&self, url: &str) -> Result<Submission> {
        let submission = Submission::from_url(&self.tables, url)?;
        self.store.insert(&submission).await?;
        info!("Created submission {} for {}", submission.id, url);
        Ok(submission)
    }

    pub async fn submit_text(&self, text: &str, title: Option<String>, author: Option<String>) -> Result<Submission> {
        let submission = Submission::from_text(text, title, author)?;
        self.store.insert(&submission).await?;
        info!("Created manual submission {} ({} chars)", submission.id, text.chars().count());
        Ok(submission)
    }

    /// Drive a submission as far as it will go. Extraction and analysis failures
    /// end in `failed` and still return `Ok`; errors are store or state problems.
    pub async fn run(&self, id: Uuid) -> Result<PipelineReport> {
        let submission = self.store.get(id).await?;

        let submission = if submission.has_text() {
            self.transition(submission, SubmissionStatus::Analyzing).await?
        } else {
            let extracting = self.transition(submission, SubmissionStatus::Extracting).await?;
            match self.extract(extracting).await? {
                Some(analyzing) => analyzing,
                None => return self.report(id, Vec::new()).await,
            }
        };

        self.analyze_and_generate(submission).await
    }

    /// Re-run analysis and generation on stored text. Valid from `completed` or `failed`.
    pub async fn regenerate(&self, id: Uuid) -> Result<PipelineReport> {
        let submission = self.store.get(id).await?;
        if !submission.has_text() {
            return Err(ExtractorError::NoContentFound(EMPTY_CONTENT.to_string()));
        }
        let submission = self.transition(submission, SubmissionStatus::Analyzing).await?;
        self.analyze_and_generate(submission).await
    }

    async fn transition(&self, mut submission: Submission, to: SubmissionStatus) -> Result<Submission> {
        let from = submission.status;
        if !from.can_transition_to(to) {
            return Err(ExtractorError::InvalidTransition { from, to });
        }

        submission.status = to;
        if matches!(to, SubmissionStatus::Extracting | SubmissionStatus::Analyzing) {
            submission.error_message = None;
        }

        let updated = self.store.update(&submission).await?;
        info!("Submission {}: {} -> {}", updated.id, from, to);
        Ok(updated)
    }

    async fn fail(&self, mut submission: Submission, message: String) -> Result<Submission> {
        warn!("Submission {} failed: {}", submission.id, message);
        submission.error_message = Some(message);
        self.transition(submission, SubmissionStatus::Failed).await
    }

    /// `Some(submission)` in `analyzing` on success, `None` once recorded as failed.
    async fn extract(&self, submission: Submission) -> Result<Option<Submission>> {
        let url = match submission.original_url.clone() {
            Some(url) => url,
            None => {
                self.fail(submission, EMPTY_CONTENT.to_string()).await?;
                return Ok(None);
            }
        };

        let result = match self.extractor.extract_with_cache(&url, self.timeout).await {
            Ok(result) => result,
            Err(e) => {
                self.fail(submission, e.to_string()).await?;
                return Ok(None);
            }
        };

        if !result.success {
            let mut failed = submission;
            failed.is_paywalled = result.is_paywalled;
            let message = result
                .exhaustion_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Content extraction failed".to_string());
            self.fail(failed, message).await?;
            return Ok(None);
        }

        let submission = self.apply_extraction(submission, &url, result);
        Ok(Some(self.transition(submission, SubmissionStatus::Analyzing).await?))
    }

    fn apply_extraction(&self, mut submission: Submission, url: &str, result: FetchResult) -> Submission {
        submission.extracted_text = Some(result.text);
        if let Some(method) = result.method {
            submission.extraction_method = method;
        }
        submission.archive_url = result.archive_url;
        submission.is_paywalled = result.is_paywalled;

        // User-supplied fields win over page metadata.
        if submission.title.is_none() {
            submission.title = result.metadata.title.map(|t| truncate_chars(&t, MAX_TITLE_CHARS));
        }
        if submission.author.is_none() {
            submission.author = result.metadata.author.map(|a| truncate_chars(&a, MAX_AUTHOR_CHARS));
        }
        if submission.publication_date.is_none() {
            submission.publication_date = result.metadata.published_at;
        }

        if submission.source == classifier::OTHER {
            if let Ok(classification) = classifier::classify(&self.tables, url) {
                if classification.kind == SourceKind::Publication {
                    debug!("Detected publication {} for {}", classification.source, url);
                    submission.source = classification.source;
                }
            }
        }

        submission
    }

    async fn analyze_and_generate(&self, submission: Submission) -> Result<PipelineReport> {
        let id = submission.id;

        let text = submission.extracted_text.clone().filter(|t| !t.trim().is_empty());
        let text = match text {
            Some(text) => text,
            None => {
                self.fail(submission, EMPTY_CONTENT.to_string()).await?;
                return self.report(id, Vec::new()).await;
            }
        };

        let metadata = ArticleMetadata {
            title: submission.title.clone(),
            author: submission.author.clone(),
            source: submission.source.clone(),
            url: submission.original_url.clone(),
            publication_date: submission.publication_date,
        };

        info!("Analyzing submission {} with {}", id, self.critic.generator_name());
        let analyzed = match self.critic.analyze(&text, &metadata).await {
            Ok(critique) => self.store.save_critique(id, &critique).await.map(|_| critique),
            Err(e) => Err(e),
        };
        let critique = match analyzed {
            Ok(critique) => critique,
            Err(e) => {
                self.fail(submission, format!("Analysis failed: {}", e)).await?;
                return self.report(id, Vec::new()).await;
            }
        };

        let submission = self.transition(submission, SubmissionStatus::Generating).await?;
        let partial_failures = self.generate(&submission, &critique).await;

        let mut submission = submission;
        submission.error_message = if partial_failures.is_empty() {
            None
        } else {
            Some(format!("Some content could not be generated: {}", partial_failures.join("; ")))
        };
        let submission = self.transition(submission, SubmissionStatus::Completed).await?;

        Ok(PipelineReport {
            submission,
            partial_failures,
        })
    }

    /// Generator and save errors are collected rather than failing the run.
    async fn generate(&self, submission: &Submission, critique: &Critique) -> Vec<String> {
        let context = GenerationContext {
            submission_id: submission.id,
            source: submission.source.clone(),
            title: submission.title.clone(),
            url: submission.original_url.clone(),
            char_limit: self.tables.reply_char_limit(&submission.source),
        };

        let mut partial_failures = Vec::new();
        for generator in &self.generators {
            let generated = match generator.generate(&context, critique).await {
                Ok(content) => self.store.save_derivative(submission.id, &content).await,
                Err(e) => Err(e),
            };
            match generated {
                Ok(()) => debug!("Generated {} for submission {}", generator.kind(), submission.id),
                Err(e) => {
                    error!("Failed to generate {} for submission {}: {}", generator.kind(), submission.id, e);
                    partial_failures.push(format!("{}: {}", generator.kind(), e));
                }
            }
        }
        partial_failures
    }

    async fn report(&self, id: Uuid, partial_failures: Vec<String>) -> Result<PipelineReport> {
        Ok(PipelineReport {
            submission: self.store.get(id).await?,
            partial_failures,
        })
    }
}

/// Where pipeline runs execute.
#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    fn executor_name(&self) -> &str;

    /// Start (or perform) a run for `id`. Returning `Ok` does not mean the run succeeded.
    async fn dispatch(&self, id: Uuid) -> Result<()>;
}

/// Runs the pipeline on the caller's task.
pub struct InlineExecutor {
    pipeline: Arc<SubmissionPipeline>,
}

impl InlineExecutor {
    pub fn new(pipeline: Arc<SubmissionPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl PipelineExecutor for InlineExecutor {
    fn executor_name(&self) -> &str {
        "inline"
    }

    async fn dispatch(&self, id: Uuid) -> Result<()> {
        self.pipeline.run(id).await.map(|_| ())
    }
}

/// Bounded queue drained by one background worker.
pub struct QueuedExecutor {
    sender: Mutex<Option<mpsc::Sender<Uuid>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueuedExecutor {
    pub fn spawn(pipeline: Arc<SubmissionPipeline>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Uuid>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(id) = receiver.recv().await {
                match pipeline.run(id).await {
                    Ok(report) => info!("Queued run for {} ended in {}", id, report.submission.status),
                    Err(e) => error!("Queued run for {} errored: {}", id, e),
                }
            }
            debug!("Pipeline queue closed");
        });

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Stop accepting work and wait for queued runs to finish.
    pub async fn shutdown(&self) -> Result<()> {
        self.sender.lock().await.take();
        if let Some(worker) = self.worker.lock().await.take() {
            worker
                .await
                .map_err(|e| ExtractorError::QueueUnavailable(format!("worker panicked: {}", e)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl PipelineExecutor for QueuedExecutor {
    fn executor_name(&self) -> &str {
        "queued"
    }

    async fn dispatch(&self, id: Uuid) -> Result<()> {
        let sender = self.sender.lock().await;
        let sender = sender
            .as_ref()
            .ok_or_else(|| ExtractorError::QueueUnavailable("queue is shut down".to_string()))?;

        sender.try_send(id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ExtractorError::QueueUnavailable("queue is full".to_string()),
            mpsc::error::TrySendError::Closed(_) => ExtractorError::QueueUnavailable("worker stopped".to_string()),
        })?;

        debug!("Queued pipeline run for {}", id);
        Ok(())
    }
}

/// Uses `primary` and drops to `fallback` when the primary queue is unavailable.
pub struct FallbackExecutor {
    primary: Arc<dyn PipelineExecutor>,
    fallback: Arc<dyn PipelineExecutor>,
}

impl FallbackExecutor {
    pub fn new(primary: Arc<dyn PipelineExecutor>, fallback: Arc<dyn PipelineExecutor>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl PipelineExecutor for FallbackExecutor {
    fn executor_name(&self) -> &str {
        "fallback"
    }

    async fn dispatch(&self, id: Uuid) -> Result<()> {
        match self.primary.dispatch(id).await {
            Err(ExtractorError::QueueUnavailable(reason)) => {
                warn!(
                    "{} executor unavailable ({}), running {} via {}",
                    self.primary.executor_name(),
                    reason,
                    id,
                    self.fallback.executor_name()
                );
                self.fallback.dispatch(id).await
            }
            other => other,
        }
    }
}
