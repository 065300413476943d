use crate::submission::{Critique, DerivativeContent, Submission};
use crate::types::{ExtractorError, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Persistence for submissions and what the pipeline generates for them.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn insert(&self, submission: &Submission) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Submission>;

    /// Compare-and-set on `version`. Returns the stored row with the bumped
    /// version, or `StaleSubmission` when someone else wrote first.
    async fn update(&self, submission: &Submission) -> Result<Submission>;

    async fn save_critique(&self, submission_id: Uuid, critique: &Critique) -> Result<()>;

    async fn get_critique(&self, submission_id: Uuid) -> Result<Option<Critique>>;

    /// Replaces any earlier content of the same kind.
    async fn save_derivative(&self, submission_id: Uuid, content: &DerivativeContent) -> Result<()>;

    async fn list_derivatives(&self, submission_id: Uuid) -> Result<Vec<DerivativeContent>>;
}

#[derive(Default)]
pub struct MemorySubmissionStore {
    submissions: RwLock<HashMap<Uuid, Submission>>,
    critiques: RwLock<HashMap<Uuid, Critique>>,
    derivatives: RwLock<HashMap<Uuid, Vec<DerivativeContent>>>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn insert(&self, submission: &Submission) -> Result<()> {
        let mut submissions = self.submissions.write().await;
        if submissions.contains_key(&submission.id) {
            return Err(ExtractorError::General(format!("Submission {} already exists", submission.id)));
        }
        submissions.insert(submission.id, submission.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Submission> {
        self.submissions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ExtractorError::SubmissionNotFound { id })
    }

    async fn update(&self, submission: &Submission) -> Result<Submission> {
        let mut submissions = self.submissions.write().await;
        let stored = submissions
            .get_mut(&submission.id)
            .ok_or(ExtractorError::SubmissionNotFound { id: submission.id })?;

        if stored.version != submission.version {
            return Err(ExtractorError::StaleSubmission { id: submission.id });
        }

        let mut updated = submission.clone();
        updated.version += 1;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Ok(updated)
    }

    async fn save_critique(&self, submission_id: Uuid, critique: &Critique) -> Result<()> {
        self.critiques.write().await.insert(submission_id, critique.clone());
        Ok(())
    }

    async fn get_critique(&self, submission_id: Uuid) -> Result<Option<Critique>> {
        Ok(self.critiques.read().await.get(&submission_id).cloned())
    }

    async fn save_derivative(&self, submission_id: Uuid, content: &DerivativeContent) -> Result<()> {
        let mut derivatives = self.derivatives.write().await;
        let contents = derivatives.entry(submission_id).or_default();
        contents.retain(|existing| existing.kind != content.kind);
        contents.push(content.clone());
        Ok(())
    }

    async fn list_derivatives(&self, submission_id: Uuid) -> Result<Vec<DerivativeContent>> {
        let mut contents = self
            .derivatives
            .read()
            .await
            .get(&submission_id)
            .cloned()
            .unwrap_or_default();
        contents.sort_by(|a, b| a.kind.cmp(&b.kind));
        Ok(contents)
    }
}

pub struct PgSubmissionStore {
    db: PgPool,
}

impl PgSubmissionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn row_to_submission(row: &PgRow) -> Result<Submission> {
        let method: String = row.try_get("extraction_method")?;
        let status: String = row.try_get("status")?;

        Ok(Submission {
            id: row.try_get("id")?,
            share_id: row.try_get("share_id")?,
            original_url: row.try_get("original_url")?,
            archive_url: row.try_get("archive_url")?,
            extraction_method: method.parse()?,
            source: row.try_get("source")?,
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            publication_date: row.try_get("publication_date")?,
            extracted_text: row.try_get("extracted_text")?,
            is_paywalled: row.try_get("is_paywalled")?,
            status: status.parse()?,
            error_message: row.try_get("error_message")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn insert(&self, submission: &Submission) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO submissions (id, share_id, original_url, archive_url, extraction_method, source,
                title, author, publication_date, extracted_text, is_paywalled, status, error_message,
                version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(submission.id)
        .bind(submission.share_id)
        .bind(&submission.original_url)
        .bind(&submission.archive_url)
        .bind(submission.extraction_method.as_str())
        .bind(&submission.source)
        .bind(&submission.title)
        .bind(&submission.author)
        .bind(submission.publication_date)
        .bind(&submission.extracted_text)
        .bind(submission.is_paywalled)
        .bind(submission.status.as_str())
        .bind(&submission.error_message)
        .bind(submission.version)
        .bind(submission.created_at)
        .bind(submission.updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Submission> {
        let row = sqlx::query("SELECT * FROM submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(row) => Self::row_to_submission(&row),
            None => Err(ExtractorError::SubmissionNotFound { id }),
        }
    }

    async fn update(&self, submission: &Submission) -> Result<Submission> {
        let row = sqlx::query(
            r#"
            UPDATE submissions SET
                archive_url = $3,
                extraction_method = $4,
                source = $5,
                title = $6,
                author = $7,
                publication_date = $8,
                extracted_text = $9,
                is_paywalled = $10,
                status = $11,
                error_message = $12,
                version = version + 1,
                updated_at = $13
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(submission.id)
        .bind(submission.version)
        .bind(&submission.archive_url)
        .bind(submission.extraction_method.as_str())
        .bind(&submission.source)
        .bind(&submission.title)
        .bind(&submission.author)
        .bind(submission.publication_date)
        .bind(&submission.extracted_text)
        .bind(submission.is_paywalled)
        .bind(submission.status.as_str())
        .bind(&submission.error_message)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Self::row_to_submission(&row),
            None => {
                // Distinguish a missing row from a lost race.
                self.get(submission.id).await?;
                debug!("Version {} of submission {} is stale", submission.version, submission.id);
                Err(ExtractorError::StaleSubmission { id: submission.id })
            }
        }
    }

    async fn save_critique(&self, submission_id: Uuid, critique: &Critique) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO critiques (submission_id, content, generated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (submission_id) DO UPDATE SET
                content = EXCLUDED.content,
                generated_at = EXCLUDED.generated_at
            "#,
        )
        .bind(submission_id)
        .bind(serde_json::to_string(critique)?)
        .bind(critique.generated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn get_critique(&self, submission_id: Uuid) -> Result<Option<Critique>> {
        let row = sqlx::query("SELECT content FROM critiques WHERE submission_id = $1")
            .bind(submission_id)
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(row) => {
                let content: String = row.try_get("content")?;
                Ok(Some(serde_json::from_str(&content)?))
            }
            None => Ok(None),
        }
    }

    async fn save_derivative(&self, submission_id: Uuid, content: &DerivativeContent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO derivative_contents (submission_id, kind, content, parts, generated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (submission_id, kind) DO UPDATE SET
                content = EXCLUDED.content,
                parts = EXCLUDED.parts,
                generated_at = EXCLUDED.generated_at
            "#,
        )
        .bind(submission_id)
        .bind(&content.kind)
        .bind(&content.content)
        .bind(serde_json::to_string(&content.parts)?)
        .bind(content.generated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn list_derivatives(&self, submission_id: Uuid) -> Result<Vec<DerivativeContent>> {
        let rows = sqlx::query(
            r#"
            SELECT kind, content, parts, generated_at
            FROM derivative_contents
            WHERE submission_id = $1
            ORDER BY kind
            "#,
        )
        .bind(submission_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| -> Result<DerivativeContent> {
                let parts: String = row.try_get("parts")?;
                Ok(DerivativeContent {
                    kind: row.try_get("kind")?,
                    content: row.try_get("content")?,
                    parts: serde_json::from_str(&parts)?,
                    generated_at: row.try_get("generated_at")?,
                })
            })
            .collect()
    }
}

/// Apply the bundled schema migrations.
pub async fn migrate(db: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(db).await?;
    Ok(())
}
