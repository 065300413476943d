use crate::types::{ExtractorError, FetchResult, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub const DEFAULT_TTL_HOURS: i64 = 24;

/// SHA-256 hex of the raw URL string.
pub fn url_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub url_hash: String,
    pub url: String,
    pub content: FetchResult,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Row storage behind [`ContentCache`]. No locking: last write wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, url_hash: &str) -> Result<Option<CacheEntry>>;
    async fn upsert(&self, entry: CacheEntry) -> Result<()>;
    async fn delete(&self, url_hash: &str) -> Result<()>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn load(&self, url_hash: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(url_hash).cloned())
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        self.entries.write().await.insert(entry.url_hash.clone(), entry);
        Ok(())
    }

    async fn delete(&self, url_hash: &str) -> Result<()> {
        self.entries.write().await.remove(url_hash);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok((before - entries.len()) as u64)
    }
}

pub struct PgCacheStore {
    db: PgPool,
}

impl PgCacheStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn load(&self, url_hash: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            "SELECT url_hash, url, content, fetched_at, expires_at FROM content_cache WHERE url_hash = $1",
        )
        .bind(url_hash)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let content: String = row.try_get("content")?;
                Ok(Some(CacheEntry {
                    url_hash: row.try_get("url_hash")?,
                    url: row.try_get("url")?,
                    content: serde_json::from_str(&content)?,
                    fetched_at: row.try_get("fetched_at")?,
                    expires_at: row.try_get("expires_at")?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        let content = serde_json::to_string(&entry.content)?;

        sqlx::query(
            r#"
            INSERT INTO content_cache (url_hash, url, content, fetched_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (url_hash) DO UPDATE SET
                url = EXCLUDED.url,
                content = EXCLUDED.content,
                fetched_at = EXCLUDED.fetched_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&entry.url_hash)
        .bind(&entry.url)
        .bind(content)
        .bind(entry.fetched_at)
        .bind(entry.expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn delete(&self, url_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM content_cache WHERE url_hash = $1")
            .bind(url_hash)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM content_cache WHERE expires_at < $1")
            .bind(now)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

/// TTL cache of successful fetch results, keyed by [`url_hash`].
#[derive(Clone)]
pub struct ContentCache {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
}

impl ContentCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            default_ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()))
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub async fn get(&self, url: &str) -> Result<Option<FetchResult>> {
        self.get_at(url, Utc::now()).await
    }

    /// Lookup as of `now`; a stale entry is deleted and reported as a miss.
    pub async fn get_at(&self, url: &str, now: DateTime<Utc>) -> Result<Option<FetchResult>> {
        let hash = url_hash(url);

        let entry = match self.store.load(&hash).await? {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if entry.is_expired_at(now) {
            debug!("Evicting expired cache entry for {}", url);
            self.store.delete(&hash).await?;
            return Ok(None);
        }

        Ok(Some(entry.content))
    }

    /// Store `result` for `ttl`, or the default TTL. Failed or blank results are ignored.
    pub async fn put(&self, url: &str, result: &FetchResult, ttl: Option<Duration>) -> Result<bool> {
        self.put_at(url, result, ttl, Utc::now()).await
    }

    pub async fn put_at(
        &self,
        url: &str,
        result: &FetchResult,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if !result.success || result.text.trim().is_empty() {
            debug!("Not caching unsuccessful result for {}", url);
            return Ok(false);
        }

        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl <= Duration::zero() {
            return Err(ExtractorError::Config(format!("cache TTL must be positive, got {}", ttl)));
        }

        self.store
            .upsert(CacheEntry {
                url_hash: url_hash(url),
                url: url.to_string(),
                content: result.clone(),
                fetched_at: now,
                expires_at: now + ttl,
            })
            .await?;

        debug!("Cached {} for {} hours", url, ttl.num_hours());
        Ok(true)
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let deleted = self.store.delete_expired(Utc::now()).await?;
        info!("Deleted {} expired cache entries", deleted);
        Ok(deleted)
    }
}
