use crate::cache::ContentCache;
use crate::classifier::{self, SourceKind};
use crate::fetcher::{HttpPageClient, PageClient};
use crate::heuristics::PaywallRules;
use crate::strategies::{DirectFetcher, FetchStrategy, MirrorFetcher, PlatformFetcher, StrategyStage, WaybackFetcher};
use crate::tables::SourceTables;
use crate::types::{CascadeAttempt, ExtractorError, FetchConfig, FetchResult, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Anything that can turn a URL into a [`FetchResult`], cache included.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn extract_with_cache(&self, url: &str, timeout: Duration) -> Result<FetchResult>;
}

/// Runs fetch strategies in order until one succeeds.
pub struct CascadeOrchestrator {
    client: Arc<dyn PageClient>,
    tables: Arc<SourceTables>,
    config: FetchConfig,
    cache: Option<ContentCache>,
}

impl CascadeOrchestrator {
    pub fn new(client: Arc<dyn PageClient>, tables: Arc<SourceTables>, config: FetchConfig) -> Self {
        Self {
            client,
            tables,
            config,
            cache: None,
        }
    }

    /// Orchestrator over a real HTTP client with the built-in or `EXTRACTOR_SOURCES` tables.
    pub fn from_config(config: FetchConfig) -> Result<Self> {
        let client = Arc::new(HttpPageClient::new(config.clone())?);
        Ok(Self::new(client, SourceTables::from_env()?, config))
    }

    pub fn with_cache(mut self, cache: ContentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Strategies for `url` in the order they will be tried.
    pub fn plan(&self, url: &str) -> Result<Vec<Box<dyn FetchStrategy>>> {
        let classification = classifier::classify(&self.tables, url)?;

        if classification.kind == SourceKind::Social {
            let spec = self.tables.platform_fetcher(&classification.source);
            let rules = PaywallRules::for_posts(&self.tables, &self.config);
            let fetcher = PlatformFetcher::new(&classification.source, spec, self.client.clone(), rules);
            return Ok(vec![Box::new(fetcher)]);
        }

        let rules = PaywallRules::for_articles(&self.tables, &self.config);
        let mut strategies: Vec<Box<dyn FetchStrategy>> = Vec::new();

        strategies.push(Box::new(DirectFetcher::new(
            self.client.clone(),
            self.tables.clone(),
            rules.clone(),
        )));
        for spec in &self.tables.archive_mirrors {
            strategies.push(Box::new(MirrorFetcher::archive(
                spec.clone(),
                self.client.clone(),
                self.tables.clone(),
                rules.clone(),
            )));
        }
        for spec in &self.tables.bypass_proxies {
            strategies.push(Box::new(MirrorFetcher::bypass_proxy(
                spec.clone(),
                self.client.clone(),
                self.tables.clone(),
                rules.clone(),
            )));
        }
        if let Some(spec) = &self.tables.wayback {
            strategies.push(Box::new(WaybackFetcher::new(
                spec.clone(),
                self.client.clone(),
                self.tables.clone(),
                rules.clone(),
            )));
        }
        for spec in &self.tables.search_caches {
            strategies.push(Box::new(MirrorFetcher::search_cache(
                spec.clone(),
                self.client.clone(),
                self.tables.clone(),
                rules.clone(),
            )));
        }

        // Stable, so configuration order holds within a stage.
        strategies.sort_by_key(|strategy| strategy.stage());

        if classification.likely_paywalled {
            debug!("{} is on a paywalled domain, trying archive mirrors first", url);
            let (mut front, rest): (Vec<_>, Vec<_>) = strategies
                .into_iter()
                .partition(|strategy| strategy.stage() == StrategyStage::ArchiveMirror);
            front.extend(rest);
            strategies = front;
        }

        let mut seen = HashSet::new();
        strategies.retain(|strategy| seen.insert(strategy.name().to_string()));

        Ok(strategies)
    }

    /// One full cascade, ignoring the cache.
    pub async fn run_cascade(&self, url: &str, timeout: Duration) -> Result<FetchResult> {
        let likely_paywalled = classifier::classify(&self.tables, url)?.likely_paywalled;
        let strategies = self.plan(url)?;

        info!("Extracting {} with {} strategies", url, strategies.len());

        let mut attempts: Vec<CascadeAttempt> = Vec::new();
        let mut paywall_seen = false;

        for strategy in &strategies {
            let budget = timeout.saturating_mul(strategy.max_requests());
            debug!("Trying strategy {} for {}", strategy.name(), url);

            let result = match tokio::time::timeout(budget, strategy.fetch(url, timeout)).await {
                Ok(result) => result,
                Err(_) => {
                    let e = ExtractorError::Network("Request timed out".to_string());
                    FetchResult::failed(strategy.name(), strategy.method(), &e)
                }
            };

            paywall_seen |= result.is_paywalled;

            if result.success {
                info!(
                    "Extracted {} via {} ({} chars, {} failed attempts)",
                    url,
                    strategy.name(),
                    result.text.chars().count(),
                    attempts.len()
                );
                let mut result = result.with_paywall_flag(paywall_seen);
                result.attempts = attempts;
                return Ok(result);
            }

            let error = result.error.unwrap_or_else(|| "Unknown error".to_string());
            warn!("Strategy {} failed for {}: {}", strategy.name(), url, error);
            attempts.push(CascadeAttempt {
                method: strategy.name().to_string(),
                error,
            });
        }

        warn!("All {} strategies failed for {}", attempts.len(), url);
        Ok(FetchResult::exhausted(attempts, paywall_seen || likely_paywalled))
    }
}

#[async_trait]
impl ContentSource for CascadeOrchestrator {
    /// Cached result if fresh, otherwise a cascade whose success is written back.
    /// Only an invalid URL is an error; extraction failure is a structured result.
    async fn extract_with_cache(&self, url: &str, timeout: Duration) -> Result<FetchResult> {
        classifier::parse_http_url(url)?;

        if let Some(cache) = &self.cache {
            match cache.get(url).await {
                Ok(Some(cached)) if cached.success && !cached.text.trim().is_empty() => {
                    info!("Cache hit for {}", url);
                    return Ok(cached);
                }
                Ok(_) => debug!("Cache miss for {}", url),
                Err(e) => warn!("Cache lookup failed for {}: {}", url, e),
            }
        }

        let result = self.run_cascade(url, timeout).await?;

        if result.success {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.put(url, &result, None).await {
                    warn!("Failed to cache result for {}: {}", url, e);
                }
            }
        }

        Ok(result)
    }
}
