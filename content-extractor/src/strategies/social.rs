use super::{FetchStrategy, StrategyStage};
use crate::fetcher::PageClient;
use crate::heuristics::PaywallRules;
use crate::html;
use crate::tables::{render_template, PlatformFetcherSpec};
use crate::types::{ExtractionMethod, ExtractorError, FetchMetadata, FetchResult, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Default, Deserialize)]
struct OEmbed {
    author_name: Option<String>,
    title: Option<String>,
    html: Option<String>,
    thumbnail_url: Option<String>,
}

/// Fetcher for a social platform: oEmbed, then front-end mirrors, then the
/// post page's own Open Graph tags.
pub struct PlatformFetcher {
    name: String,
    platform: String,
    spec: PlatformFetcherSpec,
    client: Arc<dyn PageClient>,
    rules: PaywallRules,
}

impl PlatformFetcher {
    pub fn new(platform: &str, spec: PlatformFetcherSpec, client: Arc<dyn PageClient>, rules: PaywallRules) -> Self {
        Self {
            name: format!("{}_fetcher", platform),
            platform: platform.to_string(),
            spec,
            client,
            rules,
        }
    }

    async fn via_oembed(&self, endpoint: &str, url: &str, timeout: Duration) -> Result<(String, FetchMetadata)> {
        let response = self.client.get(&render_template(endpoint, url), timeout).await?;
        response.ensure_success()?;

        let embed: OEmbed = serde_json::from_str(&response.body)?;
        let text = embed
            .html
            .as_deref()
            .map(html::fragment_text)
            .filter(|text| !text.trim().is_empty())
            .or_else(|| embed.title.clone())
            .unwrap_or_default();

        self.rules.accept(&text)?;

        let metadata = FetchMetadata {
            title: embed.title,
            author: embed.author_name,
            thumbnail_url: embed.thumbnail_url,
            ..Default::default()
        };
        Ok((text, metadata))
    }

    async fn via_mirror(&self, mirror_url: &str, timeout: Duration) -> Result<(String, FetchMetadata)> {
        let response = self.client.get(mirror_url, timeout).await?;
        response.ensure_success()?;

        let (text, metadata) = {
            let doc = html::parse_document(&response.body);
            let text = html::extract_by_selectors(&doc, &self.spec.mirror_selectors).unwrap_or_default();
            (text, html::extract_metadata(&doc))
        };

        self.rules.accept(&text)?;
        Ok((text, metadata))
    }

    async fn via_open_graph(&self, url: &str, timeout: Duration) -> Result<(String, FetchMetadata)> {
        let response = self.client.get(url, timeout).await?;
        response.ensure_success()?;

        let (text, metadata) = {
            let doc = html::parse_document(&response.body);
            (html::open_graph_text(&doc).unwrap_or_default(), html::extract_metadata(&doc))
        };

        self.rules.accept(&text)?;
        Ok((text, metadata))
    }
}

#[async_trait]
impl FetchStrategy for PlatformFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Direct
    }

    fn stage(&self) -> StrategyStage {
        StrategyStage::Platform
    }

    fn max_requests(&self) -> u32 {
        2 + self.spec.mirrors.len() as u32
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult {
        let mut failures: Vec<String> = Vec::new();
        let mut paywall_seen = false;

        if let Some(endpoint) = &self.spec.oembed {
            match self.via_oembed(endpoint, url, timeout).await {
                Ok((text, metadata)) => {
                    info!("{} post fetched via oEmbed: {}", self.platform, url);
                    return FetchResult::succeeded(&self.name, ExtractionMethod::Direct, text, metadata);
                }
                Err(e) => {
                    warn!("{} oEmbed failed for {}: {}", self.platform, url, e);
                    paywall_seen |= matches!(e, ExtractorError::PaywallDetected);
                    failures.push(format!("oembed: {}", e));
                }
            }
        }

        if !self.spec.mirrors.is_empty() {
            match Url::parse(url) {
                Ok(parsed) => {
                    for instance in &self.spec.mirrors {
                        let mirror_url = mirror_url(instance, &parsed);
                        match self.via_mirror(&mirror_url, timeout).await {
                            Ok((text, metadata)) => {
                                info!("{} post fetched via mirror {}: {}", self.platform, instance, url);
                                return FetchResult::succeeded(&self.name, ExtractionMethod::ArchiveMirror, text, metadata)
                                    .with_archive_url(mirror_url);
                            }
                            Err(e) => {
                                warn!("{} mirror {} failed for {}: {}", self.platform, instance, url, e);
                                paywall_seen |= matches!(e, ExtractorError::PaywallDetected);
                                failures.push(format!("{}: {}", instance, e));
                            }
                        }
                    }
                }
                Err(e) => failures.push(format!("mirrors: {}", e)),
            }
        }

        match self.via_open_graph(url, timeout).await {
            Ok((text, metadata)) => {
                info!("{} post fetched via Open Graph tags: {}", self.platform, url);
                FetchResult::succeeded(&self.name, ExtractionMethod::Direct, text, metadata)
            }
            Err(e) => {
                warn!("{} Open Graph fetch failed for {}: {}", self.platform, url, e);
                paywall_seen |= matches!(e, ExtractorError::PaywallDetected);
                failures.push(format!("open_graph: {}", e));

                let e = ExtractorError::NoContentFound(format!(
                    "Could not fetch {} post ({})",
                    self.platform,
                    failures.join(", ")
                ));
                FetchResult::failed(&self.name, ExtractionMethod::Direct, &e).with_paywall_flag(paywall_seen)
            }
        }
    }
}

/// Same path and query on a front-end mirror instance.
fn mirror_url(instance: &str, url: &Url) -> String {
    let mut mirror_url = format!("{}{}", instance.trim_end_matches('/'), url.path());
    if let Some(query) = url.query() {
        mirror_url.push('?');
        mirror_url.push_str(query);
    }
    mirror_url
}
