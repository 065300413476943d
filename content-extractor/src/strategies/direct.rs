use super::{extract_page, FetchStrategy, StrategyStage};
use crate::classifier;
use crate::fetcher::PageClient;
use crate::heuristics::PaywallRules;
use crate::tables::SourceTables;
use crate::types::{ExtractionMethod, ExtractorError, FetchResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Plain GET of the article URL with browser-like headers.
pub struct DirectFetcher {
    client: Arc<dyn PageClient>,
    tables: Arc<SourceTables>,
    rules: PaywallRules,
}

impl DirectFetcher {
    pub const NAME: &'static str = "direct";

    pub fn new(client: Arc<dyn PageClient>, tables: Arc<SourceTables>, rules: PaywallRules) -> Self {
        Self { client, tables, rules }
    }
}

#[async_trait]
impl FetchStrategy for DirectFetcher {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Direct
    }

    fn stage(&self) -> StrategyStage {
        StrategyStage::Direct
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult {
        info!("Fetching directly: {}", url);

        let response = match self.client.get(url, timeout).await {
            Ok(response) => response,
            Err(e) => {
                error!("Direct fetch error for {}: {}", url, e);
                return FetchResult::failed(Self::NAME, self.method(), &e);
            }
        };

        if let Err(e) = response.ensure_success() {
            return FetchResult::failed(Self::NAME, self.method(), &e);
        }

        let (text, metadata) = extract_page(&response.body, &self.tables.article_selectors);

        if text.trim().is_empty() {
            let e = ExtractorError::NoContentFound("Could not extract article content".to_string());
            return FetchResult::failed(Self::NAME, self.method(), &e)
                .with_paywall_flag(classifier::is_likely_paywalled(&self.tables, url));
        }

        match self.rules.accept(&text) {
            Ok(()) => {
                info!("Successfully fetched directly ({} chars): {}", text.chars().count(), url);
                FetchResult::succeeded(Self::NAME, self.method(), text, metadata)
            }
            Err(e) => {
                info!("Paywall detected in direct fetch: {} ({})", url, e);
                // Short text counts as a paywall signal on the origin site.
                FetchResult::failed(Self::NAME, self.method(), &e)
                    .with_metadata(metadata)
                    .with_paywall_flag(self.rules.is_paywalled(&text))
            }
        }
    }
}
