use super::{body_has_marker, extract_page, FetchStrategy, StrategyStage};
use crate::fetcher::PageClient;
use crate::heuristics::PaywallRules;
use crate::tables::{render_template, MirrorSpec, SourceTables};
use crate::types::{ExtractionMethod, ExtractorError, FetchResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Rewrites the target URL onto a third-party endpoint (archive mirror,
/// paywall-bypass proxy or search-engine cache) and extracts from its copy.
pub struct MirrorFetcher {
    spec: MirrorSpec,
    method: ExtractionMethod,
    stage: StrategyStage,
    client: Arc<dyn PageClient>,
    tables: Arc<SourceTables>,
    rules: PaywallRules,
}

impl MirrorFetcher {
    pub fn archive(spec: MirrorSpec, client: Arc<dyn PageClient>, tables: Arc<SourceTables>, rules: PaywallRules) -> Self {
        Self::new(spec, ExtractionMethod::ArchiveMirror, StrategyStage::ArchiveMirror, client, tables, rules)
    }

    pub fn bypass_proxy(spec: MirrorSpec, client: Arc<dyn PageClient>, tables: Arc<SourceTables>, rules: PaywallRules) -> Self {
        Self::new(spec, ExtractionMethod::BypassProxy, StrategyStage::BypassProxy, client, tables, rules)
    }

    pub fn search_cache(spec: MirrorSpec, client: Arc<dyn PageClient>, tables: Arc<SourceTables>, rules: PaywallRules) -> Self {
        Self::new(spec, ExtractionMethod::SearchCache, StrategyStage::SearchCache, client, tables, rules)
    }

    fn new(
        spec: MirrorSpec,
        method: ExtractionMethod,
        stage: StrategyStage,
        client: Arc<dyn PageClient>,
        tables: Arc<SourceTables>,
        rules: PaywallRules,
    ) -> Self {
        Self {
            spec,
            method,
            stage,
            client,
            tables,
            rules,
        }
    }

    fn no_copy_message(&self) -> String {
        match self.stage {
            StrategyStage::BypassProxy => format!("{} unable to bypass this paywall", self.spec.name),
            StrategyStage::SearchCache => format!("No {} copy found", self.spec.name),
            _ => "No archive found".to_string(),
        }
    }
}

#[async_trait]
impl FetchStrategy for MirrorFetcher {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn method(&self) -> ExtractionMethod {
        self.method
    }

    fn stage(&self) -> StrategyStage {
        self.stage
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult {
        let target = render_template(&self.spec.template, url);
        info!("Trying {} for: {}", self.spec.name, url);

        let response = match self.client.get(&target, timeout).await {
            Ok(response) => response,
            Err(e) => {
                error!("{} error for {}: {}", self.spec.name, url, e);
                return FetchResult::failed(&self.spec.name, self.method, &e);
            }
        };

        if let Err(e) = response.ensure_success() {
            return FetchResult::failed(&self.spec.name, self.method, &e);
        }

        let no_copy = body_has_marker(&response.body, &self.spec.body_markers)
            || self
                .spec
                .url_markers
                .iter()
                .any(|marker| !marker.is_empty() && response.final_url.contains(marker.as_str()));
        if no_copy {
            let e = ExtractorError::NoContentFound(self.no_copy_message());
            return FetchResult::failed(&self.spec.name, self.method, &e);
        }

        let (text, metadata) = extract_page(&response.body, &self.tables.article_selectors);

        match self.rules.accept(&text) {
            Ok(()) => {
                info!("Successfully fetched via {} ({} chars)", self.spec.name, text.chars().count());
                FetchResult::succeeded(&self.spec.name, self.method, text, metadata).with_archive_url(response.final_url)
            }
            Err(ExtractorError::NoContentFound(_)) => {
                let e = ExtractorError::NoContentFound(format!("{} returned insufficient content", self.spec.name));
                FetchResult::failed(&self.spec.name, self.method, &e)
            }
            Err(e) => FetchResult::failed(&self.spec.name, self.method, &e),
        }
    }
}
