use super::{extract_page, FetchStrategy, StrategyStage};
use crate::fetcher::PageClient;
use crate::heuristics::PaywallRules;
use crate::tables::{render_template, SourceTables, WaybackSpec};
use crate::types::{ExtractionMethod, ExtractorError, FetchResult, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct Availability {
    #[serde(default)]
    archived_snapshots: Snapshots,
}

#[derive(Debug, Default, Deserialize)]
struct Snapshots {
    closest: Option<Snapshot>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    url: String,
    #[serde(default = "available_default")]
    available: bool,
}

fn available_default() -> bool {
    true
}

/// Secondary archive: asks the availability API for the closest snapshot, then
/// extracts from it.
pub struct WaybackFetcher {
    spec: WaybackSpec,
    client: Arc<dyn PageClient>,
    tables: Arc<SourceTables>,
    rules: PaywallRules,
}

impl WaybackFetcher {
    pub fn new(spec: WaybackSpec, client: Arc<dyn PageClient>, tables: Arc<SourceTables>, rules: PaywallRules) -> Self {
        Self {
            spec,
            client,
            tables,
            rules,
        }
    }

    async fn closest_snapshot(&self, url: &str, timeout: Duration) -> Result<String> {
        let check_url = render_template(&self.spec.availability_api, url);
        let response = self.client.get(&check_url, timeout).await?;
        response.ensure_success()?;

        let availability: Availability = serde_json::from_str(&response.body)?;
        match availability.archived_snapshots.closest {
            Some(snapshot) if snapshot.available && !snapshot.url.is_empty() => Ok(snapshot.url),
            _ => Err(ExtractorError::NoContentFound("No Wayback archive found".to_string())),
        }
    }
}

#[async_trait]
impl FetchStrategy for WaybackFetcher {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::ArchiveMirror
    }

    fn stage(&self) -> StrategyStage {
        StrategyStage::SecondaryArchive
    }

    fn max_requests(&self) -> u32 {
        2
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult {
        info!("Checking Wayback Machine for: {}", url);

        let archive_url = match self.closest_snapshot(url, timeout).await {
            Ok(archive_url) => archive_url,
            Err(e) => {
                if !matches!(e, ExtractorError::NoContentFound(_)) {
                    error!("Wayback error for {}: {}", url, e);
                }
                return FetchResult::failed(&self.spec.name, self.method(), &e);
            }
        };

        info!("Fetching from Wayback: {}", archive_url);
        let response = match self.client.get(&archive_url, timeout).await {
            Ok(response) => response,
            Err(e) => return FetchResult::failed(&self.spec.name, self.method(), &e),
        };
        if let Err(e) = response.ensure_success() {
            return FetchResult::failed(&self.spec.name, self.method(), &e);
        }

        let (text, metadata) = extract_page(&response.body, &self.tables.article_selectors);

        match self.rules.accept(&text) {
            Ok(()) => {
                info!("Successfully fetched via Wayback ({} chars)", text.chars().count());
                FetchResult::succeeded(&self.spec.name, self.method(), text, metadata).with_archive_url(archive_url)
            }
            Err(ExtractorError::NoContentFound(_)) => {
                let e = ExtractorError::NoContentFound("Wayback archive content too short".to_string());
                FetchResult::failed(&self.spec.name, self.method(), &e)
            }
            Err(e) => FetchResult::failed(&self.spec.name, self.method(), &e),
        }
    }
}
