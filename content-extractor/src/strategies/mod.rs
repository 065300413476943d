pub mod direct;
pub mod mirror;
pub mod social;
pub mod wayback;

pub use direct::DirectFetcher;
pub use mirror::MirrorFetcher;
pub use social::PlatformFetcher;
pub use wayback::WaybackFetcher;

use crate::html;
use crate::types::{ExtractionMethod, FetchMetadata, FetchResult};
use async_trait::async_trait;
use std::time::Duration;

/// Position of a strategy in the default cascade. Lower runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StrategyStage {
    Platform,
    Direct,
    ArchiveMirror,
    BypassProxy,
    SecondaryArchive,
    SearchCache,
}

/// One way of retrieving content for a URL.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Unique name, used in the attempt log.
    fn name(&self) -> &str;

    fn method(&self) -> ExtractionMethod;

    fn stage(&self) -> StrategyStage;

    /// Upper bound on HTTP requests a single fetch issues.
    fn max_requests(&self) -> u32 {
        1
    }

    /// Never panics or errors; failures come back as `success == false`.
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult;
}

/// Parse a page body into (article text, metadata). Kept synchronous so the
/// parsed document never lives across an await point.
pub(crate) fn extract_page(body: &str, container_selectors: &[String]) -> (String, FetchMetadata) {
    let doc = html::parse_document(body);
    let metadata = html::extract_metadata(&doc);
    let text = html::extract_article_text(&doc, container_selectors);
    (text, metadata)
}

pub(crate) fn body_has_marker(body: &str, markers: &[String]) -> bool {
    markers.iter().any(|marker| !marker.is_empty() && body.contains(marker.as_str()))
}
