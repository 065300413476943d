//! Domain, phrase, selector and mirror tables.
//!
//! The built-in tables are embedded from `config/sources.json` and parsed once.
//! Deployments can point `EXTRACTOR_SOURCES` at another file with the same shape
//! and call [`SourceTables::from_path`] to reload without rebuilding.

use crate::types::{ExtractorError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::info;

const BUILTIN_SOURCES: &str = include_str!("../config/sources.json");

/// A third-party endpoint the target URL is rewritten onto.
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorSpec {
    pub name: String,
    /// `{url}` is replaced by the raw URL, `{encoded_url}` by its percent-encoded form.
    pub template: String,
    /// Body text that means the mirror has nothing for this URL.
    #[serde(default)]
    pub body_markers: Vec<String>,
    /// Final-URL fragments (after redirects) that mean the same.
    #[serde(default)]
    pub url_markers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaybackSpec {
    pub name: String,
    pub availability_api: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformFetcherSpec {
    pub oembed: Option<String>,
    #[serde(default)]
    pub mirrors: Vec<String>,
    #[serde(default)]
    pub mirror_selectors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceTables {
    pub publications: HashMap<String, String>,
    pub platforms: HashMap<String, String>,
    pub paywalled_domains: Vec<String>,
    pub paywall_phrases: Vec<String>,
    pub article_selectors: Vec<String>,
    #[serde(default)]
    pub archive_mirrors: Vec<MirrorSpec>,
    #[serde(default)]
    pub bypass_proxies: Vec<MirrorSpec>,
    pub wayback: Option<WaybackSpec>,
    #[serde(default)]
    pub search_caches: Vec<MirrorSpec>,
    #[serde(default)]
    pub platform_fetchers: HashMap<String, PlatformFetcherSpec>,
    #[serde(default)]
    pub reply_limits: HashMap<String, usize>,
}

impl SourceTables {
    /// The tables compiled into the binary.
    pub fn builtin() -> Arc<SourceTables> {
        static BUILTIN: OnceLock<Arc<SourceTables>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| {
                let tables = Self::from_json(BUILTIN_SOURCES)
                    .unwrap_or_else(|e| panic!("embedded config/sources.json is invalid: {}", e));
                Arc::new(tables)
            })
            .clone()
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut tables: SourceTables = serde_json::from_str(raw)?;
        tables.normalize();
        tables.validate()?;
        Ok(tables)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let tables = Self::from_json(&raw)?;
        info!(
            "Loaded source tables from {} ({} publications, {} platforms, {} paywalled domains)",
            path.display(),
            tables.publications.len(),
            tables.platforms.len(),
            tables.paywalled_domains.len()
        );
        Ok(tables)
    }

    /// `EXTRACTOR_SOURCES` if set, otherwise the built-in tables.
    pub fn from_env() -> Result<Arc<SourceTables>> {
        match std::env::var("EXTRACTOR_SOURCES") {
            Ok(path) => Ok(Arc::new(Self::from_path(path)?)),
            Err(_) => Ok(Self::builtin()),
        }
    }

    pub fn platform_fetcher(&self, platform: &str) -> PlatformFetcherSpec {
        self.platform_fetchers.get(platform).cloned().unwrap_or_default()
    }

    /// Longest reply a platform accepts, falling back to the `other` entry.
    pub fn reply_char_limit(&self, platform: &str) -> usize {
        self.reply_limits
            .get(platform)
            .or_else(|| self.reply_limits.get("other"))
            .copied()
            .unwrap_or(10_000)
    }

    fn normalize(&mut self) {
        let lower_keys = |map: &mut HashMap<String, String>| {
            *map = map
                .drain()
                .map(|(domain, tag)| (normalize_domain(&domain), tag))
                .collect();
        };
        lower_keys(&mut self.publications);
        lower_keys(&mut self.platforms);

        for domain in &mut self.paywalled_domains {
            *domain = normalize_domain(domain);
        }
        for phrase in &mut self.paywall_phrases {
            *phrase = phrase.to_lowercase();
        }
    }

    fn validate(&self) -> Result<()> {
        let all_mirrors = self
            .archive_mirrors
            .iter()
            .chain(self.bypass_proxies.iter())
            .chain(self.search_caches.iter());

        for mirror in all_mirrors {
            if !mirror.template.contains("{url}") && !mirror.template.contains("{encoded_url}") {
                return Err(ExtractorError::Config(format!(
                    "mirror '{}' template has no {{url}} or {{encoded_url}} placeholder",
                    mirror.name
                )));
            }
        }

        if let Some(wayback) = &self.wayback {
            if !wayback.availability_api.contains("{encoded_url}") {
                return Err(ExtractorError::Config(format!(
                    "wayback '{}' availability_api has no {{encoded_url}} placeholder",
                    wayback.name
                )));
            }
        }

        Ok(())
    }
}

fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_lowercase();
    lower.strip_prefix("www.").map(str::to_string).unwrap_or(lower)
}

/// Substitute `{url}` / `{encoded_url}` in a mirror template.
pub fn render_template(template: &str, url: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
    template.replace("{encoded_url}", &encoded).replace("{url}", url)
}
