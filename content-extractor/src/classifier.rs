use crate::tables::SourceTables;
use crate::types::{ExtractorError, Result};
use serde::Serialize;
use std::collections::HashMap;
use url::Url;

pub const OTHER: &str = "other";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Short-post or video network, served by a platform fetcher.
    Social,
    /// Known news publication.
    Publication,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Platform or publication tag, `other` when unmatched.
    pub source: String,
    pub kind: SourceKind,
    pub likely_paywalled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlValidation {
    pub valid: bool,
    pub source: String,
    pub error: Option<String>,
}

/// Parse `raw` and require an absolute http(s) URL with a host.
pub fn parse_http_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ExtractorError::InvalidUrl("URL is required".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase => {
            ExtractorError::InvalidUrl("URL must include http:// or https://".to_string())
        }
        other => ExtractorError::InvalidUrl(other.to_string()),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ExtractorError::InvalidUrl("URL must use http or https protocol".to_string()));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(ExtractorError::InvalidUrl("Invalid URL format".to_string())),
    }
}

/// Map a URL to its platform/publication tag and whether its domain is known to paywall.
pub fn classify(tables: &SourceTables, raw_url: &str) -> Result<Classification> {
    let url = parse_http_url(raw_url)?;
    let host = normalized_host(&url);

    let platform = longest_suffix_match(&host, &tables.platforms);
    let publication = longest_suffix_match(&host, &tables.publications);
    let likely_paywalled = tables
        .paywalled_domains
        .iter()
        .any(|domain| domain_matches(&host, domain));

    let (source, kind) = match (platform, publication) {
        (Some(platform), _) => (platform.to_string(), SourceKind::Social),
        (None, Some(publication)) => (publication.to_string(), SourceKind::Publication),
        (None, None) if looks_like_fediverse(&url) => ("mastodon".to_string(), SourceKind::Social),
        (None, None) => (OTHER.to_string(), SourceKind::Other),
    };

    Ok(Classification {
        source,
        kind,
        likely_paywalled,
    })
}

pub fn is_likely_paywalled(tables: &SourceTables, raw_url: &str) -> bool {
    classify(tables, raw_url)
        .map(|classification| classification.likely_paywalled)
        .unwrap_or(false)
}

pub fn validate_url(tables: &SourceTables, raw_url: &str) -> UrlValidation {
    match classify(tables, raw_url) {
        Ok(classification) => UrlValidation {
            valid: true,
            source: classification.source,
            error: None,
        },
        Err(ExtractorError::InvalidUrl(reason)) => UrlValidation {
            valid: false,
            source: OTHER.to_string(),
            error: Some(reason),
        },
        Err(e) => UrlValidation {
            valid: false,
            source: OTHER.to_string(),
            error: Some(e.to_string()),
        },
    }
}

fn normalized_host(url: &Url) -> String {
    let host = url.host_str().unwrap_or("").trim_end_matches('.').to_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

fn longest_suffix_match<'a>(host: &str, table: &'a HashMap<String, String>) -> Option<&'a str> {
    table
        .iter()
        .filter(|(domain, _)| domain_matches(host, domain))
        .max_by_key(|(domain, _)| domain.len())
        .map(|(_, tag)| tag.as_str())
}

// Mastodon instances live on arbitrary domains but share profile/status paths.
fn looks_like_fediverse(url: &Url) -> bool {
    let path = url.path();
    path.starts_with("/@") || path.starts_with("/users/")
}
