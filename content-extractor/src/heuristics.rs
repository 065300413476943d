use crate::tables::SourceTables;
use crate::types::{ExtractorError, FetchConfig, Result};

/// Content-based paywall and sufficiency rules applied to fetched text.
#[derive(Debug, Clone)]
pub struct PaywallRules {
    phrases: Vec<String>,
    min_chars: usize,
    scan_chars: usize,
}

impl PaywallRules {
    pub fn new(phrases: Vec<String>, min_chars: usize, scan_chars: usize) -> Self {
        Self {
            phrases: phrases.into_iter().map(|p| p.to_lowercase()).collect(),
            min_chars,
            scan_chars,
        }
    }

    /// Article rules: `min_content_chars` threshold.
    pub fn for_articles(tables: &SourceTables, config: &FetchConfig) -> Self {
        Self::new(tables.paywall_phrases.clone(), config.min_content_chars, config.paywall_scan_chars)
    }

    /// Short-post rules: same phrases, `min_post_chars` threshold.
    pub fn for_posts(tables: &SourceTables, config: &FetchConfig) -> Self {
        Self::new(tables.paywall_phrases.clone(), config.min_post_chars, config.paywall_scan_chars)
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    /// True when a paywall phrase starts inside the scanned prefix.
    pub fn has_paywall_phrase(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.phrases.iter().any(|phrase| {
            lower
                .find(phrase.as_str())
                .map(|byte_pos| lower[..byte_pos].chars().count() < self.scan_chars)
                .unwrap_or(false)
        })
    }

    /// Phrase near the top, or too short to be a real article.
    pub fn is_paywalled(&self, text: &str) -> bool {
        self.has_paywall_phrase(text) || text.trim().chars().count() < self.min_chars
    }

    /// Accept text only when it is long enough and carries no paywall phrase.
    pub fn accept(&self, text: &str) -> Result<()> {
        if self.has_paywall_phrase(text) {
            return Err(ExtractorError::PaywallDetected);
        }
        let length = text.trim().chars().count();
        if length <= self.min_chars {
            return Err(ExtractorError::NoContentFound(format!(
                "Content too short ({} chars, need more than {})",
                length, self.min_chars
            )));
        }
        Ok(())
    }
}

/// [`PaywallRules::is_paywalled`] with the built-in phrase list and default thresholds.
pub fn is_paywalled(text: &str) -> bool {
    PaywallRules::for_articles(&SourceTables::builtin(), &FetchConfig::default()).is_paywalled(text)
}
