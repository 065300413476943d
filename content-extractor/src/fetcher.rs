use crate::types::{ExtractorError, FetchConfig, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Raw HTTP response as seen by a strategy. Non-2xx statuses are not errors here;
/// each strategy decides what a status means for it.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: u16,
    /// URL after redirects.
    pub final_url: String,
    pub body: String,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(ExtractorError::Http { status: self.status })
        }
    }
}

/// Transport used by every strategy. Implementations must be stateless per request.
#[async_trait]
pub trait PageClient: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<PageResponse>;
}

pub struct HttpPageClient {
    client: Client,
    config: FetchConfig,
}

impl HttpPageClient {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert("DNT", HeaderValue::from_static("1"));

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(config.timeout())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| ExtractorError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn get_once(&self, url: &str, timeout: Duration) -> Result<PageResponse> {
        let mut response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let limit = self.config.max_page_bytes();

        if let Some(content_length) = response.content_length() {
            if content_length > limit as u64 {
                return Err(page_too_large(content_length as usize));
            }
        }

        // Content-Length may be absent or wrong, so the body is capped as it streams in.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(page_too_large(body.len() + chunk.len()));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(PageResponse {
            status,
            final_url,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

fn page_too_large(bytes: usize) -> ExtractorError {
    ExtractorError::NoContentFound(format!("Page too large: {:.1}MB", bytes as f64 / (1024.0 * 1024.0)))
}

#[async_trait]
impl PageClient for HttpPageClient {
    async fn get(&self, url: &str, timeout: Duration) -> Result<PageResponse> {
        let start_time = Instant::now();

        let mut backoff = ExponentialBackoff {
            current_interval: Duration::from_millis(self.config.retry_delay_ms),
            initial_interval: Duration::from_millis(self.config.retry_delay_ms),
            max_interval: Duration::from_millis(self.config.retry_delay_ms * 8),
            multiplier: 2.0,
            max_elapsed_time: Some(timeout),
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            match self.get_once(url, timeout).await {
                Ok(response) => {
                    debug!(
                        "GET {} -> {} ({} bytes, {}ms)",
                        url,
                        response.status,
                        response.body.len(),
                        start_time.elapsed().as_millis()
                    );
                    return Ok(response);
                }
                // Only transport failures are retried; HTTP statuses come back as responses.
                Err(ExtractorError::Network(message)) if attempt < self.config.max_retries => {
                    match backoff.next_backoff() {
                        Some(delay) => {
                            warn!("Attempt {} failed for {}: {}, retrying in {:?}", attempt + 1, url, message, delay);
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        None => return Err(ExtractorError::Network(message)),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
