#![allow(dead_code)]

use async_trait::async_trait;
use content_extractor::{ExtractorError, PageClient, PageResponse, Result};
use std::sync::Mutex;
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[derive(Clone)]
enum Reply {
    Page { status: u16, final_url: Option<String>, body: String },
    Network(String),
    Hang,
}

/// `PageClient` that answers from a script instead of the network. Each request
/// is matched against the longest registered URL prefix; anything unmatched is a 404.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<Vec<(String, Reply)>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(self, prefix: &str, reply: Reply) -> Self {
        self.replies.lock().unwrap().push((prefix.to_string(), reply));
        self
    }

    pub fn page(self, prefix: &str, body: impl Into<String>) -> Self {
        self.add(
            prefix,
            Reply::Page {
                status: 200,
                final_url: None,
                body: body.into(),
            },
        )
    }

    pub fn redirect(self, prefix: &str, final_url: &str, body: impl Into<String>) -> Self {
        self.add(
            prefix,
            Reply::Page {
                status: 200,
                final_url: Some(final_url.to_string()),
                body: body.into(),
            },
        )
    }

    pub fn status(self, prefix: &str, status: u16) -> Self {
        self.add(
            prefix,
            Reply::Page {
                status,
                final_url: None,
                body: String::new(),
            },
        )
    }

    pub fn network_error(self, prefix: &str, message: &str) -> Self {
        self.add(prefix, Reply::Network(message.to_string()))
    }

    /// Never answers; the caller's timeout has to fire.
    pub fn hang(self, prefix: &str) -> Self {
        self.add(prefix, Reply::Hang)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn lookup(&self, url: &str) -> Option<Reply> {
        self.replies
            .lock()
            .unwrap()
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, reply)| reply.clone())
    }
}

#[async_trait]
impl PageClient for ScriptedClient {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<PageResponse> {
        self.requests.lock().unwrap().push(url.to_string());

        match self.lookup(url) {
            Some(Reply::Page { status, final_url, body }) => Ok(PageResponse {
                status,
                final_url: final_url.unwrap_or_else(|| url.to_string()),
                body,
            }),
            Some(Reply::Network(message)) => Err(ExtractorError::Network(message)),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ExtractorError::Network("Request timed out".to_string()))
            }
            None => Ok(PageResponse {
                status: 404,
                final_url: url.to_string(),
                body: String::new(),
            }),
        }
    }
}

/// A long, clean article page with metadata.
pub fn article_page(title: &str, author: &str) -> String {
    let paragraph = "The council approved the new transport budget after a lengthy debate about \
                     bus routes, cycle lanes and the cost of repairing the ring road.";
    let body: String = (0..6).map(|_| format!("<p>{}</p>", paragraph)).collect();
    format!(
        r#"<html><head>
<title>{title} | The Example Times</title>
<meta property="og:title" content="{title} | The Example Times">
<meta name="author" content="{author}">
<meta property="og:description" content="A summary of the budget vote.">
<meta property="article:published_time" content="2024-03-05T09:30:00Z">
</head><body><nav><p>Menu</p></nav><article>{body}</article></body></html>"#
    )
}

/// A page whose article text opens with a subscription wall.
pub fn paywalled_page() -> String {
    let teaser = "<p>Subscribe to read the full story. Already a subscriber? Sign in.</p>";
    let filler: String = (0..5)
        .map(|_| "<p>Only the first few lines of this article are visible to visitors without an account.</p>")
        .collect();
    format!("<html><body><article>{}{}</article></body></html>", teaser, filler)
}

pub fn short_page() -> String {
    "<html><body><p>Please enable JavaScript.</p></body></html>".to_string()
}
