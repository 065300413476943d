mod common;

use common::{article_page, init_tracing, paywalled_page, short_page, ScriptedClient};
use content_extractor::{
    CascadeOrchestrator, ContentCache, ContentSource, ExtractionMethod, ExtractorError, FetchConfig, FetchStrategy,
    Result, SourceTables,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const OPEN_URL: &str = "https://www.theguardian.com/politics/2024/mar/05/budget";
const PAYWALLED_URL: &str = "https://www.ft.com/content/abc-123";
const TIMEOUT: Duration = Duration::from_secs(5);

fn orchestrator(client: &Arc<ScriptedClient>) -> CascadeOrchestrator {
    CascadeOrchestrator::new(client.clone(), SourceTables::builtin(), FetchConfig::default())
}

fn plan_names(orchestrator: &CascadeOrchestrator, url: &str) -> Result<Vec<String>> {
    Ok(orchestrator.plan(url)?.iter().map(|s| s.name().to_string()).collect())
}

#[tokio::test]
async fn test_default_and_paywalled_order() -> Result<()> {
    init_tracing();
    let client = Arc::new(ScriptedClient::new());
    let orchestrator = orchestrator(&client);

    assert_eq!(
        plan_names(&orchestrator, OPEN_URL)?,
        vec!["direct", "archive_ph", "removepaywall", "12ft", "wayback", "google_cache"]
    );
    assert_eq!(
        plan_names(&orchestrator, PAYWALLED_URL)?,
        vec!["archive_ph", "direct", "removepaywall", "12ft", "wayback", "google_cache"]
    );
    assert_eq!(
        plan_names(&orchestrator, "https://x.com/someone/status/42")?,
        vec!["twitter_fetcher"]
    );

    Ok(())
}

#[tokio::test]
async fn test_paywalled_url_tries_archive_first() -> Result<()> {
    init_tracing();
    let client = Arc::new(ScriptedClient::new().page("https://archive.ph/newest/", article_page("Rates held", "A. Writer")));
    let orchestrator = orchestrator(&client);

    let result = orchestrator.run_cascade(PAYWALLED_URL, TIMEOUT).await?;

    assert!(result.success);
    assert_eq!(result.method, Some(ExtractionMethod::ArchiveMirror));
    assert_eq!(result.strategy.as_deref(), Some("archive_ph"));
    assert_eq!(result.archive_url.as_deref(), Some("https://archive.ph/newest/https://www.ft.com/content/abc-123"));
    assert_eq!(result.metadata.title.as_deref(), Some("Rates held"));
    assert!(result.error.is_none());
    assert_eq!(client.requests().len(), 1);
    assert!(client.requests()[0].starts_with("https://archive.ph/newest/"));

    Ok(())
}

#[tokio::test]
async fn test_no_results_marker_fails_and_cascade_continues() -> Result<()> {
    init_tracing();
    let client = Arc::new(
        ScriptedClient::new()
            .page("https://archive.ph/newest/", "<html><body><p>No results</p></body></html>")
            .page(PAYWALLED_URL, paywalled_page())
            .page("https://www.removepaywall.com/", article_page("Rates held", "A. Writer")),
    );
    let orchestrator = orchestrator(&client);

    let result = orchestrator.run_cascade(PAYWALLED_URL, TIMEOUT).await?;

    assert!(result.success);
    assert_eq!(result.method, Some(ExtractionMethod::BypassProxy));
    assert!(result.is_paywalled, "direct attempt saw the paywall");
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(result.attempts[0].method, "archive_ph");
    assert_eq!(result.attempts[0].error, "No archive found");
    assert_eq!(result.attempts[1].method, "direct");
    assert_eq!(result.attempts[1].error, "Paywall detected");

    Ok(())
}

#[tokio::test]
async fn test_archive_search_redirect_is_failure() -> Result<()> {
    init_tracing();
    let client = Arc::new(
        ScriptedClient::new()
            .redirect("https://archive.ph/newest/", "https://archive.ph/search/?q=ft.com", article_page("x", "y")),
    );
    let orchestrator = orchestrator(&client);

    let result = orchestrator.run_cascade(PAYWALLED_URL, TIMEOUT).await?;
    assert!(!result.success);
    assert_eq!(result.attempts[0].error, "No archive found");

    Ok(())
}

#[tokio::test]
async fn test_exhaustion_logs_each_strategy_once() -> Result<()> {
    init_tracing();
    let client = Arc::new(ScriptedClient::new());
    let orchestrator = orchestrator(&client);

    let result = orchestrator.run_cascade(OPEN_URL, TIMEOUT).await?;

    assert!(!result.success);
    assert!(result.text.is_empty());
    assert!(!result.is_paywalled);

    let methods: Vec<&str> = result.attempts.iter().map(|a| a.method.as_str()).collect();
    assert_eq!(methods, vec!["direct", "archive_ph", "removepaywall", "12ft", "wayback", "google_cache"]);
    let unique: HashSet<&str> = methods.iter().copied().collect();
    assert_eq!(unique.len(), methods.len());

    assert_eq!(result.attempts[0].error, "Page not found (404). The content may have been deleted.");
    let error = result.error.clone().unwrap_or_default();
    assert!(error.starts_with("Content extraction failed: direct: Page not found (404)"));
    assert!(matches!(result.exhaustion_error(), Some(ExtractorError::AllMethodsExhausted { .. })));

    // Exhaustion on a paywalled domain defaults the flag from the domain table.
    let paywalled = orchestrator.run_cascade(PAYWALLED_URL, TIMEOUT).await?;
    assert!(!paywalled.success);
    assert!(paywalled.is_paywalled);

    Ok(())
}

#[tokio::test]
async fn test_short_direct_page_raises_paywall_flag() -> Result<()> {
    init_tracing();
    let client = Arc::new(ScriptedClient::new().page(OPEN_URL, short_page()));
    let orchestrator = orchestrator(&client);

    let result = orchestrator.run_cascade(OPEN_URL, TIMEOUT).await?;

    assert!(!result.success);
    assert!(result.is_paywalled);
    assert!(result.attempts[0].error.starts_with("Content too short"));
    assert_eq!(result.attempts.len(), 6);

    Ok(())
}

#[tokio::test]
async fn test_timed_out_attempt_is_just_a_failure() -> Result<()> {
    init_tracing();
    let client = Arc::new(
        ScriptedClient::new()
            .hang(OPEN_URL)
            .page("https://archive.ph/newest/", article_page("Budget", "Reporter")),
    );
    let orchestrator = orchestrator(&client);

    let result = orchestrator.run_cascade(OPEN_URL, Duration::from_millis(50)).await?;

    assert!(result.success);
    assert_eq!(result.strategy.as_deref(), Some("archive_ph"));
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(result.attempts[0].error, "Request timed out");

    Ok(())
}

#[tokio::test]
async fn test_wayback_snapshot() -> Result<()> {
    init_tracing();
    let snapshot = "http://web.archive.org/web/20240305000000/https://www.theguardian.com/politics/2024/mar/05/budget";
    let client = Arc::new(
        ScriptedClient::new()
            .network_error(OPEN_URL, "Connection error")
            .page(
                "https://archive.org/wayback/available",
                format!(r#"{{"url":"x","archived_snapshots":{{"closest":{{"status":"200","available":true,"url":"{}","timestamp":"20240305000000"}}}}}}"#, snapshot),
            )
            .page("http://web.archive.org/web/", article_page("Budget", "Reporter")),
    );
    let orchestrator = orchestrator(&client);

    let result = orchestrator.run_cascade(OPEN_URL, TIMEOUT).await?;

    assert!(result.success);
    assert_eq!(result.strategy.as_deref(), Some("wayback"));
    assert_eq!(result.method, Some(ExtractionMethod::ArchiveMirror));
    assert_eq!(result.archive_url.as_deref(), Some(snapshot));
    assert_eq!(result.attempts[0].error, "Connection error");

    Ok(())
}

#[tokio::test]
async fn test_two_calls_run_one_cascade() -> Result<()> {
    init_tracing();
    let client = Arc::new(ScriptedClient::new().page(OPEN_URL, article_page("Budget", "Reporter")));
    let orchestrator = orchestrator(&client).with_cache(ContentCache::in_memory());

    let first = orchestrator.extract_with_cache(OPEN_URL, TIMEOUT).await?;
    let requests_after_first = client.request_count();
    let second = orchestrator.extract_with_cache(OPEN_URL, TIMEOUT).await?;

    assert!(first.success);
    assert_eq!(first.text, second.text);
    assert_eq!(requests_after_first, 1);
    assert_eq!(client.request_count(), requests_after_first);

    Ok(())
}

#[tokio::test]
async fn test_failures_are_retried_not_cached() -> Result<()> {
    init_tracing();
    let client = Arc::new(ScriptedClient::new());
    let orchestrator = orchestrator(&client).with_cache(ContentCache::in_memory());

    orchestrator.extract_with_cache(OPEN_URL, TIMEOUT).await?;
    let after_first = client.request_count();
    orchestrator.extract_with_cache(OPEN_URL, TIMEOUT).await?;

    assert_eq!(client.request_count(), after_first * 2);

    Ok(())
}

#[tokio::test]
async fn test_invalid_url_is_an_error_without_requests() {
    init_tracing();
    let client = Arc::new(ScriptedClient::new());
    let orchestrator = orchestrator(&client).with_cache(ContentCache::in_memory());

    let result = orchestrator.extract_with_cache("www.example.com/article", TIMEOUT).await;

    assert!(matches!(result, Err(ExtractorError::InvalidUrl(_))));
    assert_eq!(client.request_count(), 0);
}

#[tokio::test]
async fn test_platform_fetcher_sub_methods() -> Result<()> {
    init_tracing();
    let tweet = "https://x.com/someone/status/42";

    let oembed = Arc::new(ScriptedClient::new().page(
        "https://publish.twitter.com/oembed",
        r#"{"author_name":"Someone","html":"<blockquote><p>The council just voted the budget through, 31 to 12.</p>&mdash; Someone</blockquote>"}"#,
    ));
    let result = orchestrator(&oembed).run_cascade(tweet, TIMEOUT).await?;
    assert!(result.success);
    assert_eq!(result.strategy.as_deref(), Some("twitter_fetcher"));
    assert_eq!(result.metadata.author.as_deref(), Some("Someone"));
    assert_eq!(result.text, "The council just voted the budget through, 31 to 12.");

    // oEmbed down, second mirror instance answers.
    let mirrored = Arc::new(ScriptedClient::new().page(
        "https://nitter.poast.org/someone/status/42",
        r#"<html><body><div class="main-tweet"><div class="tweet-content">Budget vote tonight, watch live from 7pm.</div></div></body></html>"#,
    ));
    let result = orchestrator(&mirrored).run_cascade(tweet, TIMEOUT).await?;
    assert!(result.success);
    assert_eq!(result.method, Some(ExtractionMethod::ArchiveMirror));
    assert_eq!(result.text, "Budget vote tonight, watch live from 7pm.");
    assert_eq!(mirrored.request_count(), 3);

    // Everything down: a single failed attempt naming every sub-method.
    let nothing = Arc::new(ScriptedClient::new());
    let result = orchestrator(&nothing).run_cascade(tweet, TIMEOUT).await?;
    assert!(!result.success);
    assert_eq!(result.attempts.len(), 1);
    assert!(result.attempts[0].error.contains("oembed"));
    assert!(result.attempts[0].error.contains("open_graph"));

    Ok(())
}

#[tokio::test]
async fn test_mirror_archive_url_is_the_fetched_url() -> Result<()> {
    init_tracing();
    let tweet = "https://x.com/someone/status/42?s=20&t=abc";
    let client = Arc::new(ScriptedClient::new().page(
        "https://nitter.poast.org/someone/status/42",
        r#"<html><body><div class="main-tweet"><div class="tweet-content">Budget vote tonight, watch live from 7pm.</div></div></body></html>"#,
    ));

    let result = orchestrator(&client).run_cascade(tweet, TIMEOUT).await?;

    assert!(result.success);
    assert_eq!(result.archive_url.as_deref(), Some("https://nitter.poast.org/someone/status/42?s=20&t=abc"));
    assert!(client.requests().iter().any(|r| r == "https://nitter.poast.org/someone/status/42?s=20&t=abc"));

    Ok(())
}
