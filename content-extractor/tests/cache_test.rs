use chrono::{Duration, Utc};
use content_extractor::cache::url_hash;
use content_extractor::{
    CacheStore, ContentCache, ExtractionMethod, ExtractorError, FetchMetadata, FetchResult, MemoryCacheStore, Result,
};
use std::sync::Arc;

const URL: &str = "https://www.theguardian.com/politics/2024/mar/05/budget";

fn article(text: &str) -> FetchResult {
    FetchResult::succeeded("direct", ExtractionMethod::Direct, text.to_string(), FetchMetadata::default())
}

#[tokio::test]
async fn test_round_trip_and_overwrite() -> Result<()> {
    let cache = ContentCache::in_memory();

    assert!(cache.get(URL).await?.is_none());

    assert!(cache.put(URL, &article("first version"), None).await?);
    let cached = cache.get(URL).await?.expect("cached result");
    assert_eq!(cached.text, "first version");
    assert!(cached.success);

    // Last write wins
    cache.put(URL, &article("second version"), None).await?;
    assert_eq!(cache.get(URL).await?.map(|r| r.text), Some("second version".to_string()));

    Ok(())
}

#[tokio::test]
async fn test_expired_entry_is_evicted_on_read() -> Result<()> {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = ContentCache::new(store.clone());
    let now = Utc::now();

    cache.put_at(URL, &article("body"), Some(Duration::hours(1)), now).await?;
    assert_eq!(store.len().await, 1);

    assert!(cache.get_at(URL, now + Duration::minutes(59)).await?.is_some());
    assert!(cache.get_at(URL, now + Duration::hours(2)).await?.is_none());
    assert_eq!(store.len().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_failures_are_not_cached() -> Result<()> {
    let cache = ContentCache::in_memory();

    let failed = FetchResult::failed("direct", ExtractionMethod::Direct, &ExtractorError::Http { status: 403 });
    assert!(!cache.put(URL, &failed, None).await?);

    let blank = FetchResult::succeeded("direct", ExtractionMethod::Direct, "   ".to_string(), FetchMetadata::default());
    assert!(!blank.success);
    assert!(!cache.put(URL, &blank, None).await?);

    assert!(cache.get(URL).await?.is_none());
    assert!(cache.put(URL, &article("body"), Some(Duration::zero())).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_purge_expired_and_key_format() -> Result<()> {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = ContentCache::new(store.clone()).with_default_ttl(Duration::hours(24));
    let long_ago = Utc::now() - Duration::days(3);

    cache.put_at("https://example.com/old", &article("old"), None, long_ago).await?;
    cache.put(URL, &article("fresh"), None).await?;

    assert_eq!(cache.purge_expired().await?, 1);
    assert_eq!(store.len().await, 1);

    let hash = url_hash(URL);
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    let entry = store.load(&hash).await?.expect("fresh entry");
    assert_eq!(entry.url, URL);
    assert!(entry.expires_at > entry.fetched_at);

    Ok(())
}
