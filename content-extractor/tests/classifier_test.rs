use content_extractor::classifier::{is_likely_paywalled, parse_http_url};
use content_extractor::{classify, validate_url, Result, SourceKind, SourceTables};

#[test]
fn test_publication_detection() -> Result<()> {
    let tables = SourceTables::builtin();

    let guardian = classify(&tables, "https://www.theguardian.com/politics/2024/mar/05/budget")?;
    assert_eq!(guardian.source, "guardian");
    assert_eq!(guardian.kind, SourceKind::Publication);
    assert!(!guardian.likely_paywalled);

    let ft = classify(&tables, "https://WWW.FT.com/content/abc-123")?;
    assert_eq!(ft.source, "ft");
    assert!(ft.likely_paywalled);

    // Subdomains match by suffix, lookalike hosts do not.
    let sky = classify(&tables, "https://news.sky.com/story/something")?;
    assert_eq!(sky.source, "sky_news");
    let lookalike = classify(&tables, "https://notft.com/content/abc")?;
    assert_eq!(lookalike.source, "other");
    assert!(!lookalike.likely_paywalled);

    Ok(())
}

#[test]
fn test_platform_detection() -> Result<()> {
    let tables = SourceTables::builtin();

    for (url, expected) in [
        ("https://twitter.com/someone/status/1", "twitter"),
        ("https://x.com/someone/status/1", "twitter"),
        ("https://www.youtube.com/watch?v=abc", "youtube"),
        ("https://youtu.be/abc", "youtube"),
        ("https://old.reddit.com/r/news/comments/xyz", "reddit"),
        ("https://bsky.app/profile/someone/post/1", "bluesky"),
    ] {
        let classification = classify(&tables, url)?;
        assert_eq!(classification.source, expected, "{}", url);
        assert_eq!(classification.kind, SourceKind::Social);
    }

    // Unknown host with a fediverse profile path
    let toot = classify(&tables, "https://fosstodon.org/@someone/1234")?;
    assert_eq!(toot.source, "mastodon");
    assert_eq!(toot.kind, SourceKind::Social);

    Ok(())
}

#[test]
fn test_classify_is_deterministic() -> Result<()> {
    let tables = SourceTables::builtin();
    let url = "https://www.telegraph.co.uk/news/2024/01/01/story/";

    let first = classify(&tables, url)?;
    for _ in 0..5 {
        assert_eq!(classify(&tables, url)?, first);
    }
    assert!(is_likely_paywalled(&tables, url));
    assert!(!is_likely_paywalled(&tables, "not a url"));

    Ok(())
}

#[test]
fn test_invalid_urls() {
    let tables = SourceTables::builtin();

    assert!(parse_http_url("ftp://example.com/file").is_err());
    assert!(classify(&tables, "example.com/article").is_err());

    let cases = [
        ("", "URL is required"),
        ("   ", "URL is required"),
        ("example.com/article", "URL must include http:// or https://"),
        ("ftp://example.com/file", "URL must use http or https protocol"),
    ];
    for (url, message) in cases {
        let validation = validate_url(&tables, url);
        assert!(!validation.valid, "{:?} should be invalid", url);
        assert_eq!(validation.source, "other");
        assert_eq!(validation.error.as_deref(), Some(message));
    }

    let ok = validate_url(&tables, "https://www.bbc.co.uk/news/uk-123");
    assert!(ok.valid);
    assert_eq!(ok.source, "bbc");
    assert!(ok.error.is_none());
}

#[test]
fn test_longest_suffix_wins_over_parent_domain() -> Result<()> {
    let raw = r#"{
        "publications": {"sky.com": "sky", "news.sky.com": "sky_news", "uk.news.sky.com": "sky_news_uk"},
        "platforms": {},
        "paywalled_domains": [],
        "paywall_phrases": [],
        "article_selectors": []
    }"#;
    // Each load gets a freshly seeded map, so iteration order varies between rounds.
    for _ in 0..16 {
        let tables = SourceTables::from_json(raw)?;
        assert_eq!(classify(&tables, "https://news.sky.com/story/1")?.source, "sky_news");
        assert_eq!(classify(&tables, "https://uk.news.sky.com/story/1")?.source, "sky_news_uk");
        assert_eq!(classify(&tables, "https://www.sky.com/watch")?.source, "sky");
        assert_eq!(classify(&tables, "https://sports.sky.com/live")?.source, "sky");
    }

    Ok(())
}
