use content_extractor::tables::render_template;
use content_extractor::{classify, ExtractorError, Result, SourceTables};

#[test]
fn test_builtin_tables_load() {
    let tables = SourceTables::builtin();

    assert!(tables.publications.contains_key("theguardian.com"));
    assert!(tables.paywalled_domains.iter().any(|d| d == "ft.com"));
    assert_eq!(tables.archive_mirrors[0].name, "archive_ph");
    assert!(tables.wayback.is_some());
    assert!(tables.platform_fetcher("twitter").oembed.is_some());
    assert!(tables.platform_fetcher("myspace").mirrors.is_empty());
}

#[test]
fn test_custom_tables_are_normalized() -> Result<()> {
    let raw = r#"{
        "publications": {"WWW.Local-Paper.example": "local_paper"},
        "platforms": {},
        "paywalled_domains": ["www.Local-Paper.example"],
        "paywall_phrases": ["Readers Only"],
        "article_selectors": ["main"],
        "archive_mirrors": [{"name": "mirror", "template": "https://mirror.example/{url}"}]
    }"#;
    let tables = SourceTables::from_json(raw)?;

    let classification = classify(&tables, "https://news.local-paper.example/story")?;
    assert_eq!(classification.source, "local_paper");
    assert!(classification.likely_paywalled);
    assert_eq!(tables.paywall_phrases, vec!["readers only".to_string()]);
    assert!(tables.search_caches.is_empty());

    Ok(())
}

#[test]
fn test_template_without_placeholder_is_rejected() {
    let raw = r#"{
        "publications": {},
        "platforms": {},
        "paywalled_domains": [],
        "paywall_phrases": [],
        "article_selectors": [],
        "bypass_proxies": [{"name": "broken", "template": "https://proxy.example/"}]
    }"#;

    assert!(matches!(SourceTables::from_json(raw), Err(ExtractorError::Config(_))));
}

#[test]
fn test_render_template() {
    let url = "https://www.ft.com/content/abc?x=1&y=2";
    assert_eq!(render_template("https://archive.ph/newest/{url}", url), "https://archive.ph/newest/https://www.ft.com/content/abc?x=1&y=2");
    assert_eq!(
        render_template("https://example.org/?u={encoded_url}", url),
        "https://example.org/?u=https%3A%2F%2Fwww.ft.com%2Fcontent%2Fabc%3Fx%3D1%26y%3D2"
    );
}
