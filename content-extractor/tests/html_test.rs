mod common;

use chrono::{TimeZone, Utc};
use content_extractor::html::{self, clean_title, parse_date};
use content_extractor::SourceTables;

#[test]
fn test_metadata_priority() {
    let page = common::article_page("Budget passes after late vote", "Jane Reporter");
    let doc = html::parse_document(&page);
    let metadata = html::extract_metadata(&doc);

    assert_eq!(metadata.title.as_deref(), Some("Budget passes after late vote"));
    assert_eq!(metadata.author.as_deref(), Some("Jane Reporter"));
    assert_eq!(metadata.description.as_deref(), Some("A summary of the budget vote."));
    assert_eq!(metadata.published_at, Some(Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap()));
}

#[test]
fn test_json_ld_author_fallback() {
    let page = r#"<html><head>
<script type="application/ld+json">{"@context":"https://schema.org","@graph":[{"@type":"WebPage"},{"@type":"NewsArticle","author":[{"@type":"Person","name":"Sam Writer"}]}]}</script>
<meta name="description" content="Plain description">
</head><body></body></html>"#;
    let doc = html::parse_document(page);
    let metadata = html::extract_metadata(&doc);

    assert_eq!(metadata.author.as_deref(), Some("Sam Writer"));
    assert_eq!(metadata.description.as_deref(), Some("Plain description"));
    assert!(metadata.title.is_none());
}

#[test]
fn test_article_container_and_fallback() {
    let tables = SourceTables::builtin();

    let page = common::article_page("Title", "Author");
    let doc = html::parse_document(&page);
    let text = html::extract_article_text(&doc, &tables.article_selectors);
    assert!(text.starts_with("The council approved"));
    assert!(!text.contains("Menu"));
    assert_eq!(text.matches("\n\n").count(), 5);

    // No container: first paragraphs of the whole document, capped at 20.
    let loose: String = (0..30).map(|i| format!("<p>Paragraph {}</p>", i)).collect();
    let doc = html::parse_document(&format!("<html><body><div>{}</div></body></html>", loose));
    let text = html::extract_article_text(&doc, &tables.article_selectors);
    assert!(text.starts_with("Paragraph 0"));
    assert!(text.ends_with("Paragraph 19"));
}

#[test]
fn test_title_cleanup() {
    assert_eq!(clean_title("Budget passes | The Guardian"), "Budget passes");
    assert_eq!(clean_title("Budget passes - BBC News"), "Budget passes");
    assert_eq!(clean_title("Budget passes – Financial Times"), "Budget passes");
    assert_eq!(clean_title("Budget passes"), "Budget passes");
}

#[test]
fn test_date_formats() {
    let expected = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
    assert_eq!(parse_date("2024-03-05"), Some(expected));
    assert_eq!(parse_date("2024-03-05T00:00:00"), Some(expected));
    assert_eq!(parse_date("2024-03-05T01:00:00+01:00"), Some(expected));
    assert_eq!(parse_date("Tue, 05 Mar 2024 00:00:00 +0000"), Some(expected));
    assert_eq!(parse_date("last Tuesday"), None);
}

#[test]
fn test_open_graph_and_fragments() {
    let page = r#"<html><head><meta name="twitter:description" content="Post body from the card"></head></html>"#;
    let doc = html::parse_document(page);
    assert_eq!(html::open_graph_text(&doc).as_deref(), Some("Post body from the card"));

    let fragment = r#"<blockquote class="twitter-tweet"><p lang="en">Council votes through the budget</p>&mdash; Someone</blockquote>"#;
    assert_eq!(html::fragment_text(fragment), "Council votes through the budget");
}
