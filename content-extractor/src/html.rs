//! HTML parsing shared by every strategy: metadata, article body, Open Graph text.

use crate::types::FetchMetadata;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

/// A container's paragraphs must add up to more than this to be taken as the article.
const CONTAINER_MIN_CHARS: usize = 200;
const FALLBACK_PARAGRAPHS: usize = 20;

const DATE_SELECTORS: &[&str] = &[
    "meta[property='article:published_time']",
    "meta[property='og:article:published_time']",
    "meta[name='date']",
    "meta[name='publish_date']",
    "meta[name='DC.date.issued']",
    "time[itemprop='datePublished']",
    "time[datetime]",
];

pub fn parse_document(body: &str) -> Html {
    Html::parse_document(body)
}

fn selector(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(selector) => Some(selector),
        Err(e) => {
            debug!("Skipping invalid selector {}: {:?}", raw, e);
            None
        }
    }
}

/// Text of an element with whitespace collapsed.
pub fn element_text(element: &ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn meta_content(doc: &Html, raw_selector: &str) -> Option<String> {
    let selector = selector(raw_selector)?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(|content| content.trim().to_string())
        .find(|content| !content.is_empty())
}

fn first_of(doc: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| meta_content(doc, raw))
}

fn paragraphs_in(element: &ElementRef, paragraph: &Selector) -> Vec<String> {
    element
        .select(paragraph)
        .map(|p| element_text(&p))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Body text from the first content container that holds enough paragraph text,
/// falling back to the first paragraphs of the whole document.
pub fn extract_article_text(doc: &Html, container_selectors: &[String]) -> String {
    let paragraph = match selector("p") {
        Some(p) => p,
        None => return String::new(),
    };

    for raw in container_selectors {
        let container_selector = match selector(raw) {
            Some(s) => s,
            None => continue,
        };

        if let Some(container) = doc.select(&container_selector).next() {
            let text = paragraphs_in(&container, &paragraph).join("\n\n");
            if text.chars().count() > CONTAINER_MIN_CHARS {
                debug!("Article body found with selector {}", raw);
                return text;
            }
        }
    }

    doc.select(&paragraph)
        .map(|p| element_text(&p))
        .filter(|text| !text.is_empty())
        .take(FALLBACK_PARAGRAPHS)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Full text of the first element matching any selector, in selector order.
pub fn extract_by_selectors(doc: &Html, selectors: &[String]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let sel = selector(raw)?;
        doc.select(&sel)
            .map(|el| element_text(&el))
            .find(|text| !text.is_empty())
    })
}

/// Post text as exposed to link previews.
pub fn open_graph_text(doc: &Html) -> Option<String> {
    first_of(
        doc,
        &[
            "meta[property='og:description']",
            "meta[name='twitter:description']",
            "meta[name='description']",
        ],
    )
}

/// Plain text of an HTML fragment such as an oEmbed `html` field.
pub fn fragment_text(fragment: &str) -> String {
    let doc = Html::parse_fragment(fragment);
    let paragraph = selector("p");

    let paragraphs: Vec<String> = match paragraph {
        Some(p) => doc.select(&p).map(|el| element_text(&el)).filter(|t| !t.is_empty()).collect(),
        None => Vec::new(),
    };

    if !paragraphs.is_empty() {
        return paragraphs.join("\n\n");
    }

    element_text(&doc.root_element())
}

pub fn extract_metadata(doc: &Html) -> FetchMetadata {
    let title = first_of(doc, &["meta[property='og:title']", "meta[name='twitter:title']"])
        .or_else(|| {
            let sel = selector("title")?;
            doc.select(&sel).next().map(|el| element_text(&el)).filter(|t| !t.is_empty())
        })
        .map(|title| clean_title(&title));

    let author = first_of(doc, &["meta[name='author']", "meta[property='article:author']"])
        .or_else(|| json_ld_author(doc))
        .or_else(|| meta_content(doc, "meta[name='twitter:creator']"));

    let description = open_graph_text(doc);

    let thumbnail_url = first_of(doc, &["meta[property='og:image']", "meta[name='twitter:image']"]);

    FetchMetadata {
        title,
        author,
        description,
        thumbnail_url,
        published_at: extract_publish_date(doc),
    }
}

/// Drop a trailing " | Publication" / " - Publication" suffix.
pub fn clean_title(title: &str) -> String {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    let suffix = SUFFIX.get_or_init(|| Regex::new(r"\s+[|–-]\s+[^|–-]+$").expect("valid title suffix pattern"));

    let trimmed = title.trim();
    let cleaned = suffix.replace(trimmed, "").trim().to_string();
    if cleaned.is_empty() {
        trimmed.to_string()
    } else {
        cleaned
    }
}

fn json_ld_author(doc: &Html) -> Option<String> {
    let sel = selector("script[type='application/ld+json']")?;
    doc.select(&sel).find_map(|script| {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => author_from_json_ld(&value),
            Err(e) => {
                debug!("Ignoring malformed JSON-LD block: {}", e);
                None
            }
        }
    })
}

fn author_from_json_ld(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(author_from_json_ld),
        Value::Object(map) => {
            if let Some(author) = map.get("author").and_then(author_name) {
                return Some(author);
            }
            map.get("@graph").and_then(author_from_json_ld)
        }
        _ => None,
    }
}

fn author_name(author: &Value) -> Option<String> {
    match author {
        Value::String(name) if !name.trim().is_empty() => Some(name.trim().to_string()),
        Value::Object(map) => map
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        Value::Array(authors) => authors.iter().find_map(author_name),
        _ => None,
    }
}

pub fn extract_publish_date(doc: &Html) -> Option<DateTime<Utc>> {
    DATE_SELECTORS.iter().find_map(|raw| {
        let sel = selector(raw)?;
        doc.select(&sel).find_map(|el| {
            let attrs = el.value();
            let raw_date = attrs
                .attr("content")
                .or_else(|| attrs.attr("datetime"))
                .map(str::to_string)
                .unwrap_or_else(|| element_text(&el));
            parse_date(&raw_date)
        })
    })
}

pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(date.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}
