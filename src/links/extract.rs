//! Outbound link extraction
//!
//! Best-effort: html5ever parses whatever it is given, so malformed markup
//! degrades to fewer (or zero) links instead of an error. No scripts are
//! executed and no redirects are followed here.

use std::collections::HashSet;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// Anchor selector; constant and known valid.
static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Extract absolute candidate URLs from a page, in document order.
///
/// Relative and protocol-relative references are resolved against
/// `base_url`; fragment-only hrefs are skipped; duplicates keep their
/// first occurrence. An unparseable base URL yields an empty result.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        debug!("Invalid base URL {base_url}, skipping extraction");
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let resolved = String::from(resolved);
        if seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://a.test/dir/page";

    #[test]
    fn test_resolves_relative_links() {
        let links = extract_links(r#"<a href="/x">x</a> <a href="y">y</a>"#, BASE);
        assert_eq!(links, vec!["http://a.test/x", "http://a.test/dir/y"]);
    }

    #[test]
    fn test_keeps_absolute_links() {
        let links = extract_links(r#"<a href="https://t.co/y">y</a>"#, BASE);
        assert_eq!(links, vec!["https://t.co/y"]);
    }

    #[test]
    fn test_resolves_protocol_relative_links() {
        let links = extract_links(r#"<a href="//cdn.test/lib.js">lib</a>"#, BASE);
        assert_eq!(links, vec!["http://cdn.test/lib.js"]);
    }

    #[test]
    fn test_skips_fragment_only_hrefs() {
        let links = extract_links(r##"<a href="#top">top</a> <a href="/real">r</a>"##, BASE);
        assert_eq!(links, vec!["http://a.test/real"]);
    }

    #[test]
    fn test_dedupes_preserving_order() {
        let html = r#"<a href="/b">b</a><a href="/a">a</a><a href="/b">b again</a>"#;
        let links = extract_links(html, BASE);
        assert_eq!(links, vec!["http://a.test/b", "http://a.test/a"]);
    }

    #[test]
    fn test_malformed_markup_degrades_gracefully() {
        let html = r#"<html><body><a href="/ok">ok<div><<p></body>"#;
        let links = extract_links(html, BASE);
        assert_eq!(links, vec!["http://a.test/ok"]);
    }

    #[test]
    fn test_not_html_yields_empty() {
        assert!(extract_links("just some text, no anchors", BASE).is_empty());
        assert!(extract_links("", BASE).is_empty());
    }

    #[test]
    fn test_invalid_base_yields_empty() {
        assert!(extract_links(r#"<a href="/x">x</a>"#, "not a url").is_empty());
    }

    #[test]
    fn test_anchors_without_href_are_ignored() {
        assert!(extract_links(r#"<a name="here">no href</a>"#, BASE).is_empty());
    }

    #[test]
    fn test_extraction_and_filter_pipeline() {
        let base = "http://a.test";
        let html = r#"<a href="/x">x</a> <a href="https://t.co/y">y</a>"#;
        let blacklist = vec!["t.co".to_string()];

        let passing: Vec<String> = extract_links(html, base)
            .into_iter()
            .filter(|c| crate::links::should_accept(c, &blacklist, base))
            .collect();

        assert_eq!(passing, vec!["http://a.test/x"]);
    }
}
