// src/crawl/links.rs
// =============================================================================
// Extracts the outbound links of a rendered page that stay inside the crawl.
//
// Steps:
// 1. Parse the HTML snapshot with scraper and select every <a href>
// 2. Skip anchors and special protocols (mailto:, tel:, javascript:)
// 3. Resolve relative links against the page URL
// 4. Keep http(s) links on the seed host, de-duplicated by canonical form
//
// Links are returned as resolved (fragment dropped, trailing slash kept) so
// relative links on the next page resolve against the right base. The output
// order follows document order.
// =============================================================================

use std::collections::HashSet;
use std::sync::OnceLock;

use scraper::{Html, Selector};
use url::Url;

use super::frontier::{canonicalize, CrawlScope};

fn anchor_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(e) => unreachable!("static selector is valid: {e:?}"),
    })
}

/// Returns the absolute same-host URLs linked from `html`.
pub fn extract_links(html: &str, page_url: &Url, scope: &CrawlScope) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(anchor_selector()) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(mut absolute) = resolve_link(page_url, href) else {
            continue;
        };
        let Some(canonical) = canonicalize(absolute.as_str()) else {
            continue;
        };
        if !scope.contains(&canonical) {
            continue;
        }
        if seen.insert(String::from(canonical)) {
            absolute.set_fragment(None);
            links.push(absolute);
        }
    }

    links
}

// Resolves a link (possibly relative) to an absolute URL
fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return None;
    }

    base.join(href).ok()
}
