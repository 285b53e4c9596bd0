// src/output/snapshot.rs
// =============================================================================
// Anchors an HTML snapshot to the page it came from.
//
// Snapshots are converted from disk (file://), so any reference the renderer
// could not inline (stylesheets, fonts, images, relative links) would resolve
// against the output directory. A <base href> as the first element of <head>
// points them back at the site.
//
// If the page declares its own <base>, that one is resolved against the page
// URL and used instead, because the first <base> in a document wins.
// =============================================================================

use std::sync::OnceLock;

use scraper::{Html, Selector};
use url::Url;

fn base_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| match Selector::parse("base[href]") {
        Ok(selector) => selector,
        Err(e) => unreachable!("static selector is valid: {e:?}"),
    })
}

/// Returns `html` with an absolute `<base href>` inserted at the top of `<head>`.
pub fn anchor_snapshot(html: &str, page_url: &Url) -> String {
    let base = effective_base(html, page_url);
    let tag = format!(r#"<base href="{}">"#, escape_attribute(base.as_str()));

    match head_content_start(html) {
        Some(index) => {
            let mut anchored = String::with_capacity(html.len() + tag.len());
            anchored.push_str(&html[..index]);
            anchored.push_str(&tag);
            anchored.push_str(&html[index..]);
            anchored
        }
        None => format!("{tag}{html}"),
    }
}

fn effective_base(html: &str, page_url: &Url) -> Url {
    let document = Html::parse_document(html);
    let declared = document
        .select(base_selector())
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok());

    let mut base = declared.unwrap_or_else(|| page_url.clone());
    base.set_fragment(None);
    base
}

// Byte offset just past the `<head ...>` start tag, if there is one
fn head_content_start(html: &str) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    let mut from = 0;
    while let Some(offset) = lower[from..].find("<head") {
        let start = from + offset;
        let after = start + "<head".len();
        match lower.as_bytes().get(after) {
            Some(b'>') => return Some(after + 1),
            Some(c) if c.is_ascii_whitespace() => {
                return lower[after..].find('>').map(|end| after + end + 1);
            }
            // <header>, <heading> and friends
            _ => from = after,
        }
    }
    None
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
