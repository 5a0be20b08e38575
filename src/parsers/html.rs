//! Main content and link extraction from rendered HTML.
//!
//! The main container is chosen in this order:
//! 1. the first semantic or content-class selector whose best match has more
//!    than `min_content_chars` of text (the longest match wins when several match;
//!    matches inside navigation or boilerplate regions never count)
//! 2. the smallest element enclosing the most paragraphs
//! 3. `<body>`
//!
//! Navigation, boilerplate and non-content elements are skipped while the
//! container's text is collected.

use crate::filter::{UrlFilter, normalize_url};
use crate::parsers::text::{char_len, collapse_whitespace, normalize};
use crate::parsers::{ExtractOptions, ParseResult};
use crate::results::PageLink;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use url::Url;

/// Containers tried for main content, highest priority first
pub const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    "#main-content",
    ".main-content",
    "#content",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-body",
    "[itemprop='articleBody']",
];

/// Elements dropped from the chosen container before its text is read
pub const EXCLUDED_ELEMENTS: &[&str] = &[
    // structure
    "nav",
    "header",
    "footer",
    "aside",
    "[role='navigation']",
    "[role='banner']",
    "[role='contentinfo']",
    ".sidebar",
    "#sidebar",
    ".menu",
    ".navigation",
    ".breadcrumb",
    ".breadcrumbs",
    // ads
    ".ad",
    ".ads",
    ".advert",
    ".advertisement",
    "[id^='ad-']",
    "[class*='sponsor']",
    // comments and social widgets
    ".comments",
    "#comments",
    ".comment",
    ".social",
    ".share",
    ".sharing",
    ".social-share",
    // non-content
    "script",
    "style",
    "noscript",
    "iframe",
    "svg",
    "template",
];

/// Elements whose content starts on its own line
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table",
    "caption", "thead", "tbody", "tfoot", "tr", "ul",
];

/// Table cells, kept on their row's line
const CELL_ELEMENTS: &[&str] = &["td", "th"];

/// Deeper subtrees are not walked
const MAX_NESTING_DEPTH: usize = 256;

static CONTENT: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTENT_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).expect("BUG: hardcoded content selector is invalid"))
        .collect()
});

static EXCLUDED: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(&EXCLUDED_ELEMENTS.join(", "))
        .expect("BUG: hardcoded exclusion selector is invalid")
});

static PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("BUG: 'p' selector is invalid"));

static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("BUG: 'body' selector is invalid"));

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("BUG: 'title' selector is invalid"));

static BASE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("base[href]").expect("BUG: 'base' selector is invalid"));

static META_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("meta[name='description']").expect("BUG: meta selector is invalid")
});

static OG_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("meta[property='og:description']").expect("BUG: og selector is invalid")
});

static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("BUG: link selector is invalid"));

/// Extracts title, description, main text and links from an HTML document
pub fn parse(
    html: &str,
    base_url: &Url,
    filter: &UrlFilter,
    options: &ExtractOptions,
) -> ParseResult {
    let doc = Html::parse_document(html);

    let content = main_container(&doc, options.min_content_chars)
        .map(container_text)
        .unwrap_or_default();

    let base = base_location(&doc, base_url);
    let links = extract_links(&doc, &base, base_url, filter, options.max_links);

    ::log::debug!(
        "Extracted {} chars and {} links from {}",
        char_len(&content),
        links.len(),
        base_url
    );

    ParseResult {
        title: extract_title(&doc),
        description: extract_description(&doc),
        content,
        links,
    }
}

/// The document's declared title, or an empty string
pub fn extract_title(doc: &Html) -> String {
    doc.select(&TITLE)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default()
}

/// Meta description, then Open Graph description, else an empty string
pub fn extract_description(doc: &Html) -> String {
    [&*META_DESCRIPTION, &*OG_DESCRIPTION]
        .into_iter()
        .flat_map(|selector| doc.select(selector))
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|content| !content.is_empty())
        .unwrap_or_default()
}

/// Picks the element holding the page's primary content
pub fn main_container(doc: &Html, min_chars: usize) -> Option<ElementRef<'_>> {
    for (selector, name) in CONTENT.iter().zip(CONTENT_SELECTORS) {
        let best = doc
            .select(selector)
            .filter(|el| !in_excluded_region(*el))
            .map(|el| (el, char_len(&container_text(el))))
            .reduce(|best, next| if next.1 > best.1 { next } else { best });

        if let Some((element, len)) = best {
            if len > min_chars {
                ::log::trace!("Main content matched '{}' ({} chars)", name, len);
                return Some(element);
            }
        }
    }

    if let Some(element) = densest_container(doc) {
        ::log::trace!("Main content chosen by paragraph density: <{}>", element.value().name());
        return Some(element);
    }

    doc.select(&BODY).next().or_else(|| Some(doc.root_element()))
}

/// The deepest element enclosing the largest number of content paragraphs
fn densest_container(doc: &Html) -> Option<ElementRef<'_>> {
    let mut counts = HashMap::new();

    for paragraph in doc.select(&PARAGRAPH) {
        if paragraph.text().all(|t| t.trim().is_empty()) || in_excluded_region(paragraph) {
            continue;
        }
        for ancestor in paragraph.ancestors().filter_map(ElementRef::wrap) {
            let entry = counts
                .entry(ancestor.id())
                .or_insert_with(|| (0usize, ancestor.ancestors().count(), ancestor));
            entry.0 += 1;
        }
    }

    // Elements sharing the top count are nested in one another, so depth is a total tiebreak
    counts
        .into_values()
        .max_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, _, element)| element)
}

fn in_excluded_region(element: ElementRef<'_>) -> bool {
    EXCLUDED.matches(&element)
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| EXCLUDED.matches(&ancestor))
}

/// Normalized text of `container`, skipping excluded descendants
pub fn container_text(container: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(container, &mut raw, 0);
    normalize(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String, depth: usize) {
    if depth > MAX_NESTING_DEPTH {
        ::log::warn!("HTML nesting deeper than {}, truncating", MAX_NESTING_DEPTH);
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if EXCLUDED.matches(&child) {
                    continue;
                }
                let name = child.value().name();
                let separator = if BLOCK_ELEMENTS.contains(&name) {
                    Some('\n')
                } else if CELL_ELEMENTS.contains(&name) {
                    Some(' ')
                } else {
                    None
                };
                out.extend(separator);
                collect_text(child, out, depth + 1);
                out.extend(separator);
            }
            _ => {}
        }
    }
}

/// Resolves `<base href>` against the page URL when present
fn base_location(doc: &Html, page_url: &Url) -> Url {
    doc.select(&BASE)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

/// Collects filtered, deduplicated, absolute links in document order
///
/// Hrefs resolve against `base`; links back to `page_url` itself are dropped.
pub fn extract_links(
    doc: &Html,
    base: &Url,
    page_url: &Url,
    filter: &UrlFilter,
    max_links: usize,
) -> Vec<PageLink> {
    let this_page = normalize_url(page_url);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in doc.select(&LINK) {
        if links.len() >= max_links {
            break;
        }

        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }

        let Ok(resolved) = base.join(href) else {
            ::log::trace!("Unresolvable href: {}", href);
            continue;
        };
        if !filter.should_crawl(&resolved) {
            ::log::trace!("URL filter rejected: {}", resolved);
            continue;
        }

        let resolved = normalize_url(&resolved);
        if resolved == this_page {
            continue;
        }

        let text = collapse_whitespace(&anchor.text().collect::<String>());
        if text.is_empty() {
            continue;
        }

        if seen.insert(resolved.to_string()) {
            links.push(PageLink {
                url: resolved.to_string(),
                text,
            });
        }
    }

    links
}
