//! Markup extraction
//!
//! Everything here is a pure function of the HTML text and the page URL, so
//! markup changes on the vendor side are handled in this file alone.
//!
//! Item pages on the vendor site have a known defect: a promotional banner
//! ("Vihdoin arki", "Myyty tänään") is sometimes rendered inside the heading
//! that carries the title. Banner text nodes are dropped before a title
//! candidate is assembled, and candidates that still contain banner text are
//! rejected.

use crate::model::{FormatTag, ItemRecord, ItemRef, Price};
use crate::url::{canonical_item_url, item_external_id, item_ref_from_link, resolve_link};
use crate::ParseError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

const TITLE_SELECTORS: &[&str] = &[
    "h1",
    "h2",
    "[data-testid*=\"title\"]",
    ".product-title",
    ".title",
];

const PRICE_SELECTORS: &[&str] = &[
    "[data-testid*=\"price\"]",
    "[class*=\"product-price\"]",
    ".price",
    "[class*=\"price\"]",
    "h2",
];

const ORIGINAL_PRICE_SELECTORS: &[&str] = &[
    ".original-price",
    ".old-price",
    "[class*=\"original\"]",
    "del",
    "s",
];

const AVAILABILITY_SELECTORS: &[&str] = &[
    ".availability",
    ".stock-status",
    "[class*=\"availability\"]",
    "[class*=\"stock\"]",
];

const IMAGE_SELECTORS: &[&str] = &[
    ".product-image img",
    ".product-photo img",
    "[class*=\"product\"] img",
    "main img",
];

const PROMO_PHRASES: &[&str] = &["vihdoin arki", "myyty tänään"];

const SHIPPING_WORDS: &[&str] = &["toimitus", "shipping"];

const OUT_OF_STOCK_PHRASES: &[&str] = &[
    "loppu",
    "ei saatavilla",
    "ei varastossa",
    "tilapäisesti",
    "out of stock",
    "sold out",
];

const MIN_TITLE_CHARS: usize = 10;

/// Prices at or below this are badges, counters or discounts, not item prices
const MIN_PLAUSIBLE_PRICE: Price = Price::from_cents(500);

fn euro_amount_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?:\d{1,3}(?:[ \x{a0}\x{202f}]\d{3})+|\d+)(?:[.,]\d+)?\s*€").ok()
        })
        .as_ref()
}

/// Parses an item page into a record
///
/// # Arguments
///
/// * `html` - Raw page HTML
/// * `url` - Absolute URL the page was fetched from
/// * `item_path` - Path fragment that marks item URLs (for id extraction)
///
/// # Returns
///
/// * `Ok(ItemRecord)` - Record with a non-empty title; a missing price means unavailable
/// * `Err(ParseError)` - No usable title, or the URL is not an item URL
///
/// # Example
///
/// ```
/// use shelfwatch::parser::parse_item_html;
/// use url::Url;
///
/// let html = r#"<h1>Heat (Blu-ray)</h1><span class="price">14,95 €</span>"#;
/// let url = Url::parse("https://cdon.fi/tuote/heat-1a2b3c4d/").unwrap();
/// let record = parse_item_html(html, &url, "/tuote/").unwrap();
/// assert_eq!(record.title, "Heat (Blu-ray)");
/// assert_eq!(record.external_id, "1a2b3c4d");
/// ```
pub fn parse_item_html(html: &str, url: &Url, item_path: &str) -> Result<ItemRecord, ParseError> {
    let canonical = canonical_item_url(url.as_str())
        .map_err(|e| ParseError::extract(url.as_str(), e.to_string()))?;

    let document = Html::parse_document(html);

    let title = extract_title(&document)
        .ok_or_else(|| ParseError::extract(url.as_str(), "no usable title found"))?;

    let price = extract_price(&document);
    let original_price = extract_original_price(&document).filter(|original| match price {
        Some(current) => *original > current,
        None => true,
    });
    let available = price.is_some() && !shows_out_of_stock(&document);
    let image_url = extract_image_url(&document, &canonical);

    Ok(ItemRecord {
        external_id: item_external_id(&canonical, item_path),
        format: FormatTag::from_title(&title),
        title,
        url: canonical.to_string(),
        image_url,
        price,
        original_price,
        available,
    })
}

/// Collects item references from a rendered listing page
///
/// References are returned in page order without duplicates.
pub fn extract_item_refs(html: &str, page_url: &Url, item_path: &str) -> Vec<ItemRef> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    if let Ok(selector) = Selector::parse(&format!("a[href*=\"{}\"]", item_path)) {
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if let Some(item) = item_ref_from_link(page_url, href, item_path) {
                if seen.insert(item.url.clone()) {
                    refs.push(item);
                }
            }
        }
    }

    refs
}

// ===== Title =====

fn is_promotional(text: &str) -> bool {
    let lower = text.to_lowercase();
    PROMO_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Joins an element's text nodes, leaving out promotional ones
fn clean_text(element: &ElementRef<'_>) -> String {
    let kept: Vec<&str> = element
        .text()
        .filter(|node| !is_promotional(node))
        .collect();
    collapse_whitespace(&kept.join(" "))
}

/// Checks whether a candidate string can be an item title
pub fn is_valid_title(candidate: &str) -> bool {
    let title = candidate.trim();

    if title.chars().count() < MIN_TITLE_CHARS {
        return false;
    }

    if is_promotional(title) || title.contains('€') || title.ends_with('%') {
        return false;
    }

    let lower = title.to_lowercase();
    if lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == "osta")
    {
        return false;
    }

    let numeric = title
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || c == '.' || c == ',');
    !numeric
}

fn extract_title(document: &Html) -> Option<String> {
    for css in TITLE_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        for element in document.select(&selector) {
            let candidate = clean_text(&element);
            if is_valid_title(&candidate) {
                return Some(candidate);
            }
        }
    }

    let selector = Selector::parse("title").ok()?;
    let head_title = document.select(&selector).next()?;
    let full = clean_text(&head_title);
    let candidate = full.split(" | ").next().unwrap_or("").trim().to_string();

    if is_valid_title(&candidate) {
        Some(candidate)
    } else {
        None
    }
}

// ===== Price =====

fn mentions_shipping(text: &str) -> bool {
    let lower = text.to_lowercase();
    SHIPPING_WORDS.iter().any(|word| lower.contains(word))
}

/// True for elements that show a struck-through former price
fn is_former_price(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    if matches!(value.name(), "del" | "s") {
        return true;
    }
    value
        .attr("class")
        .map(|class| {
            let class = class.to_lowercase();
            class.contains("original") || class.contains("old")
        })
        .unwrap_or(false)
}

fn plausible(price: Price) -> Option<Price> {
    if price > MIN_PLAUSIBLE_PRICE {
        Some(price)
    } else {
        None
    }
}

fn extract_price(document: &Html) -> Option<Price> {
    for css in PRICE_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        for element in document.select(&selector) {
            if is_former_price(&element) {
                continue;
            }
            let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
            if mentions_shipping(&text) {
                continue;
            }
            let amount = euro_amount_pattern().and_then(|pattern| pattern.find(&text));
            if let Some(price) = amount
                .and_then(|found| Price::parse(found.as_str()))
                .and_then(plausible)
            {
                return Some(price);
            }
        }
    }

    fallback_price(document)
}

/// Scans every text node for an amount written with a euro sign
fn fallback_price(document: &Html) -> Option<Price> {
    let pattern = euro_amount_pattern()?;
    for node in document.root_element().text() {
        if mentions_shipping(node) {
            continue;
        }
        for found in pattern.find_iter(node) {
            if let Some(price) = Price::parse(found.as_str()).and_then(plausible) {
                return Some(price);
            }
        }
    }
    None
}

fn extract_original_price(document: &Html) -> Option<Price> {
    for css in ORIGINAL_PRICE_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = element.text().collect::<String>();
            if let Some(price) = Price::parse(&text).and_then(plausible) {
                return Some(price);
            }
        }
    }
    None
}

// ===== Availability =====

fn shows_out_of_stock(document: &Html) -> bool {
    for css in AVAILABILITY_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<String>().to_lowercase();
            return OUT_OF_STOCK_PHRASES
                .iter()
                .any(|phrase| text.contains(phrase));
        }
    }
    false
}

// ===== Image =====

fn extract_image_url(document: &Html, page_url: &Url) -> Option<String> {
    for css in IMAGE_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        for element in document.select(&selector) {
            let value = element.value();
            let src = value
                .attr("src")
                .filter(|s| !s.trim().is_empty() && !s.starts_with("data:"))
                .or_else(|| value.attr("data-src"));
            if let Some(resolved) = src.and_then(|s| resolve_link(page_url, s)) {
                return Some(resolved.to_string());
            }
        }
    }
    None
}
