//! Best-effort extraction of listings from a raw search results page.
//!
//! Nothing here is guaranteed to keep working: the page is third-party markup
//! that changes without notice. Two strategies are combined. Embedded JSON
//! state is matched with regexes, then rendered listing cards are read with
//! CSS selectors to fill in price and image.

use crate::models::Listing;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use tracing::debug;

pub const LISTING_BASE_URL: &str = "https://www.airbnb.com/rooms";

/// Tokens from experiment/feature-flag payloads that look like listing names.
const IGNORED_NAMES: [&str; 4] = ["treatment", "control", "flags", "roles"];

const CURRENCY_MARKERS: [&str; 6] = ["kr", "$", "€", "£", "DKK", "EUR"];

lazy_static! {
    static ref EMBEDDED_PATTERNS: Vec<(&'static str, Regex)> = vec![
        (
            "listing",
            Regex::new(r#""listing":\{"id":"(\d+)".*?"name":"((?:[^"\\]|\\.)+)""#).expect("valid regex"),
        ),
        (
            "room",
            Regex::new(r#""room":\{"id":"(\d+)".*?"name":"((?:[^"\\]|\\.)+)""#).expect("valid regex"),
        ),
        (
            "titled",
            Regex::new(r#""id":"(\d+)".*?"title":"((?:[^"\\]|\\.)+)".*?"roomType""#).expect("valid regex"),
        ),
    ];
    static ref TEST_ID_PATTERN: Regex =
        Regex::new(r#"data-testid="listing-(\d+)""#).expect("valid regex");
    static ref ROOM_LINK_PATTERN: Regex = Regex::new(r"/rooms/(\d+)").expect("valid regex");
}

/// Placeholder behaviour when extraction finds suspiciously few listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    /// Below this many extracted listings, placeholders are appended. 0 disables.
    pub threshold: usize,
    pub limit: usize,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            threshold: 3,
            limit: 10,
        }
    }
}

impl FallbackPolicy {
    pub fn disabled() -> Self {
        Self {
            threshold: 0,
            limit: 0,
        }
    }
}

pub fn listing_url(id: &str) -> String {
    format!("{}/{}", LISTING_BASE_URL, id)
}

/// Extract every listing the page seems to contain, deduplicated by id.
pub fn extract_listings(html: &str, fallback: FallbackPolicy) -> Vec<Listing> {
    let mut listings = extract_embedded_listings(html);
    merge_cards(&mut listings, extract_card_listings(html));

    if fallback.threshold > 0 && listings.len() < fallback.threshold {
        debug!(
            found = listings.len(),
            threshold = fallback.threshold,
            "few listings extracted, trying listing markers"
        );
        for id in extract_marker_ids(html).into_iter().take(fallback.limit) {
            if !listings.iter().any(|l| l.id == id) {
                let url = listing_url(&id);
                listings.push(Listing::new(id, None, url));
            }
        }
    }

    listings
}

/// Listings found in JSON state embedded in the page.
pub fn extract_embedded_listings(html: &str) -> Vec<Listing> {
    let mut listings: Vec<Listing> = Vec::new();

    for (label, pattern) in EMBEDDED_PATTERNS.iter() {
        let mut matched = 0;
        for captures in pattern.captures_iter(html) {
            let (Some(id), Some(raw_name)) = (captures.get(1), captures.get(2)) else {
                continue;
            };
            let id = id.as_str();
            let name = unescape_json_string(raw_name.as_str());

            if !looks_like_listing(id, &name) {
                continue;
            }
            matched += 1;
            if !listings.iter().any(|l| l.id == id) {
                listings.push(Listing::new(id, Some(name), listing_url(id)));
            }
        }
        debug!(pattern = label, matched, "embedded pattern");
    }

    listings
}

/// Listings read from rendered cards, with price and image when present.
pub fn extract_card_listings(html: &str) -> Vec<Listing> {
    let document = Html::parse_document(html);
    let mut listings: Vec<Listing> = Vec::new();

    let card_selectors = [
        "[data-testid='card-container']",
        "[itemprop='itemListElement']",
    ];

    for selector_str in &card_selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for card in document.select(&selector) {
            let Some(id) = card_listing_id(&card) else {
                continue;
            };
            if listings.iter().any(|l| l.id == id) {
                continue;
            }
            let url = listing_url(&id);
            let listing = Listing::new(id, card_title(&card), url)
                .with_price(card_price(&card))
                .with_image(card_image(&card));
            listings.push(listing);
        }
    }

    debug!(count = listings.len(), "card listings");
    listings
}

/// Ids from `data-testid="listing-<id>"` markers, in page order, without repeats.
pub fn extract_marker_ids(html: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for captures in TEST_ID_PATTERN.captures_iter(html) {
        if let Some(id) = captures.get(1) {
            let id = id.as_str().to_string();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

fn looks_like_listing(id: &str, name: &str) -> bool {
    id.len() > 6
        && name.chars().count() > 3
        && !name.starts_with('*')
        && !IGNORED_NAMES.contains(&name)
}

fn unescape_json_string(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

fn merge_cards(listings: &mut Vec<Listing>, cards: Vec<Listing>) {
    let positions: HashMap<String, usize> = listings
        .iter()
        .enumerate()
        .map(|(i, l)| (l.id.clone(), i))
        .collect();

    for card in cards {
        match positions.get(&card.id) {
            Some(&i) => {
                let existing = &mut listings[i];
                if existing.price.is_none() {
                    existing.price = card.price;
                }
                if existing.image_url.is_none() {
                    existing.image_url = card.image_url;
                }
            }
            None => {
                if !listings.iter().any(|l| l.id == card.id) {
                    listings.push(card);
                }
            }
        }
    }
}

fn card_listing_id(card: &ElementRef) -> Option<String> {
    let link_selector = Selector::parse("a[href*='/rooms/']").ok()?;
    card.select(&link_selector)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| ROOM_LINK_PATTERN.captures(href))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn card_title(card: &ElementRef) -> Option<String> {
    let title_selectors = [
        "[data-testid='listing-card-title']",
        "[data-testid='listing-card-name']",
        "[id^='title_']",
    ];

    for selector_str in &title_selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = card.select(&selector).next() {
                let text = collapse_text(element);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }

    let meta_selector = Selector::parse("meta[itemprop='name']").ok()?;
    card.select(&meta_selector)
        .filter_map(|m| m.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

fn card_price(card: &ElementRef) -> Option<String> {
    let price_selectors = [
        "[data-testid='price-availability']",
        "[data-testid='price-availability-row'] span",
        "span[data-testid='price']",
        "[class*='price']",
    ];

    for selector_str in &price_selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in card.select(&selector) {
                let text = collapse_text(element);
                if CURRENCY_MARKERS.iter().any(|c| text.contains(c)) {
                    return Some(text);
                }
            }
        }
    }

    None
}

fn card_image(card: &ElementRef) -> Option<String> {
    let image_selectors = ["img[data-testid='listing-card-image']", "picture img", "img"];

    for selector_str in &image_selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in card.select(&selector) {
                if let Some(src) = element.value().attr("src") {
                    if src.starts_with("http") {
                        return Some(src.to_string());
                    }
                }
            }
        }
    }

    None
}

fn collapse_text(element: ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// What a fetched page looks like, for troubleshooting extraction.
#[derive(Debug, Clone)]
pub struct PageDiagnostics {
    pub size: usize,
    pub pattern_counts: Vec<(&'static str, usize)>,
    pub marker_count: usize,
    pub card_count: usize,
    pub looks_blocked: bool,
    pub has_initial_state: bool,
    pub error_markers: Vec<&'static str>,
}

impl PageDiagnostics {
    pub fn inspect(html: &str) -> Self {
        let lower = html.to_lowercase();
        let pattern_counts = EMBEDDED_PATTERNS
            .iter()
            .map(|(label, pattern)| (*label, pattern.captures_iter(html).count()))
            .collect();
        let error_markers = ["access denied", "something went wrong", "page not found", "blocked"]
            .into_iter()
            .filter(|m| lower.contains(m))
            .collect();

        Self {
            size: html.len(),
            pattern_counts,
            marker_count: extract_marker_ids(html).len(),
            card_count: extract_card_listings(html).len(),
            looks_blocked: lower.contains("blocked") || lower.contains("captcha"),
            has_initial_state: html.contains("window.__INITIAL_STATE__")
                || html.contains("data-deferred-state"),
            error_markers,
        }
    }
}
