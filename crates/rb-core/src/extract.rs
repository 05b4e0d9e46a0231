//! Heuristic metadata extraction
//!
//! Every lookup is an ordered fallback chain stored as data and tried in
//! sequence until one strategy yields text. Nothing here fails: a missing or
//! unparseable value comes back as `None`.

use std::sync::OnceLock;

use crate::dom::{query_first, PageNode};
use crate::selector::{builtin, compile_table, Selector};
use crate::types::{SectionInfo, VideoMetadata};

// =============================================================================
// Strategy tables
// =============================================================================

/// Where a view count may be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSource {
    /// A string inside the element's renderer data object
    RendererData(&'static [&'static str]),
    /// Text of the first descendant matching the selector whose text
    /// mentions views
    Selector(&'static str),
}

pub const VIEW_COUNT_SOURCES: &[ViewSource] = &[
    ViewSource::RendererData(&["viewCountText", "simpleText"]),
    ViewSource::RendererData(&["shortViewCountText", "simpleText"]),
    ViewSource::Selector(".yt-content-metadata-view-model__metadata-text"),
    ViewSource::Selector("span.inline-metadata-item"),
    ViewSource::Selector("#metadata-line span"),
    ViewSource::Selector(".shortsLockupViewModelHostMetadataSubhead span"),
];

pub const DURATION_SELECTORS: &[&str] = &[
    ".yt-badge-shape__text",
    "ytd-thumbnail-overlay-time-status-renderer span",
];

pub const TITLE_SELECTORS: &[&str] = &["#video-title", "a#video-title-link", "[title]", "h3 a"];

pub const SHORTS_SHELF_SELECTOR: &str = "ytd-rich-shelf-renderer[is-shorts]";
pub const SHORTS_OVERLAY_SELECTOR: &str =
    "ytd-thumbnail-overlay-time-status-renderer[overlay-style=\"SHORTS\"]";
pub const SHORTS_LINK_SELECTOR: &str = "[href*=\"/shorts/\"]";

pub const SECTION_TITLE_SELECTORS: &[&str] = &["#title-text", ".ytd-rich-shelf-renderer #title", "[id=\"title\"]"];
pub const SECTION_SHORTS_SELECTORS: &[&str] = &["[is-shorts]", "a[href*=\"/shorts/\"]"];

/// Duration badge text for live streams.
const LIVE_BADGE: &str = "LIVE";

struct Compiled {
    view_selectors: Vec<Option<Selector>>,
    duration: Vec<Selector>,
    title: Vec<Selector>,
    shorts_shelf: Selector,
    shorts_markers: Vec<Selector>,
    section_title: Vec<Selector>,
    section_shorts: Vec<Selector>,
}

fn compiled() -> &'static Compiled {
    static COMPILED: OnceLock<Compiled> = OnceLock::new();
    COMPILED.get_or_init(|| {
        let view_selectors = VIEW_COUNT_SOURCES
            .iter()
            .map(|source| match source {
                ViewSource::RendererData(_) => None,
                ViewSource::Selector(s) => Some(builtin(s)),
            })
            .collect();
        Compiled {
            view_selectors,
            duration: compile_table(DURATION_SELECTORS),
            title: compile_table(TITLE_SELECTORS),
            shorts_shelf: builtin(SHORTS_SHELF_SELECTOR),
            shorts_markers: compile_table(&[SHORTS_OVERLAY_SELECTOR, SHORTS_LINK_SELECTOR]),
            section_title: compile_table(SECTION_TITLE_SELECTORS),
            section_shorts: compile_table(SECTION_SHORTS_SELECTORS),
        }
    })
}

/// Selector for the shelf whose items are all shorts.
pub fn shorts_shelf_selector() -> &'static Selector {
    &compiled().shorts_shelf
}

// =============================================================================
// Item extraction
// =============================================================================

/// Extract everything the decision rules need from one listing item.
pub fn extract<N: PageNode>(item: &N) -> VideoMetadata {
    let in_shorts_shelf = item.closest(shorts_shelf_selector()).is_some();
    VideoMetadata {
        view_count: view_count(item),
        duration_secs: duration(item),
        title_lower: title(item),
        is_short: in_shorts_shelf || is_short_item(item),
        in_shorts_shelf,
    }
}

pub fn view_count<N: PageNode>(item: &N) -> Option<u64> {
    view_count_text(item).and_then(|text| parse_view_count(&text))
}

/// The first text any view-count strategy yields.
fn view_count_text<N: PageNode>(item: &N) -> Option<String> {
    let compiled = compiled();
    VIEW_COUNT_SOURCES
        .iter()
        .zip(&compiled.view_selectors)
        .find_map(|(source, selector)| match (source, selector) {
            (ViewSource::RendererData(path), _) => item.renderer_text(path),
            (ViewSource::Selector(_), Some(selector)) => item
                .query_all(selector)
                .into_iter()
                .map(|el| el.text_content())
                .find(|text| mentions_views(text)),
            (ViewSource::Selector(_), None) => None,
        })
}

fn mentions_views(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("views") || lower.contains("watching")
}

pub fn duration<N: PageNode>(item: &N) -> Option<u32> {
    let badge = query_first(item, &compiled().duration)?;
    parse_duration(&badge.text_content())
}

pub fn title<N: PageNode>(item: &N) -> String {
    let Some(el) = query_first(item, &compiled().title) else {
        return String::new();
    };
    let text = el.text_content();
    let text = if text.is_empty() {
        el.attribute("title").unwrap_or_default()
    } else {
        text
    };
    text.to_lowercase()
}

fn is_short_item<N: PageNode>(item: &N) -> bool {
    compiled()
        .shorts_markers
        .iter()
        .any(|marker| item.query(marker).is_some())
}

// =============================================================================
// Section extraction
// =============================================================================

pub fn extract_section<N: PageNode>(section: &N) -> SectionInfo {
    let compiled = compiled();
    let title_lower = query_first(section, &compiled.section_title)
        .map(|el| el.text_content().to_lowercase().trim().to_string())
        .unwrap_or_default();
    let is_shorts = compiled
        .section_shorts
        .iter()
        .any(|marker| section.query(marker).is_some());

    SectionInfo {
        title_lower,
        is_shorts,
        rendered_height: section.rendered_height(),
    }
}

// =============================================================================
// Text parsers
// =============================================================================

/// Parse view-count text such as `"12.3K views"` or `"1,234 watching"`.
///
/// The first run of digits, commas and dots is the number; a `K`, `M` or `B`
/// suffix (any case, optional whitespace before it) scales it. The result is
/// floored.
pub fn parse_view_count(text: &str) -> Option<u64> {
    let start = text.find(|c: char| c.is_ascii_digit() || c == ',' || c == '.')?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == '.'))
        .unwrap_or(rest.len());
    let digits: String = rest[..end].chars().filter(|&c| c != ',').collect();
    let number = parse_decimal_prefix(&digits)?;

    let multiplier = match rest[end..].trim_start().chars().next() {
        Some('k' | 'K') => 1_000.0,
        Some('m' | 'M') => 1_000_000.0,
        Some('b' | 'B') => 1_000_000_000.0,
        _ => 1.0,
    };

    Some((number * multiplier).floor() as u64)
}

/// Longest leading `digits[.digits]` prefix as a float.
fn parse_decimal_prefix(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let int_digits = end;
    let mut frac_digits = 0;
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac_end = end + 1;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        frac_digits = frac_end - end - 1;
        if frac_digits > 0 {
            end = frac_end;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }
    s[..end].parse().ok()
}

/// Parse a duration badge: `m:ss` or `h:mm:ss`. `LIVE` and anything
/// malformed are unknown.
pub fn parse_duration(text: &str) -> Option<u32> {
    let text = text.trim();
    if text == LIVE_BADGE {
        return None;
    }

    let parts: Vec<u32> = text
        .split(':')
        .map(|part| part.trim().parse::<u32>().ok())
        .collect::<Option<_>>()?;

    match parts.as_slice() {
        [minutes, seconds] => minutes.checked_mul(60)?.checked_add(*seconds),
        [hours, minutes, seconds] => hours
            .checked_mul(3600)?
            .checked_add(minutes.checked_mul(60)?)?
            .checked_add(*seconds),
        _ => None,
    }
}
