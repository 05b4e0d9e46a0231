//! Keep/hide decisions
//!
//! Pure functions of extracted metadata and the current [`Config`]. Rule order
//! is fixed: the first matching rule supplies the reported reason.

use crate::config::{Config, ShelfCategories};
use crate::types::{Decision, HideReason, HideTarget, SectionInfo, SectionReason, VideoMetadata};

/// Sections at or below this rendered height count as empty.
pub const NEGLIGIBLE_SECTION_HEIGHT: f64 = 50.0;

/// Lexical markers identifying shelf categories by title, checked in order.
pub const CATEGORY_MARKERS: &[(ShelfCategories, &str)] = &[
    (ShelfCategories::BREAKING_NEWS, "breaking news"),
    (ShelfCategories::LATEST_POSTS, "latest posts"),
    (ShelfCategories::LATEST_VIDEOS, "latest videos from"),
    (ShelfCategories::PEOPLE_SEARCH, "people also search"),
    (ShelfCategories::EXPLORE_TOPICS, "explore"),
];

/// Decide whether one listing item stays visible.
pub fn decide(meta: &VideoMetadata, config: &Config) -> Decision {
    if config.hide_shorts && meta.is_short {
        let target = if meta.in_shorts_shelf {
            HideTarget::ShortsShelf
        } else {
            HideTarget::Item
        };
        return Decision::Hide {
            reason: HideReason::Shorts,
            target,
        };
    }

    if let Some(keyword) = matched_keyword(&meta.title_lower, &config.blocked_keywords) {
        return hide_item(HideReason::Keyword(keyword.to_string()));
    }

    if let Some(views) = meta.view_count {
        if views < config.min_views {
            return hide_item(HideReason::Views);
        }
    }

    // A zero duration is a missing badge, not a very short video.
    if let Some(secs) = meta.duration_secs.filter(|&secs| secs > 0) {
        if secs < config.min_duration {
            return hide_item(HideReason::Duration);
        }
    }

    Decision::Show
}

fn hide_item(reason: HideReason) -> Decision {
    Decision::Hide {
        reason,
        target: HideTarget::Item,
    }
}

/// First blocked keyword contained in the (lower-cased) title.
pub fn matched_keyword<'k>(title_lower: &str, keywords: &'k [String]) -> Option<&'k str> {
    keywords
        .iter()
        .find(|keyword| title_lower.contains(keyword.as_str()))
        .map(String::as_str)
}

/// Decide whether a section/shelf is hidden as a unit.
pub fn should_hide_section(section: &SectionInfo, config: &Config) -> Option<SectionReason> {
    if section.rendered_height <= NEGLIGIBLE_SECTION_HEIGHT {
        return Some(SectionReason::Collapsed);
    }

    if config.hide_shorts && section.is_shorts {
        return Some(SectionReason::Shorts);
    }

    if config.hides_shelf(ShelfCategories::ALL_SHELVES) {
        return Some(SectionReason::AllShelves);
    }

    CATEGORY_MARKERS
        .iter()
        .find(|(category, marker)| config.hides_shelf(*category) && section.title_lower.contains(marker))
        .map(|(category, _)| SectionReason::Category(*category))
}
