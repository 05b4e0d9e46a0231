//! Core type definitions for RotBlock
//!
//! These are the values passed between the extractor, the decision rules and
//! the visibility controller.

use crate::config::ShelfCategories;

// =============================================================================
// Item metadata
// =============================================================================

/// Heuristically extracted facts about one listing item.
///
/// `None` means the fact could not be found or parsed; the decision rules
/// never hide on an unknown value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub view_count: Option<u64>,
    pub duration_secs: Option<u32>,
    /// Lower-cased title, empty when absent.
    pub title_lower: String,
    pub is_short: bool,
    /// Item sits inside a shelf flagged as shorts-only.
    pub in_shorts_shelf: bool,
}

// =============================================================================
// Item decisions
// =============================================================================

/// Why an item was hidden. Reported for the first rule that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HideReason {
    Shorts,
    /// Title contained this blocked keyword.
    Keyword(String),
    Views,
    Duration,
}

/// Which node the hide applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideTarget {
    /// The listing item itself
    Item,
    /// The all-shorts shelf enclosing the item
    ShortsShelf,
}

/// Keep/hide outcome for one listing item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Show,
    Hide { reason: HideReason, target: HideTarget },
}

impl Decision {
    pub fn is_hidden(&self) -> bool {
        matches!(self, Decision::Hide { .. })
    }

    pub fn reason(&self) -> Option<&HideReason> {
        match self {
            Decision::Show => None,
            Decision::Hide { reason, .. } => Some(reason),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Facts about a section/shelf container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionInfo {
    pub title_lower: String,
    pub is_shorts: bool,
    pub rendered_height: f64,
}

/// Why a section was hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionReason {
    /// Renders with negligible height
    Collapsed,
    Shorts,
    AllShelves,
    /// Title carries the marker of an enabled category
    Category(ShelfCategories),
}
