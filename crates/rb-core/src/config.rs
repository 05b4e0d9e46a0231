//! Filter configuration
//!
//! [`Settings`] is the persisted and wire form, keyed exactly as the settings
//! surface stores it. [`Config`] is the compiled, immutable snapshot the
//! decision rules read. [`ConfigSlot`] holds the current snapshot and swaps it
//! wholesale.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Settings
// =============================================================================

/// User settings as persisted in the key-value store.
///
/// Missing keys take their documented default, so a fresh install and a
/// partially written store behave like the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct Settings {
    #[ts(type = "number")]
    pub min_views: u64,
    /// Seconds
    pub min_duration: u32,
    /// Grid columns override, 0 keeps the page layout
    pub videos_per_row: u32,
    /// One keyword per line
    pub blocked_keywords: String,
    pub hide_shorts: bool,
    pub hide_breaking_news: bool,
    pub hide_latest_posts: bool,
    pub hide_latest_videos: bool,
    pub hide_people_search: bool,
    pub hide_explore_topics: bool,
    pub hide_all_shelves: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_views: 10_000,
            min_duration: 120,
            videos_per_row: 0,
            blocked_keywords: String::new(),
            hide_shorts: true,
            hide_breaking_news: false,
            hide_latest_posts: false,
            hide_latest_videos: false,
            hide_people_search: false,
            hide_explore_topics: false,
            hide_all_shelves: false,
        }
    }
}

// =============================================================================
// Shelf categories
// =============================================================================

bitflags::bitflags! {
    /// Shelf categories the user chose to hide.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShelfCategories: u8 {
        const BREAKING_NEWS = 1 << 0;
        const LATEST_POSTS = 1 << 1;
        const LATEST_VIDEOS = 1 << 2;
        const PEOPLE_SEARCH = 1 << 3;
        const EXPLORE_TOPICS = 1 << 4;
        /// Every section, regardless of title
        const ALL_SHELVES = 1 << 5;
    }
}

// =============================================================================
// Config
// =============================================================================

/// Compiled filter configuration. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub min_views: u64,
    pub min_duration: u32,
    pub hide_shorts: bool,
    pub videos_per_row: u32,
    /// Lower-cased, non-empty, in the order written
    pub blocked_keywords: Vec<String>,
    pub shelves: ShelfCategories,
}

impl Config {
    pub fn hides_shelf(&self, category: ShelfCategories) -> bool {
        self.shelves.contains(category)
    }
}

impl From<&Settings> for Config {
    fn from(settings: &Settings) -> Self {
        let mut shelves = ShelfCategories::empty();
        shelves.set(ShelfCategories::BREAKING_NEWS, settings.hide_breaking_news);
        shelves.set(ShelfCategories::LATEST_POSTS, settings.hide_latest_posts);
        shelves.set(ShelfCategories::LATEST_VIDEOS, settings.hide_latest_videos);
        shelves.set(ShelfCategories::PEOPLE_SEARCH, settings.hide_people_search);
        shelves.set(ShelfCategories::EXPLORE_TOPICS, settings.hide_explore_topics);
        shelves.set(ShelfCategories::ALL_SHELVES, settings.hide_all_shelves);

        Self {
            min_views: settings.min_views,
            min_duration: settings.min_duration,
            hide_shorts: settings.hide_shorts,
            videos_per_row: settings.videos_per_row,
            blocked_keywords: parse_keywords(&settings.blocked_keywords),
            shelves,
        }
    }
}

impl From<Settings> for Config {
    fn from(settings: Settings) -> Self {
        Config::from(&settings)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::from(&Settings::default())
    }
}

/// Split a multi-line keyword list: trimmed, lower-cased, blanks dropped.
pub fn parse_keywords(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

// =============================================================================
// ConfigSlot
// =============================================================================

type Subscriber = Box<dyn FnMut(&Config, u64)>;

/// The single current configuration.
///
/// Readers get an `Rc` to a complete snapshot; `replace` swaps it in one step
/// and bumps the epoch, so no reader ever sees a half-updated value.
pub struct ConfigSlot {
    current: Rc<Config>,
    epoch: u64,
    subscribers: Vec<Subscriber>,
}

impl ConfigSlot {
    pub fn new(config: Config) -> Self {
        Self {
            current: Rc::new(config),
            epoch: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn current(&self) -> Rc<Config> {
        Rc::clone(&self.current)
    }

    /// Number of replacements so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Install `config` as current and notify subscribers. Returns the new epoch.
    pub fn replace(&mut self, config: Config) -> u64 {
        self.current = Rc::new(config);
        self.epoch += 1;
        for subscriber in &mut self.subscribers {
            subscriber(&self.current, self.epoch);
        }
        self.epoch
    }

    /// Register a callback fired after every replacement.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&Config, u64) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }
}

impl Default for ConfigSlot {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl fmt::Debug for ConfigSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSlot")
            .field("current", &self.current)
            .field("epoch", &self.epoch)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_default_settings() {
        let config = Config::default();
        assert_eq!(config.min_views, 10_000);
        assert_eq!(config.min_duration, 120);
        assert!(config.hide_shorts);
        assert_eq!(config.videos_per_row, 0);
        assert!(config.blocked_keywords.is_empty());
        assert!(config.shelves.is_empty());
    }

    #[test]
    fn test_partial_settings_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"minViews": 500, "hideAllShelves": true}"#).unwrap();
        assert_eq!(settings.min_views, 500);
        assert_eq!(settings.min_duration, 120);
        assert!(settings.hide_shorts);
        assert!(settings.hide_all_shelves);
    }

    #[test]
    fn test_settings_wire_keys() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        let object = value.as_object().unwrap();
        for key in [
            "minViews", "minDuration", "videosPerRow", "blockedKeywords", "hideShorts",
            "hideBreakingNews", "hideLatestPosts", "hideLatestVideos", "hidePeopleSearch",
            "hideExploreTopics", "hideAllShelves",
        ] {
            assert!(object.contains_key(key), "missing {}", key);
        }
        assert_eq!(object.len(), 11);
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(
            parse_keywords("ClickBait\n\n  Reaction  \r\n\t\nPRANK"),
            vec!["clickbait", "reaction", "prank"]
        );
        assert!(parse_keywords("").is_empty());
        assert!(parse_keywords("\n  \n").is_empty());
    }

    #[test]
    fn test_shelf_flags_compile() {
        let settings = Settings {
            hide_breaking_news: true,
            hide_explore_topics: true,
            ..Settings::default()
        };
        let config = Config::from(&settings);
        assert!(config.hides_shelf(ShelfCategories::BREAKING_NEWS));
        assert!(config.hides_shelf(ShelfCategories::EXPLORE_TOPICS));
        assert!(!config.hides_shelf(ShelfCategories::LATEST_POSTS));
        assert!(!config.hides_shelf(ShelfCategories::ALL_SHELVES));
    }

    #[test]
    fn test_slot_replace_notifies() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut slot = ConfigSlot::default();
        let sink = Rc::clone(&seen);
        slot.subscribe(move |config, epoch| sink.borrow_mut().push((config.min_views, epoch)));

        let before = slot.current();
        let epoch = slot.replace(Config {
            min_views: 5,
            ..Config::default()
        });

        assert_eq!(epoch, 1);
        assert_eq!(slot.epoch(), 1);
        assert_eq!(slot.current().min_views, 5);
        // Earlier snapshots stay intact.
        assert_eq!(before.min_views, 10_000);
        assert_eq!(*seen.borrow(), vec![(5, 1)]);
    }
}
