//! Filtering lifecycle controller
//!
//! [`FilterEngine`] owns the configuration slot and the scan scheduler. The
//! host feeds it lifecycle events (start, soft navigation, settings messages)
//! and watcher callbacks (viewport entries, mutation batches, timer expiry).
//! Every entry point takes the host explicitly; nothing is global.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::OnceLock;

use log::{debug, error, info, warn};

use crate::config::{Config, ConfigSlot, Settings, ShelfCategories};
use crate::dom::PageNode;
use crate::error::Error;
use crate::extract::{extract, extract_section, shorts_shelf_selector};
use crate::filter::{decide, should_hide_section};
use crate::host::{Host, TimerHandle, ViewportOptions};
use crate::inject::is_target_host;
use crate::message::{parse_message, Ack, RuntimeMessage};
use crate::scheduler::{ScanScheduler, ScanStats, DEBOUNCE_DELAY};
use crate::selector::{builtin, Selector};
use crate::types::{Decision, HideTarget};
use crate::visibility::{apply_grid_layout, hide, reveal_all, show, STYLESHEET, STYLESHEET_ID};

// =============================================================================
// Page kinds and candidate selectors
// =============================================================================

/// Page families with their own listing markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Home,
    Search,
    Subscriptions,
    Channel,
    Watch,
    Other,
}

impl PageKind {
    pub fn from_path(path: &str) -> Self {
        if path == "/" {
            Self::Home
        } else if path.starts_with("/results") {
            Self::Search
        } else if path.starts_with("/feed/subscriptions") {
            Self::Subscriptions
        } else if path.starts_with("/@") || path.starts_with("/channel/") {
            Self::Channel
        } else if path.starts_with("/watch") {
            Self::Watch
        } else {
            Self::Other
        }
    }

    /// Selector source for listing items on this kind of page.
    pub fn item_selector_source(self) -> &'static str {
        match self {
            Self::Search => SEARCH_ITEMS,
            Self::Watch => WATCH_ITEMS,
            Self::Home | Self::Subscriptions | Self::Channel | Self::Other => GRID_ITEMS,
        }
    }

    pub fn item_selector(self) -> &'static Selector {
        let selectors = page_selectors();
        match self {
            Self::Search => &selectors.search_items,
            Self::Watch => &selectors.watch_items,
            Self::Home | Self::Subscriptions | Self::Channel | Self::Other => &selectors.grid_items,
        }
    }
}

const GRID_ITEMS: &str = "ytd-rich-item-renderer";
const SEARCH_ITEMS: &str = "ytd-video-renderer";
const WATCH_ITEMS: &str = "ytd-compact-video-renderer, yt-lockup-view-model";

/// Container the page renders its routed content into.
pub const CONTENT_ROOT: &str = "ytd-page-manager";
pub const SECTIONS: &str = "ytd-rich-grid-renderer #contents > ytd-rich-section-renderer";
pub const SHELVES: &str = "ytd-rich-shelf-renderer";
pub const EXPLORE_SHELVES: &str = "ytd-chips-shelf-with-video-shelf-renderer";
pub const GRIDS: &str = "ytd-rich-grid-renderer";
pub const SHORTS_LINKS: &str = "a[href*=\"/shorts/\"]";
pub const HIDDEN_NODES: &str = ".rotblock-hidden";

const EXPLORE_MARKER: &str = "explore";
const SHELF_SHORTS_ATTR: &str = "is-shorts";

struct PageSelectors {
    grid_items: Selector,
    search_items: Selector,
    watch_items: Selector,
    content_root: Selector,
    sections: Selector,
    shelves: Selector,
    explore_shelves: Selector,
    grids: Selector,
    shorts_links: Selector,
    hidden: Selector,
}

fn page_selectors() -> &'static PageSelectors {
    static SELECTORS: OnceLock<PageSelectors> = OnceLock::new();
    SELECTORS.get_or_init(|| PageSelectors {
        grid_items: builtin(GRID_ITEMS),
        search_items: builtin(SEARCH_ITEMS),
        watch_items: builtin(WATCH_ITEMS),
        content_root: builtin(CONTENT_ROOT),
        sections: builtin(SECTIONS),
        shelves: builtin(SHELVES),
        explore_shelves: builtin(EXPLORE_SHELVES),
        grids: builtin(GRIDS),
        shorts_links: builtin(SHORTS_LINKS),
        hidden: builtin(HIDDEN_NODES),
    })
}

// =============================================================================
// FilterEngine
// =============================================================================

/// The incremental filtering engine for one page.
#[derive(Debug)]
pub struct FilterEngine<N> {
    slot: ConfigSlot,
    scheduler: ScanScheduler<N>,
    page: PageKind,
    active: bool,
    /// Set by the config slot on every replacement; cleared by a full rescan.
    rescan_pending: Rc<Cell<bool>>,
}

impl<N: PageNode> FilterEngine<N> {
    pub fn new(config: Config) -> Self {
        let mut slot = ConfigSlot::new(config);
        let rescan_pending = Rc::new(Cell::new(false));
        let pending = Rc::clone(&rescan_pending);
        slot.subscribe(move |_, epoch| {
            debug!("config epoch {} replaced, rescan pending", epoch);
            pending.set(true);
        });

        Self {
            slot,
            scheduler: ScanScheduler::new(DEBOUNCE_DELAY, ViewportOptions::default()),
            page: PageKind::Other,
            active: false,
            rescan_pending,
        }
    }

    pub fn config(&self) -> Rc<Config> {
        self.slot.current()
    }

    /// The configuration slot. A replacement made here is picked up with a
    /// full rescan on the engine's next callback.
    pub fn config_slot_mut(&mut self) -> &mut ConfigSlot {
        &mut self.slot
    }

    pub fn stats(&self) -> ScanStats {
        self.scheduler.stats()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn page_kind(&self) -> PageKind {
        self.page
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Install into the page and run the first full scan.
    pub fn start<H: Host<Node = N>>(&mut self, host: &mut H) -> Result<(), Error> {
        let location = host.location();
        if !is_target_host(&location.hostname) {
            return Err(Error::UnsupportedHost(location.hostname));
        }

        host.install_stylesheet(STYLESHEET_ID, STYLESHEET);
        self.active = true;
        info!("Filtering started on {}", location.path);
        self.full_rescan(host);
        Ok(())
    }

    /// The page replaced its content without a reload.
    pub fn navigate<H: Host<Node = N>>(&mut self, host: &mut H) {
        if !self.active {
            return;
        }
        info!("Soft navigation to {}", host.location().path);
        self.full_rescan(host);
    }

    /// Disconnect every watcher and drop pending work.
    pub fn stop<H: Host<Node = N>>(&mut self, host: &mut H) {
        host.stop_mutations();
        self.scheduler.cancel(host);
        host.reset_viewport_watcher(&ViewportOptions::default());
        self.active = false;
    }

    /// Install a complete replacement configuration and rescan everything.
    pub fn apply_settings<H: Host<Node = N>>(&mut self, host: &mut H, settings: &Settings) -> Ack {
        let epoch = self.slot.replace(Config::from(settings));
        info!("Settings applied (epoch {})", epoch);
        self.sync_config(host);
        Ack { success: true }
    }

    /// Handle a raw runtime message. `Ok(None)` means the message is not ours.
    pub fn handle_message<H: Host<Node = N>>(&mut self, host: &mut H, raw: &str) -> Result<Option<Ack>, Error> {
        let message = parse_message(raw).map_err(|e| {
            error!("Rejected runtime message: {}", e);
            e
        })?;
        Ok(message.map(|RuntimeMessage::SettingsUpdated { settings }| self.apply_settings(host, &settings)))
    }

    // -------------------------------------------------------------------------
    // Watcher callbacks
    // -------------------------------------------------------------------------

    /// Nodes inserted under the watched root.
    pub fn on_mutations<H: Host<Node = N>>(&mut self, host: &mut H, added: Vec<N>) {
        if self.active {
            self.scheduler.on_mutations(host, added);
        }
    }

    /// Expiry of a timer set by this engine.
    pub fn on_timer<H: Host<Node = N>>(&mut self, host: &mut H, handle: TimerHandle) {
        if !self.active {
            return;
        }
        self.sync_config(host);
        let Some(batch) = self.scheduler.on_timer(handle) else {
            return;
        };
        let registered = self.scheduler.discover(host, &batch, self.page.item_selector());
        debug!("registered {} new items", registered);
        let document = host.document();
        self.section_pass(&document);
    }

    /// Registered nodes that came within the viewport margin.
    pub fn on_visible<H: Host<Node = N>>(&mut self, host: &mut H, visible: Vec<N>) {
        if !self.active {
            return;
        }
        self.sync_config(host);
        let config = self.slot.current();
        for item in self.scheduler.take_visible(host, visible) {
            if self.evaluate(&item, &config) {
                self.scheduler.stats_mut().items_hidden += 1;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Scanning
    // -------------------------------------------------------------------------

    /// Run the full rescan a config replacement asked for, if any.
    fn sync_config<H: Host<Node = N>>(&mut self, host: &mut H) {
        if self.active && self.rescan_pending.get() {
            self.full_rescan(host);
        }
    }

    /// Epoch reset: tear down watchers, clear markers and hidden state, then
    /// register every candidate afresh.
    fn full_rescan<H: Host<Node = N>>(&mut self, host: &mut H) {
        let selectors = page_selectors();
        let document = host.document();
        self.rescan_pending.set(false);

        host.stop_mutations();
        self.scheduler.reset(host, &document);
        let revealed = reveal_all(&document, &selectors.hidden);

        self.page = PageKind::from_path(&host.location().path);
        let registered = self
            .scheduler
            .discover(host, std::slice::from_ref(&document), self.page.item_selector());

        self.section_pass(&document);

        match document.query(&selectors.content_root) {
            Some(root) => host.watch_mutations(&root),
            None => {
                warn!("No {} found, watching the whole document", CONTENT_ROOT);
                host.watch_mutations(&document);
            }
        }

        self.scheduler.stats_mut().full_rescans += 1;
        debug!(
            "full rescan: {} revealed, {} registered ({:?})",
            revealed, registered, self.page
        );
    }

    /// Decide and apply for one item. Returns whether it ended up hidden.
    fn evaluate(&self, item: &N, config: &Config) -> bool {
        let meta = extract(item);
        match decide(&meta, config) {
            Decision::Show => {
                show(item);
                false
            }
            Decision::Hide { reason, target } => {
                let node = match target {
                    HideTarget::ShortsShelf => item.closest(shorts_shelf_selector()).unwrap_or_else(|| item.clone()),
                    HideTarget::Item => item.clone(),
                };
                debug!("hiding item ({:?}): {}", reason, meta.title_lower);
                hide(&node);
                true
            }
        }
    }

    /// Sections, shelves and grid layout.
    fn section_pass(&self, document: &N) {
        let selectors = page_selectors();
        let config = self.slot.current();

        for section in document.query_all(&selectors.sections) {
            match should_hide_section(&extract_section(&section), &config) {
                Some(reason) => {
                    debug!("hiding section: {:?}", reason);
                    hide(&section);
                }
                None => {
                    show(&section);
                }
            }
        }

        if config.hide_shorts {
            for shelf in document.query_all(&selectors.shelves) {
                if shelf.attribute(SHELF_SHORTS_ATTR).is_some() || shelf.query(&selectors.shorts_links).is_some() {
                    hide(&shelf);
                }
            }
        }

        if config.hides_shelf(ShelfCategories::EXPLORE_TOPICS) {
            for shelf in document.query_all(&selectors.explore_shelves) {
                if shelf.text_content().to_lowercase().contains(EXPLORE_MARKER) {
                    hide(&shelf);
                }
            }
        }

        for grid in document.query_all(&selectors.grids) {
            apply_grid_layout(&grid, config.videos_per_row);
        }
    }
}

impl<N: PageNode> Default for FilterEngine<N> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::PageLocation;
    use crate::memory::{MemoryHost, MemoryNode};
    use crate::scheduler::{item_state, ItemState};
    use crate::visibility::is_hidden;

    #[test]
    fn test_page_kind_from_path() {
        assert_eq!(PageKind::from_path("/"), PageKind::Home);
        assert_eq!(PageKind::from_path("/results?search_query=rust"), PageKind::Search);
        assert_eq!(PageKind::from_path("/feed/subscriptions"), PageKind::Subscriptions);
        assert_eq!(PageKind::from_path("/@rustlang"), PageKind::Channel);
        assert_eq!(PageKind::from_path("/channel/UC123"), PageKind::Channel);
        assert_eq!(PageKind::from_path("/watch?v=abc"), PageKind::Watch);
        assert_eq!(PageKind::from_path("/feed/history"), PageKind::Other);

        assert_eq!(PageKind::Search.item_selector().source(), "ytd-video-renderer");
        assert_eq!(PageKind::Watch.item_selector_source(), WATCH_ITEMS);
        assert_eq!(PageKind::Other.item_selector().source(), GRID_ITEMS);
    }

    #[test]
    fn test_page_selectors_compile() {
        let selectors = page_selectors();
        assert_eq!(selectors.grid_items.source(), GRID_ITEMS);
        assert_eq!(selectors.watch_items.source(), WATCH_ITEMS);
        assert_eq!(selectors.hidden.source(), HIDDEN_NODES);
    }

    #[test]
    fn test_start_refuses_other_hosts() {
        let mut host = MemoryHost::new(MemoryNode::element("html"), PageLocation::new("example.com", "/"));
        let mut engine: FilterEngine<MemoryNode> = FilterEngine::default();
        assert!(matches!(engine.start(&mut host), Err(Error::UnsupportedHost(_))));
        assert!(!engine.is_active());
        assert!(host.stylesheet(STYLESHEET_ID).is_none());
    }

    #[test]
    fn test_shorts_shelf_hidden_as_unit() {
        let doc = MemoryNode::element("html");
        let manager = MemoryNode::element("ytd-page-manager");
        let shelf = MemoryNode::element("ytd-rich-shelf-renderer").with_attr("is-shorts", "");
        let item = MemoryNode::element("ytd-rich-item-renderer");
        doc.append(&manager);
        manager.append(&shelf);
        shelf.append(&item);

        let mut host = MemoryHost::new(doc.clone(), PageLocation::new("www.youtube.com", "/"));
        let mut engine = FilterEngine::default();
        engine.start(&mut host).unwrap();
        engine.on_visible(&mut host, vec![item.clone()]);

        assert!(is_hidden(&shelf));
        assert!(!is_hidden(&item));
        assert_eq!(item_state(&item), ItemState::Evaluated);
        assert_eq!(engine.stats().items_hidden, 1);
    }

    #[test]
    fn test_stopped_engine_ignores_callbacks() {
        let doc = MemoryNode::element("html");
        let item = MemoryNode::element("ytd-rich-item-renderer");
        doc.append(&item);
        let mut host = MemoryHost::new(doc.clone(), PageLocation::new("www.youtube.com", "/"));
        let mut engine = FilterEngine::default();
        engine.start(&mut host).unwrap();
        engine.stop(&mut host);

        engine.on_visible(&mut host, vec![item.clone()]);
        engine.on_mutations(&mut host, vec![item.clone()]);
        assert_eq!(engine.stats().items_evaluated, 0);
        assert!(host.pending_timers().is_empty());
        assert!(host.mutation_root().is_none());
    }
}
