//! Incremental scan scheduling
//!
//! Per-item state lives on the document as a marker attribute:
//!
//! ```text
//! Unseen --register--> Registered(watching) --visible--> Evaluated(done)
//!    ^                                                        |
//!    +------------------- epoch reset ------------------------+
//! ```
//!
//! Mutation batches are coalesced by a trailing-edge [`Debouncer`] so a burst
//! of insertions produces a single discovery pass.

use std::mem;
use std::time::Duration;

use log::debug;

use crate::dom::PageNode;
use crate::host::{Host, TimerHandle, Timers, ViewportOptions};
use crate::selector::{builtin, Selector};

/// Marker attribute carrying the scan state.
pub const STATE_ATTR: &str = "data-rotblock";
const STATE_WATCHING: &str = "watching";
const STATE_DONE: &str = "done";

/// Quiet period before a mutation burst is processed.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

// =============================================================================
// Item state
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Unseen,
    Registered,
    Evaluated,
}

pub fn item_state<N: PageNode>(node: &N) -> ItemState {
    match node.attribute(STATE_ATTR).as_deref() {
        Some(STATE_WATCHING) => ItemState::Registered,
        Some(STATE_DONE) => ItemState::Evaluated,
        _ => ItemState::Unseen,
    }
}

fn set_state<N: PageNode>(node: &N, state: ItemState) {
    match state {
        ItemState::Unseen => node.remove_attribute(STATE_ATTR),
        ItemState::Registered => node.set_attribute(STATE_ATTR, STATE_WATCHING),
        ItemState::Evaluated => node.set_attribute(STATE_ATTR, STATE_DONE),
    }
}

// =============================================================================
// Debouncer
// =============================================================================

/// Trailing-edge coalescing buffer.
///
/// Every push restarts the timer; only the latest timer's expiry releases the
/// buffer. Expiry of any other handle, including one that fired after
/// [`cancel`](Self::cancel), is ignored.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<TimerHandle>,
    buffer: Vec<T>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            buffer: Vec::new(),
        }
    }

    pub fn push<H: Timers + ?Sized>(&mut self, timers: &mut H, items: impl IntoIterator<Item = T>) {
        self.buffer.extend(items);
        if let Some(previous) = self.pending.take() {
            timers.clear_timer(previous);
        }
        self.pending = Some(timers.set_timer(self.delay));
    }

    /// Release the buffer if `handle` is the live timer.
    pub fn fire(&mut self, handle: TimerHandle) -> Option<Vec<T>> {
        if self.pending != Some(handle) {
            return None;
        }
        self.pending = None;
        Some(mem::take(&mut self.buffer))
    }

    /// Drop the pending timer and everything buffered.
    pub fn cancel<H: Timers + ?Sized>(&mut self, timers: &mut H) {
        if let Some(handle) = self.pending.take() {
            timers.clear_timer(handle);
        }
        self.buffer.clear();
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

// =============================================================================
// ScanScheduler
// =============================================================================

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub full_rescans: u64,
    pub discovery_passes: u64,
    pub items_registered: u64,
    pub items_evaluated: u64,
    pub items_hidden: u64,
}

/// Decides which nodes get evaluated and when.
#[derive(Debug)]
pub struct ScanScheduler<N> {
    debouncer: Debouncer<N>,
    viewport: ViewportOptions,
    marked: Selector,
    stats: ScanStats,
}

impl<N: PageNode> ScanScheduler<N> {
    pub fn new(delay: Duration, viewport: ViewportOptions) -> Self {
        Self {
            debouncer: Debouncer::new(delay),
            viewport,
            marked: builtin(&format!("[{}]", STATE_ATTR)),
            stats: ScanStats::default(),
        }
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut ScanStats {
        &mut self.stats
    }

    /// Start a new epoch: drop pending work, recreate the viewport watcher and
    /// return every marked node under `root` to `Unseen`.
    pub fn reset<H: Host<Node = N>>(&mut self, host: &mut H, root: &N) {
        self.debouncer.cancel(host);
        host.reset_viewport_watcher(&self.viewport);
        set_state(root, ItemState::Unseen);
        for node in root.query_all(&self.marked) {
            set_state(&node, ItemState::Unseen);
        }
    }

    /// Stop all pending work without touching markers.
    pub fn cancel<H: Host<Node = N>>(&mut self, host: &mut H) {
        self.debouncer.cancel(host);
    }

    /// `Unseen -> Registered`. Returns false for any other state.
    pub fn register<H: Host<Node = N>>(&mut self, host: &mut H, node: &N) -> bool {
        if item_state(node) != ItemState::Unseen {
            return false;
        }
        set_state(node, ItemState::Registered);
        host.watch_viewport(node);
        self.stats.items_registered += 1;
        true
    }

    /// Register every candidate in `nodes`: the node itself when it matches,
    /// and every candidate it contains. Returns how many were newly registered.
    pub fn discover<H: Host<Node = N>>(&mut self, host: &mut H, nodes: &[N], candidates: &Selector) -> usize {
        let mut registered = 0;
        for node in nodes {
            if node.matches(candidates) {
                registered += usize::from(self.register(host, node));
            }
            for item in node.query_all(candidates) {
                registered += usize::from(self.register(host, &item));
            }
        }
        registered
    }

    /// Buffer inserted nodes and restart the debounce window.
    pub fn on_mutations<H: Host<Node = N>>(&mut self, host: &mut H, added: Vec<N>) {
        if added.is_empty() {
            return;
        }
        self.debouncer.push(host, added);
    }

    /// Release the coalesced batch if `handle` is the live debounce timer.
    pub fn on_timer(&mut self, handle: TimerHandle) -> Option<Vec<N>> {
        let batch = self.debouncer.fire(handle)?;
        self.stats.discovery_passes += 1;
        debug!("discovery pass over {} inserted nodes", batch.len());
        Some(batch)
    }

    /// `Registered -> Evaluated` for nodes that came into view. Every visible
    /// node is unwatched; only those still registered are returned.
    pub fn take_visible<H: Host<Node = N>>(&mut self, host: &mut H, visible: Vec<N>) -> Vec<N> {
        let mut ready = Vec::with_capacity(visible.len());
        for node in visible {
            host.unwatch_viewport(&node);
            if item_state(&node) == ItemState::Registered {
                set_state(&node, ItemState::Evaluated);
                ready.push(node);
            }
        }
        self.stats.items_evaluated += ready.len() as u64;
        ready
    }

    pub fn has_pending_batch(&self) -> bool {
        self.debouncer.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::PageLocation;
    use crate::memory::{MemoryHost, MemoryNode};

    fn setup() -> (MemoryHost, MemoryNode, ScanScheduler<MemoryNode>, Selector) {
        let doc = MemoryNode::element("html");
        let host = MemoryHost::new(doc.clone(), PageLocation::new("www.youtube.com", "/"));
        let scheduler = ScanScheduler::new(DEBOUNCE_DELAY, ViewportOptions::default());
        let candidates = Selector::parse("ytd-rich-item-renderer").unwrap();
        (host, doc, scheduler, candidates)
    }

    #[test]
    fn test_debouncer_coalesces() {
        let (mut host, ..) = setup();
        let mut debouncer = Debouncer::new(DEBOUNCE_DELAY);
        let mut handles = Vec::new();
        for i in 0..5 {
            debouncer.push(&mut host, [i]);
            handles.push(*host.pending_timers().last().map(|(h, _)| h).unwrap());
        }
        assert_eq!(host.pending_timers().len(), 1);
        assert_eq!(host.pending_timers()[0].1, DEBOUNCE_DELAY);

        // Superseded timers are ignored even if they somehow fire.
        assert!(debouncer.fire(handles[0]).is_none());
        assert_eq!(debouncer.fire(handles[4]), Some(vec![0, 1, 2, 3, 4]));
        assert!(debouncer.fire(handles[4]).is_none());
    }

    #[test]
    fn test_debouncer_cancel_guards_stale_timer() {
        let (mut host, ..) = setup();
        let mut debouncer = Debouncer::new(DEBOUNCE_DELAY);
        debouncer.push(&mut host, ["a"]);
        let stale = host.pending_timers()[0].0;
        debouncer.cancel(&mut host);
        assert!(host.pending_timers().is_empty());
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.buffered(), 0);
        assert!(debouncer.fire(stale).is_none());
    }

    #[test]
    fn test_state_machine() {
        let (mut host, doc, mut scheduler, _) = setup();
        let item = MemoryNode::element("ytd-rich-item-renderer");
        doc.append(&item);

        assert_eq!(item_state(&item), ItemState::Unseen);
        assert!(scheduler.register(&mut host, &item));
        assert_eq!(item_state(&item), ItemState::Registered);
        assert!(host.is_watching(&item));
        assert!(!scheduler.register(&mut host, &item));

        let ready = scheduler.take_visible(&mut host, vec![item.clone()]);
        assert_eq!(ready, vec![item.clone()]);
        assert_eq!(item_state(&item), ItemState::Evaluated);
        assert!(!host.is_watching(&item));

        // Never evaluated twice within an epoch.
        assert!(!scheduler.register(&mut host, &item));
        assert!(scheduler.take_visible(&mut host, vec![item.clone()]).is_empty());

        scheduler.reset(&mut host, &doc);
        assert_eq!(item_state(&item), ItemState::Unseen);
        assert!(scheduler.register(&mut host, &item));
        assert_eq!(scheduler.stats().items_evaluated, 1);
    }

    #[test]
    fn test_discover_nested_candidates() {
        let (mut host, doc, mut scheduler, candidates) = setup();
        let direct = MemoryNode::element("ytd-rich-item-renderer");
        let wrapper = MemoryNode::element("div");
        wrapper.append(&MemoryNode::element("ytd-rich-item-renderer"));
        wrapper.append(&MemoryNode::element("ytd-rich-item-renderer"));
        let unrelated = MemoryNode::element("span");
        doc.append(&direct);
        doc.append(&wrapper);
        doc.append(&unrelated);

        let count = scheduler.discover(&mut host, &[direct, wrapper.clone(), unrelated], &candidates);
        assert_eq!(count, 3);
        assert_eq!(host.watched().len(), 3);
        // A second pass over the same nodes finds nothing new.
        assert_eq!(scheduler.discover(&mut host, &[wrapper], &candidates), 0);
    }

    #[test]
    fn test_discover_candidate_inside_candidate() {
        let (mut host, doc, mut scheduler, _) = setup();
        let candidates = Selector::parse("ytd-compact-video-renderer, yt-lockup-view-model").unwrap();
        let outer = MemoryNode::element("ytd-compact-video-renderer");
        let inner = MemoryNode::element("yt-lockup-view-model");
        outer.append(&inner);
        doc.append(&outer);

        assert_eq!(scheduler.discover(&mut host, &[outer.clone()], &candidates), 2);
        assert_eq!(item_state(&outer), ItemState::Registered);
        assert_eq!(item_state(&inner), ItemState::Registered);
        assert!(host.is_watching(&inner));
    }

    #[test]
    fn test_reset_recreates_watcher() {
        let (mut host, doc, mut scheduler, _) = setup();
        let item = MemoryNode::element("ytd-rich-item-renderer");
        doc.append(&item);
        scheduler.register(&mut host, &item);
        scheduler.on_mutations(&mut host, vec![item.clone()]);
        assert!(scheduler.has_pending_batch());

        scheduler.reset(&mut host, &doc);
        assert!(!scheduler.has_pending_batch());
        assert!(host.watched().is_empty());
        assert_eq!(host.viewport_resets(), 1);
        assert_eq!(host.viewport_options(), Some(ViewportOptions::default()));
    }
}
