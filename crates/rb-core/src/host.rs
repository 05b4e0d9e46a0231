//! Host page capability interface
//!
//! The host owns the watchers and timers; the engine drives them. All
//! callbacks (viewport entries, mutation batches, timer expiry) are delivered
//! back into the engine by the host, one at a time, on the page's thread.

use std::time::Duration;

use crate::dom::PageNode;

/// Address of the current page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLocation {
    pub hostname: String,
    pub path: String,
}

impl PageLocation {
    pub fn new(hostname: &str, path: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            path: path.to_string(),
        }
    }
}

/// Viewport-proximity watcher settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportOptions {
    /// CSS margin grown around the viewport.
    pub root_margin: &'static str,
    /// Fraction of the element that must overlap.
    pub threshold: f64,
}

impl Default for ViewportOptions {
    fn default() -> Self {
        Self {
            root_margin: "200px 0px",
            threshold: 0.01,
        }
    }
}

/// Identifier of a pending one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub i32);

/// One-shot timers. Expiry is reported back through
/// [`FilterEngine::on_timer`](crate::engine::FilterEngine::on_timer).
pub trait Timers {
    fn set_timer(&mut self, delay: Duration) -> TimerHandle;

    /// Cancel a timer. Unknown or already fired handles are ignored.
    fn clear_timer(&mut self, handle: TimerHandle);
}

/// The page the engine is installed into.
pub trait Host: Timers {
    type Node: PageNode;

    /// Root element of the document.
    fn document(&self) -> Self::Node;

    fn location(&self) -> PageLocation;

    /// Install a stylesheet once; later calls with the same id are no-ops.
    fn install_stylesheet(&mut self, id: &str, css: &str);

    /// Start reporting when `node` comes within the viewport margin.
    /// Observing an already observed node has no effect.
    fn watch_viewport(&mut self, node: &Self::Node);

    fn unwatch_viewport(&mut self, node: &Self::Node);

    /// Drop every viewport registration and recreate the watcher.
    fn reset_viewport_watcher(&mut self, options: &ViewportOptions);

    /// Report subtree insertions under `root`, replacing any previous root.
    fn watch_mutations(&mut self, root: &Self::Node);

    fn stop_mutations(&mut self);
}
