//! Reversible hide/show and grid layout
//!
//! Hiding toggles a marker class backed by an injected stylesheet; inline
//! styles the host page set on the element are never touched.

use crate::dom::PageNode;
use crate::selector::Selector;

pub const HIDDEN_CLASS: &str = "rotblock-hidden";
pub const STYLESHEET_ID: &str = "rotblock-styles";
pub const STYLESHEET: &str = ".rotblock-hidden {\n  display: none !important;\n}\n";

/// Custom properties controlling the rich grid column count, with the
/// number of extra columns each one gets over the requested value.
pub const GRID_PROPERTIES: &[(&str, u32)] = &[
    ("--ytd-rich-grid-items-per-row", 0),
    ("--ytd-rich-grid-posts-per-row", 0),
    ("--ytd-rich-grid-slim-items-per-row", 1),
    ("--ytd-rich-grid-game-cards-per-row", 1),
    ("--ytd-rich-grid-mini-game-cards-per-row", 0),
];

pub fn is_hidden<N: PageNode>(node: &N) -> bool {
    node.has_class(HIDDEN_CLASS)
}

/// Hide `node`. Returns whether anything changed.
pub fn hide<N: PageNode>(node: &N) -> bool {
    if is_hidden(node) {
        return false;
    }
    node.add_class(HIDDEN_CLASS);
    true
}

/// Show `node`. Returns whether anything changed.
pub fn show<N: PageNode>(node: &N) -> bool {
    if !is_hidden(node) {
        return false;
    }
    node.remove_class(HIDDEN_CLASS);
    true
}

/// Show every hidden node under `root` (inclusive). Returns how many.
pub fn reveal_all<N: PageNode>(root: &N, hidden: &Selector) -> usize {
    let mut count = usize::from(show(root));
    for node in root.query_all(hidden) {
        if show(&node) {
            count += 1;
        }
    }
    count
}

/// Apply the videos-per-row override to one grid. `0` restores the page's
/// own layout.
pub fn apply_grid_layout<N: PageNode>(grid: &N, videos_per_row: u32) {
    for (property, extra) in GRID_PROPERTIES {
        if videos_per_row > 0 {
            grid.set_style_property(property, &(videos_per_row + extra).to_string());
        } else {
            grid.remove_style_property(property);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryNode;

    #[test]
    fn test_hide_show_idempotent() {
        let node = MemoryNode::element("ytd-rich-item-renderer").with_attr("class", "style-scope");
        let before = node.attributes();

        assert!(hide(&node));
        assert!(!hide(&node));
        assert!(is_hidden(&node));
        let hidden = node.attributes();
        hide(&node);
        assert_eq!(node.attributes(), hidden);

        assert!(show(&node));
        assert!(!show(&node));
        assert_eq!(node.attributes(), before);
    }

    #[test]
    fn test_show_on_fresh_node_is_noop() {
        let node = MemoryNode::element("div");
        assert!(!show(&node));
        assert!(node.attributes().is_empty());
    }

    #[test]
    fn test_reveal_all() {
        let root = MemoryNode::element("div");
        let a = MemoryNode::element("span");
        let b = MemoryNode::element("span");
        root.append(&a);
        a.append(&b);
        hide(&root);
        hide(&b);

        let selector = Selector::parse(".rotblock-hidden").unwrap();
        assert_eq!(reveal_all(&root, &selector), 2);
        assert!(!is_hidden(&root));
        assert!(!is_hidden(&b));
        assert_eq!(reveal_all(&root, &selector), 0);
    }

    #[test]
    fn test_grid_layout() {
        let grid = MemoryNode::element("ytd-rich-grid-renderer");
        apply_grid_layout(&grid, 4);
        assert_eq!(grid.style_property("--ytd-rich-grid-items-per-row").as_deref(), Some("4"));
        assert_eq!(grid.style_property("--ytd-rich-grid-slim-items-per-row").as_deref(), Some("5"));
        assert_eq!(grid.style_property("--ytd-rich-grid-game-cards-per-row").as_deref(), Some("5"));
        assert_eq!(grid.style_property("--ytd-rich-grid-mini-game-cards-per-row").as_deref(), Some("4"));

        apply_grid_layout(&grid, 0);
        for (property, _) in GRID_PROPERTIES {
            assert!(grid.style_property(property).is_none());
        }
    }
}
