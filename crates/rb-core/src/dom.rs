//! Node capability interface
//!
//! The engine only ever sees opaque node handles. A host implements the
//! required accessors and selector matching; tree queries have default
//! implementations built on `matches`, which hosts with a native engine may
//! override.

use crate::selector::Selector;

/// An element in the host page.
///
/// Handles are cheap to clone and compare by identity. Mutating methods take
/// `&self` because the underlying document is shared and owned by the host.
pub trait PageNode: Clone + PartialEq {
    /// Lower-case tag name.
    fn tag_name(&self) -> String;

    fn attribute(&self, name: &str) -> Option<String>;

    fn set_attribute(&self, name: &str, value: &str);

    fn remove_attribute(&self, name: &str);

    fn has_class(&self, class: &str) -> bool;

    fn add_class(&self, class: &str);

    fn remove_class(&self, class: &str);

    /// Concatenated text of this node and all descendants.
    fn text_content(&self) -> String;

    fn parent(&self) -> Option<Self>;

    /// Child elements in document order.
    fn children(&self) -> Vec<Self>;

    /// Rendered height in CSS pixels (0 when not laid out).
    fn rendered_height(&self) -> f64;

    /// Look up a string in the renderer data object backing this element,
    /// following `path` one property at a time.
    fn renderer_text(&self, path: &[&str]) -> Option<String>;

    /// Set a CSS custom property on the element's inline style.
    fn set_style_property(&self, name: &str, value: &str);

    fn remove_style_property(&self, name: &str);

    /// Does this node match `selector`?
    fn matches(&self, selector: &Selector) -> bool;

    // -------------------------------------------------------------------------
    // Provided tree queries
    // -------------------------------------------------------------------------

    /// Nearest inclusive ancestor matching `selector`.
    fn closest(&self, selector: &Selector) -> Option<Self> {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if node.matches(selector) {
                return Some(node);
            }
            current = node.parent();
        }
        None
    }

    /// First descendant (document order) matching `selector`.
    fn query(&self, selector: &Selector) -> Option<Self> {
        let mut stack: Vec<Self> = self.children().into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if node.matches(selector) {
                return Some(node);
            }
            stack.extend(node.children().into_iter().rev());
        }
        None
    }

    /// All descendants (document order) matching `selector`.
    fn query_all(&self, selector: &Selector) -> Vec<Self> {
        let mut found = Vec::new();
        let mut stack: Vec<Self> = self.children().into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if node.matches(selector) {
                found.push(node.clone());
            }
            stack.extend(node.children().into_iter().rev());
        }
        found
    }
}

/// First node found by trying each selector of an ordered fallback chain.
pub fn query_first<N: PageNode>(node: &N, chain: &[Selector]) -> Option<N> {
    chain.iter().find_map(|selector| node.query(selector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryNode;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    #[test]
    fn test_query_document_order() {
        let root = MemoryNode::element("div");
        let a = MemoryNode::element("span").with_text("a");
        let b = MemoryNode::element("p");
        let c = MemoryNode::element("span").with_text("c");
        root.append(&a);
        root.append(&b);
        b.append(&c);
        let d = MemoryNode::element("span").with_text("d");
        root.append(&d);

        let spans = root.query_all(&sel("span"));
        let texts: Vec<String> = spans.iter().map(|n| n.text_content()).collect();
        assert_eq!(texts, vec!["a", "c", "d"]);
        assert_eq!(root.query(&sel("p span")), Some(c.clone()));
        // The scope node itself is never a query result.
        assert!(root.query(&sel("div")).is_none());
    }

    #[test]
    fn test_closest_is_inclusive() {
        let shelf = MemoryNode::element("ytd-rich-shelf-renderer").with_attr("is-shorts", "");
        let item = MemoryNode::element("ytd-rich-item-renderer");
        shelf.append(&item);

        let s = sel("ytd-rich-shelf-renderer[is-shorts]");
        assert_eq!(item.closest(&s), Some(shelf.clone()));
        assert_eq!(shelf.closest(&s), Some(shelf.clone()));
        assert!(item.closest(&sel("ytd-page-manager")).is_none());
    }

    #[test]
    fn test_query_first_respects_chain_order() {
        let root = MemoryNode::element("div");
        let heading = MemoryNode::element("h3");
        let link = MemoryNode::element("a").with_text("heading link");
        heading.append(&link);
        let titled = MemoryNode::element("span").with_attr("title", "attr title");
        root.append(&heading);
        root.append(&titled);

        let chain = vec![sel("#video-title"), sel("[title]"), sel("h3 a")];
        assert_eq!(query_first(&root, &chain), Some(titled));
        assert!(query_first(&root, &chain[..1]).is_none());
    }
}
