//! In-memory document and host
//!
//! A small element tree with just enough behaviour to stand in for a rendered
//! page: attributes, class list, text, layout height, renderer data and inline
//! custom properties. Used by the test-suite, the benchmarks and the CLI.
//!
//! [`MemoryNode`] implements `selectors::Element`, so it matches selectors
//! with the same engine scraper uses, and saved HTML pages are loaded through
//! `scraper::Html`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, PseudoElement, Simple};
use scraper::{ElementRef, Html, Node};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::matching::{ElementSelectorFlags, MatchingContext};
use selectors::parser::SelectorImpl;
use selectors::OpaqueElement;
use serde::Deserialize;
use serde_json::Value;

use crate::dom::PageNode;
use crate::host::{Host, PageLocation, TimerHandle, Timers, ViewportOptions};
use crate::selector::Selector;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

// =============================================================================
// MemoryNode
// =============================================================================

#[derive(Default)]
struct NodeData {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    /// Text following this element inside its parent.
    tail: String,
    height: f64,
    data: Option<Value>,
    style: BTreeMap<String, String>,
    parent: Weak<RefCell<NodeData>>,
    children: Vec<MemoryNode>,
}

/// Shared handle to an in-memory element.
///
/// Children are owned by their parent; keep the root alive for as long as
/// ancestor lookups are needed.
#[derive(Clone)]
pub struct MemoryNode(Rc<RefCell<NodeData>>);

impl MemoryNode {
    pub fn element(tag: &str) -> Self {
        Self(Rc::new(RefCell::new(NodeData {
            tag: tag.to_ascii_lowercase(),
            ..NodeData::default()
        })))
    }

    pub fn with_attr(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.0.borrow_mut().text = text.to_string();
        self
    }

    pub fn with_height(self, height: f64) -> Self {
        self.0.borrow_mut().height = height;
        self
    }

    /// Attach a renderer data object, reachable through `renderer_text`.
    pub fn with_data(self, data: Value) -> Self {
        self.0.borrow_mut().data = Some(data);
        self
    }

    /// Builder form of [`append`](Self::append).
    pub fn with_child(self, child: MemoryNode) -> Self {
        self.append(&child);
        self
    }

    pub fn set_height(&self, height: f64) {
        self.0.borrow_mut().height = height;
    }

    /// Append `child`, detaching it from any previous parent.
    pub fn append(&self, child: &MemoryNode) {
        child.detach();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
    }

    /// Remove this node from its parent.
    pub fn detach(&self) {
        let parent = self.0.borrow().parent.upgrade();
        if let Some(parent) = parent {
            parent.borrow_mut().children.retain(|c| !Rc::ptr_eq(&c.0, &self.0));
        }
        self.0.borrow_mut().parent = Weak::new();
    }

    pub fn style_property(&self, name: &str) -> Option<String> {
        self.0.borrow().style.get(name).cloned()
    }

    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.0.borrow().attrs.clone()
    }

    /// Number of elements in this subtree, including the node itself.
    pub fn subtree_len(&self) -> usize {
        1 + self.children().iter().map(MemoryNode::subtree_len).sum::<usize>()
    }

    /// Build a tree from its declarative description.
    pub fn from_spec(spec: &NodeSpec) -> Self {
        let node = MemoryNode::element(&spec.tag).with_height(spec.height);
        for (name, value) in &spec.attrs {
            node.set_attribute(name, value);
        }
        if let Some(text) = &spec.text {
            node.0.borrow_mut().text = text.clone();
        }
        if let Some(data) = &spec.data {
            node.0.borrow_mut().data = Some(data.clone());
        }
        for child in &spec.children {
            node.append(&MemoryNode::from_spec(child));
        }
        node
    }

    /// Build a tree from a saved HTML page. Returns the `<html>` element.
    ///
    /// Text keeps its document order, and an inline `height: <n>px` style
    /// becomes the layout height.
    pub fn from_html(html: &str) -> Self {
        let document = Html::parse_document(html);
        Self::from_element(document.root_element())
    }

    fn from_element(element: ElementRef<'_>) -> Self {
        let node = MemoryNode::element(element.value().name());
        for (name, value) in element.value().attrs() {
            node.set_attribute(name, value);
        }
        if let Some(height) = element.value().attr("style").and_then(inline_height) {
            node.set_height(height);
        }
        let mut last: Option<MemoryNode> = None;
        for child in element.children() {
            match child.value() {
                Node::Text(text) => match &last {
                    Some(prev) => prev.0.borrow_mut().tail.push_str(text),
                    None => node.0.borrow_mut().text.push_str(text),
                },
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        let child = Self::from_element(child);
                        node.append(&child);
                        last = Some(child);
                    }
                }
                _ => {}
            }
        }
        node
    }

    fn sibling(&self, offset: isize) -> Option<MemoryNode> {
        let parent = self.parent()?;
        let data = parent.0.borrow();
        let idx = data.children.iter().position(|c| c == self)?;
        data.children.get(idx.checked_add_signed(offset)?).cloned()
    }
}

fn inline_height(style: &str) -> Option<f64> {
    style.split(';').find_map(|decl| {
        let (name, value) = decl.split_once(':')?;
        if name.trim() != "height" {
            return None;
        }
        value.trim().strip_suffix("px")?.trim().parse().ok()
    })
}

impl PartialEq for MemoryNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MemoryNode {}

impl fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        write!(f, "<{}", data.tag)?;
        for (name, value) in &data.attrs {
            write!(f, " {}=\"{}\"", name, value)?;
        }
        write!(f, ">")
    }
}

impl PageNode for MemoryNode {
    fn tag_name(&self) -> String {
        self.0.borrow().tag.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.borrow().attrs.get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .borrow_mut()
            .attrs
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    fn remove_attribute(&self, name: &str) {
        self.0.borrow_mut().attrs.remove(name);
    }

    fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }

    fn add_class(&self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let list = match self.attribute("class") {
            Some(list) if !list.trim().is_empty() => format!("{} {}", list.trim(), class),
            _ => class.to_string(),
        };
        self.set_attribute("class", &list);
    }

    fn remove_class(&self, class: &str) {
        let Some(list) = self.attribute("class") else {
            return;
        };
        if !list.split_whitespace().any(|c| c == class) {
            return;
        }
        let kept: Vec<&str> = list.split_whitespace().filter(|c| *c != class).collect();
        self.set_attribute("class", &kept.join(" "));
    }

    fn text_content(&self) -> String {
        let data = self.0.borrow();
        let mut text = data.text.clone();
        for child in &data.children {
            text.push_str(&child.text_content());
            text.push_str(&child.0.borrow().tail);
        }
        text
    }

    fn parent(&self) -> Option<Self> {
        self.0.borrow().parent.upgrade().map(MemoryNode)
    }

    fn children(&self) -> Vec<Self> {
        self.0.borrow().children.clone()
    }

    fn rendered_height(&self) -> f64 {
        self.0.borrow().height
    }

    fn renderer_text(&self, path: &[&str]) -> Option<String> {
        let data = self.0.borrow();
        let mut value = data.data.as_ref()?;
        for key in path {
            value = value.get(*key)?;
        }
        value.as_str().map(str::to_string)
    }

    fn set_style_property(&self, name: &str, value: &str) {
        self.0
            .borrow_mut()
            .style
            .insert(name.to_string(), value.to_string());
    }

    fn remove_style_property(&self, name: &str) {
        self.0.borrow_mut().style.remove(name);
    }

    fn matches(&self, selector: &Selector) -> bool {
        selector.matches_element(self)
    }
}

impl selectors::Element for MemoryNode {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(&*self.0)
    }

    fn parent_element(&self) -> Option<Self> {
        self.parent()
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.sibling(-1)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.sibling(1)
    }

    fn first_element_child(&self) -> Option<Self> {
        self.0.borrow().children.first().cloned()
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, local_name: &CssLocalName) -> bool {
        self.0.borrow().tag.as_str() == &*local_name.0
    }

    fn has_namespace(&self, ns: &<Simple as SelectorImpl>::BorrowedNamespaceUrl) -> bool {
        let ns: &str = ns;
        ns.is_empty() || ns == HTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.0.borrow().tag == other.0.borrow().tag
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&<Simple as SelectorImpl>::NamespaceUrl>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        if matches!(ns, NamespaceConstraint::Specific(url) if !url.is_empty()) {
            return false;
        }
        self.0
            .borrow()
            .attrs
            .get(&*local_name.0)
            .is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(&self, _pc: &NonTSPseudoClass, _context: &mut MatchingContext<Simple>) -> bool {
        false
    }

    fn match_pseudo_element(&self, _pe: &PseudoElement, _context: &mut MatchingContext<Simple>) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        let data = self.0.borrow();
        data.tag == "a" && data.attrs.contains_key("href")
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.0
            .borrow()
            .attrs
            .get("id")
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.0.borrow().attrs.get("class").is_some_and(|list| {
            list.split_whitespace()
                .any(|class| case_sensitivity.eq(class.as_bytes(), name.0.as_bytes()))
        })
    }

    fn has_custom_state(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        let data = self.0.borrow();
        data.children.is_empty() && data.text.is_empty()
    }

    fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}

/// Declarative description of a page tree, as stored in JSON fixtures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub text: Option<String>,
    pub height: f64,
    pub data: Option<Value>,
    pub children: Vec<NodeSpec>,
}

// =============================================================================
// MemoryHost
// =============================================================================

/// A host whose watchers and timers are plain bookkeeping.
///
/// Nothing fires on its own: tests and tools deliver viewport entries,
/// mutation batches and timer expiry to the engine explicitly.
#[derive(Debug)]
pub struct MemoryHost {
    document: MemoryNode,
    location: PageLocation,
    stylesheets: BTreeMap<String, String>,
    watched: Vec<MemoryNode>,
    viewport_options: Option<ViewportOptions>,
    viewport_resets: usize,
    mutation_root: Option<MemoryNode>,
    timers: Vec<(TimerHandle, Duration)>,
    next_timer: i32,
}

impl MemoryHost {
    pub fn new(document: MemoryNode, location: PageLocation) -> Self {
        Self {
            document,
            location,
            stylesheets: BTreeMap::new(),
            watched: Vec::new(),
            viewport_options: None,
            viewport_resets: 0,
            mutation_root: None,
            timers: Vec::new(),
            next_timer: 1,
        }
    }

    pub fn set_location(&mut self, location: PageLocation) {
        self.location = location;
    }

    pub fn stylesheet(&self, id: &str) -> Option<&str> {
        self.stylesheets.get(id).map(String::as_str)
    }

    /// Nodes currently registered with the viewport watcher.
    pub fn watched(&self) -> &[MemoryNode] {
        &self.watched
    }

    pub fn is_watching(&self, node: &MemoryNode) -> bool {
        self.watched.contains(node)
    }

    pub fn viewport_options(&self) -> Option<ViewportOptions> {
        self.viewport_options
    }

    pub fn viewport_resets(&self) -> usize {
        self.viewport_resets
    }

    pub fn mutation_root(&self) -> Option<&MemoryNode> {
        self.mutation_root.as_ref()
    }

    /// Timers that were set and neither cleared nor fired.
    pub fn pending_timers(&self) -> &[(TimerHandle, Duration)] {
        &self.timers
    }

    /// Pop the most recently set pending timer, as if it had expired.
    pub fn expire_latest_timer(&mut self) -> Option<TimerHandle> {
        self.timers.pop().map(|(handle, _)| handle)
    }
}

impl Timers for MemoryHost {
    fn set_timer(&mut self, delay: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next_timer);
        self.next_timer += 1;
        self.timers.push((handle, delay));
        handle
    }

    fn clear_timer(&mut self, handle: TimerHandle) {
        self.timers.retain(|(h, _)| *h != handle);
    }
}

impl Host for MemoryHost {
    type Node = MemoryNode;

    fn document(&self) -> MemoryNode {
        self.document.clone()
    }

    fn location(&self) -> PageLocation {
        self.location.clone()
    }

    fn install_stylesheet(&mut self, id: &str, css: &str) {
        self.stylesheets
            .entry(id.to_string())
            .or_insert_with(|| css.to_string());
    }

    fn watch_viewport(&mut self, node: &MemoryNode) {
        if !self.watched.contains(node) {
            self.watched.push(node.clone());
        }
    }

    fn unwatch_viewport(&mut self, node: &MemoryNode) {
        self.watched.retain(|n| n != node);
    }

    fn reset_viewport_watcher(&mut self, options: &ViewportOptions) {
        self.watched.clear();
        self.viewport_options = Some(*options);
        self.viewport_resets += 1;
    }

    fn watch_mutations(&mut self, root: &MemoryNode) {
        self.mutation_root = Some(root.clone());
    }

    fn stop_mutations(&mut self) {
        self.mutation_root = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_class_list_editing() {
        let node = MemoryNode::element("div").with_attr("class", "style-scope");
        node.add_class("rotblock-hidden");
        node.add_class("rotblock-hidden");
        assert_eq!(node.attribute("class").as_deref(), Some("style-scope rotblock-hidden"));
        node.remove_class("rotblock-hidden");
        assert_eq!(node.attribute("class").as_deref(), Some("style-scope"));
        node.remove_class("missing");
        assert_eq!(node.attribute("class").as_deref(), Some("style-scope"));
    }

    #[test]
    fn test_text_content_is_recursive() {
        let root = MemoryNode::element("div").with_text("Hello ");
        root.append(&MemoryNode::element("b").with_text("big"));
        root.append(&MemoryNode::element("i").with_text(" world"));
        assert_eq!(root.text_content(), "Hello big world");
    }

    #[test]
    fn test_append_moves_node() {
        let a = MemoryNode::element("a");
        let b = MemoryNode::element("b");
        let child = MemoryNode::element("span");
        a.append(&child);
        b.append(&child);
        assert!(a.children().is_empty());
        assert_eq!(child.parent(), Some(b.clone()));
    }

    #[test]
    fn test_renderer_text_path() {
        let node = MemoryNode::element("ytd-rich-item-renderer")
            .with_data(json!({"viewCountText": {"simpleText": "1.2K views"}}));
        assert_eq!(
            node.renderer_text(&["viewCountText", "simpleText"]).as_deref(),
            Some("1.2K views")
        );
        assert!(node.renderer_text(&["shortViewCountText", "simpleText"]).is_none());
        assert!(MemoryNode::element("div").renderer_text(&["viewCountText"]).is_none());
    }

    #[test]
    fn test_from_spec() {
        let spec: NodeSpec = serde_json::from_value(json!({
            "tag": "ytd-rich-grid-renderer",
            "children": [
                {"tag": "div", "attrs": {"id": "contents"}, "height": 400.0,
                 "children": [{"tag": "span", "text": "850 views"}]}
            ]
        }))
        .unwrap();
        let root = MemoryNode::from_spec(&spec);
        assert_eq!(root.subtree_len(), 3);
        let contents = &root.children()[0];
        assert_eq!(contents.attribute("id").as_deref(), Some("contents"));
        assert_eq!(contents.rendered_height(), 400.0);
        assert_eq!(root.text_content(), "850 views");
    }

    #[test]
    fn test_from_html() {
        let root = MemoryNode::from_html(
            r#"<!DOCTYPE html><html><body>
                <ytd-rich-item-renderer style="height: 320px">
                  <a id="video-title" href="/watch?v=x">Rust in <b>one</b> minute</a>
                </ytd-rich-item-renderer>
            </body></html>"#,
        );
        assert_eq!(root.tag_name(), "html");

        let item = root.query(&Selector::parse("body > ytd-rich-item-renderer").unwrap()).unwrap();
        assert_eq!(item.rendered_height(), 320.0);
        let title = item.query(&Selector::parse("a#video-title[href^='/watch']").unwrap()).unwrap();
        assert_eq!(title.text_content(), "Rust in one minute");
    }

    #[test]
    fn test_inline_height() {
        assert_eq!(inline_height("display: block; height: 48px"), Some(48.0));
        assert_eq!(inline_height("height: 2em"), None);
        assert_eq!(inline_height("max-height: 10px"), None);
    }

    #[test]
    fn test_siblings() {
        let parent = MemoryNode::element("div");
        let a = MemoryNode::element("a");
        let b = MemoryNode::element("b");
        parent.append(&a);
        parent.append(&b);
        assert_eq!(b.sibling(-1), Some(a.clone()));
        assert_eq!(a.sibling(1), Some(b.clone()));
        assert!(a.sibling(-1).is_none());
        assert!(b.sibling(1).is_none());
        assert!(parent.sibling(1).is_none());
    }

    #[test]
    fn test_host_timers() {
        let mut host = MemoryHost::new(MemoryNode::element("html"), PageLocation::default());
        let first = host.set_timer(Duration::from_millis(300));
        let second = host.set_timer(Duration::from_millis(300));
        assert_ne!(first, second);
        host.clear_timer(first);
        assert_eq!(host.pending_timers().len(), 1);
        assert_eq!(host.expire_latest_timer(), Some(second));
        assert!(host.pending_timers().is_empty());
    }
}
