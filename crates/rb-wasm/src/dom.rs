//! `PageNode` over live DOM elements
//!
//! Tree queries go straight to the browser's selector engine.

use rb_core::{PageNode, Selector};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, HtmlElement};

/// Where the page's components keep their renderer data, most specific
/// first. The first object present wins.
const RENDERER_DATA: &[&[&str]] = &[&["__data", "data"], &["data"]];

#[derive(Debug, Clone, PartialEq)]
pub struct DomNode(pub Element);

impl DomNode {
    pub fn element(&self) -> &Element {
        &self.0
    }

    fn html(&self) -> Option<&HtmlElement> {
        self.0.dyn_ref::<HtmlElement>()
    }

    /// The renderer data object backing this element, if any.
    pub fn renderer_data(&self) -> Option<JsValue> {
        RENDERER_DATA.iter().find_map(|path| lookup(&self.0, path))
    }
}

/// Follow `path` from `root` one property at a time. Missing, `null` and
/// `undefined` all end the walk.
fn lookup(root: &JsValue, path: &[&str]) -> Option<JsValue> {
    let mut value = root.clone();
    for key in path {
        value = js_sys::Reflect::get(&value, &JsValue::from_str(key)).ok()?;
        if value.is_undefined() || value.is_null() {
            return None;
        }
    }
    Some(value)
}

impl From<Element> for DomNode {
    fn from(element: Element) -> Self {
        Self(element)
    }
}

impl PageNode for DomNode {
    fn tag_name(&self) -> String {
        self.0.tag_name().to_ascii_lowercase()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn set_attribute(&self, name: &str, value: &str) {
        let _ = self.0.set_attribute(name, value);
    }

    fn remove_attribute(&self, name: &str) {
        let _ = self.0.remove_attribute(name);
    }

    fn has_class(&self, class: &str) -> bool {
        self.0.class_list().contains(class)
    }

    fn add_class(&self, class: &str) {
        let _ = self.0.class_list().add_1(class);
    }

    fn remove_class(&self, class: &str) {
        let _ = self.0.class_list().remove_1(class);
    }

    fn text_content(&self) -> String {
        self.0.text_content().unwrap_or_default()
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent_element().map(DomNode)
    }

    fn children(&self) -> Vec<Self> {
        let children = self.0.children();
        (0..children.length())
            .filter_map(|i| children.item(i))
            .map(DomNode)
            .collect()
    }

    fn rendered_height(&self) -> f64 {
        self.html().map_or(0.0, |el| f64::from(el.offset_height()))
    }

    fn renderer_text(&self, path: &[&str]) -> Option<String> {
        lookup(&self.renderer_data()?, path)?.as_string()
    }

    fn set_style_property(&self, name: &str, value: &str) {
        if let Some(el) = self.html() {
            let _ = el.style().set_property(name, value);
        }
    }

    fn remove_style_property(&self, name: &str) {
        if let Some(el) = self.html() {
            let _ = el.style().remove_property(name);
        }
    }

    fn matches(&self, selector: &Selector) -> bool {
        self.0.matches(selector.source()).unwrap_or(false)
    }

    fn closest(&self, selector: &Selector) -> Option<Self> {
        self.0.closest(selector.source()).ok().flatten().map(DomNode)
    }

    fn query(&self, selector: &Selector) -> Option<Self> {
        self.0.query_selector(selector.source()).ok().flatten().map(DomNode)
    }

    fn query_all(&self, selector: &Selector) -> Vec<Self> {
        let Ok(list) = self.0.query_selector_all(selector.source()) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .map(DomNode)
            .collect()
    }
}
