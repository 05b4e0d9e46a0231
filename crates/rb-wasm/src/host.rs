//! Browser host: watchers and timers backed by the page's own APIs
//!
//! Observers are created lazily and report back into the shared runtime
//! through a weak reference, so dropping the content script tears everything
//! down.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{error, warn};
use rb_core::{Host, PageLocation, TimerHandle, Timers, ViewportOptions};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit, MutationObserver,
    MutationObserverInit, MutationRecord, Window,
};

use crate::dom::DomNode;
use crate::Runtime;

type ObserverCallback<O> = Closure<dyn FnMut(js_sys::Array, O)>;

/// Run `f` on the runtime if it is still alive and not already borrowed.
pub(crate) fn with_runtime(runtime: &Weak<RefCell<Runtime>>, f: impl FnOnce(&mut Runtime)) {
    let Some(runtime) = runtime.upgrade() else {
        return;
    };
    match runtime.try_borrow_mut() {
        Ok(mut runtime) => f(&mut runtime),
        Err(_) => warn!("Dropped a callback delivered while the engine was busy"),
    };
}

pub struct DomHost {
    window: Window,
    document: Document,
    root: Element,
    runtime: Weak<RefCell<Runtime>>,
    viewport: Option<(IntersectionObserver, ObserverCallback<IntersectionObserver>)>,
    mutations: Option<(MutationObserver, ObserverCallback<MutationObserver>)>,
    timers: HashMap<TimerHandle, i32>,
    next_timer: i32,
}

impl DomHost {
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window available"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("No document available"))?;
        let root = document
            .document_element()
            .ok_or_else(|| JsValue::from_str("Document has no root element"))?;
        Ok(Self {
            window,
            document,
            root,
            runtime: Weak::new(),
            viewport: None,
            mutations: None,
            timers: HashMap::new(),
            next_timer: 1,
        })
    }

    /// Route observer and timer callbacks into `runtime`.
    pub(crate) fn bind(&mut self, runtime: &Rc<RefCell<Runtime>>) {
        self.runtime = Rc::downgrade(runtime);
    }

    pub fn dom_document(&self) -> &Document {
        &self.document
    }

    fn create_viewport_watcher(
        &self,
        options: &ViewportOptions,
    ) -> Result<(IntersectionObserver, ObserverCallback<IntersectionObserver>), JsValue> {
        let runtime = self.runtime.clone();
        let callback: ObserverCallback<IntersectionObserver> = Closure::new(move |entries: js_sys::Array, _| {
            let visible: Vec<DomNode> = entries
                .iter()
                .filter_map(|entry| entry.dyn_into::<IntersectionObserverEntry>().ok())
                .filter(IntersectionObserverEntry::is_intersecting)
                .map(|entry| DomNode(entry.target()))
                .collect();
            if visible.is_empty() {
                return;
            }
            with_runtime(&runtime, |rt| {
                let Runtime { engine, host } = rt;
                engine.on_visible(host, visible);
            });
        });

        let init = IntersectionObserverInit::new();
        init.set_root_margin(options.root_margin);
        init.set_threshold(&JsValue::from_f64(options.threshold));
        let observer = IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)?;
        Ok((observer, callback))
    }

    fn create_mutation_watcher(&self) -> Result<(MutationObserver, ObserverCallback<MutationObserver>), JsValue> {
        let runtime = self.runtime.clone();
        let callback: ObserverCallback<MutationObserver> = Closure::new(move |records: js_sys::Array, _| {
            let mut added = Vec::new();
            for record in records.iter().filter_map(|r| r.dyn_into::<MutationRecord>().ok()) {
                let nodes = record.added_nodes();
                added.extend(
                    (0..nodes.length())
                        .filter_map(|i| nodes.get(i))
                        .filter_map(|node| node.dyn_into::<Element>().ok())
                        .map(DomNode),
                );
            }
            if added.is_empty() {
                return;
            }
            with_runtime(&runtime, |rt| {
                let Runtime { engine, host } = rt;
                engine.on_mutations(host, added);
            });
        });
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        Ok((observer, callback))
    }
}

impl Timers for DomHost {
    fn set_timer(&mut self, delay: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next_timer);
        self.next_timer += 1;

        let runtime = self.runtime.clone();
        let callback = Closure::once_into_js(move || {
            with_runtime(&runtime, |rt| {
                rt.host.timers.remove(&handle);
                let Runtime { engine, host } = rt;
                engine.on_timer(host, handle);
            });
        });
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis)
        {
            Ok(id) => {
                self.timers.insert(handle, id);
            }
            Err(e) => error!("Failed to set timer: {:?}", e),
        }
        handle
    }

    fn clear_timer(&mut self, handle: TimerHandle) {
        if let Some(id) = self.timers.remove(&handle) {
            self.window.clear_timeout_with_handle(id);
        }
    }
}

impl Host for DomHost {
    type Node = DomNode;

    fn document(&self) -> DomNode {
        DomNode(self.root.clone())
    }

    fn location(&self) -> PageLocation {
        let location = self.window.location();
        PageLocation {
            hostname: location.hostname().unwrap_or_default(),
            path: location.pathname().unwrap_or_default(),
        }
    }

    fn install_stylesheet(&mut self, id: &str, css: &str) {
        if self.document.get_element_by_id(id).is_some() {
            return;
        }
        let style = match self.document.create_element("style") {
            Ok(style) => style,
            Err(e) => {
                error!("Failed to create stylesheet: {:?}", e);
                return;
            }
        };
        style.set_id(id);
        style.set_text_content(Some(css));
        let parent: Option<Element> = self.document.head().map(Into::into).or_else(|| self.document.document_element());
        match parent {
            Some(parent) => {
                if let Err(e) = parent.append_child(&style) {
                    error!("Failed to install stylesheet: {:?}", e);
                }
            }
            None => error!("No element to install the stylesheet into"),
        }
    }

    fn watch_viewport(&mut self, node: &DomNode) {
        if let Some((observer, _)) = &self.viewport {
            observer.observe(node.element());
        }
    }

    fn unwatch_viewport(&mut self, node: &DomNode) {
        if let Some((observer, _)) = &self.viewport {
            observer.unobserve(node.element());
        }
    }

    fn reset_viewport_watcher(&mut self, options: &ViewportOptions) {
        if let Some((observer, _)) = self.viewport.take() {
            observer.disconnect();
        }
        match self.create_viewport_watcher(options) {
            Ok(watcher) => self.viewport = Some(watcher),
            Err(e) => error!("Failed to create viewport watcher: {:?}", e),
        }
    }

    fn watch_mutations(&mut self, root: &DomNode) {
        self.stop_mutations();
        let (observer, callback) = match self.create_mutation_watcher() {
            Ok(watcher) => watcher,
            Err(e) => {
                error!("Failed to create mutation watcher: {:?}", e);
                return;
            }
        };
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        if let Err(e) = observer.observe_with_options(root.element(), &init) {
            error!("Failed to observe mutations: {:?}", e);
            return;
        }
        self.mutations = Some((observer, callback));
    }

    fn stop_mutations(&mut self) {
        if let Some((observer, _)) = self.mutations.take() {
            observer.disconnect();
        }
    }
}

impl Drop for DomHost {
    fn drop(&mut self) {
        self.stop_mutations();
        if let Some((observer, _)) = self.viewport.take() {
            observer.disconnect();
        }
        for (_, id) in self.timers.drain() {
            self.window.clear_timeout_with_handle(id);
        }
    }
}
