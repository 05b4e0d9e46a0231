//! WebAssembly content script for RotBlock
//!
//! The extension's JS glue reads the stored settings, constructs a
//! [`ContentScript`] with them and forwards runtime messages to
//! [`ContentScript::handle_message`]. Everything else (watchers, timers,
//! soft-navigation events) is wired up here. The background glue forwards
//! tab updates to [`on_tab_updated`].

mod background;
mod dom;
mod host;
mod logger;

use std::cell::RefCell;
use std::rc::Rc;

use log::{info, LevelFilter};
use rb_core::inject::{self, TabUpdate};
use rb_core::{Config, FilterEngine, Settings};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Event;

pub use background::on_tab_updated;
pub use dom::DomNode;
pub use host::DomHost;

/// Event the page fires after a soft navigation finished rendering.
const NAVIGATE_FINISH: &str = "yt-navigate-finish";

pub(crate) struct Runtime {
    pub(crate) engine: FilterEngine<DomNode>,
    pub(crate) host: DomHost,
}

#[wasm_bindgen]
pub struct ContentScript {
    runtime: Rc<RefCell<Runtime>>,
    on_navigate: Option<Closure<dyn FnMut(Event)>>,
}

#[wasm_bindgen]
impl ContentScript {
    /// Create the engine from a settings object serialized as JSON. Missing
    /// keys take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(settings_json: &str) -> Result<ContentScript, JsValue> {
        let settings: Settings = serde_json::from_str(settings_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid settings: {}", e)))?;
        let runtime = Rc::new(RefCell::new(Runtime {
            engine: FilterEngine::new(Config::from(settings)),
            host: DomHost::new()?,
        }));
        runtime.borrow_mut().host.bind(&runtime);
        Ok(ContentScript {
            runtime,
            on_navigate: None,
        })
    }

    /// Install into the page and start filtering.
    pub fn start(&mut self) -> Result<(), JsValue> {
        {
            let mut runtime = self.runtime.borrow_mut();
            let Runtime { engine, host } = &mut *runtime;
            engine.start(host).map_err(|e| JsValue::from_str(&e.to_string()))?;
        }

        if self.on_navigate.is_none() {
            let weak = Rc::downgrade(&self.runtime);
            let callback: Closure<dyn FnMut(Event)> = Closure::new(move |_event: Event| {
                host::with_runtime(&weak, |rt| {
                    let Runtime { engine, host } = rt;
                    engine.navigate(host);
                });
            });
            let runtime = self.runtime.borrow();
            runtime
                .host
                .dom_document()
                .add_event_listener_with_callback(NAVIGATE_FINISH, callback.as_ref().unchecked_ref())?;
            self.on_navigate = Some(callback);
        }
        Ok(())
    }

    /// Handle a runtime message serialized as JSON. Returns the reply, or
    /// `undefined` for messages addressed to someone else.
    pub fn handle_message(&self, raw: &str) -> Result<JsValue, JsValue> {
        let mut runtime = self.runtime.borrow_mut();
        let Runtime { engine, host } = &mut *runtime;
        let reply = engine
            .handle_message(host, raw)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let Some(ack) = reply else {
            return Ok(JsValue::UNDEFINED);
        };
        let result = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&result, &"success".into(), &JsValue::from(ack.success));
        Ok(result.into())
    }

    /// Rescan after the page replaced its content.
    pub fn navigate(&self) {
        let mut runtime = self.runtime.borrow_mut();
        let Runtime { engine, host } = &mut *runtime;
        engine.navigate(host);
    }

    pub fn stop(&mut self) {
        if let Some(callback) = self.on_navigate.take() {
            let runtime = self.runtime.borrow();
            let _ = runtime
                .host
                .dom_document()
                .remove_event_listener_with_callback(NAVIGATE_FINISH, callback.as_ref().unchecked_ref());
        }
        let mut runtime = self.runtime.borrow_mut();
        let Runtime { engine, host } = &mut *runtime;
        engine.stop(host);
        info!("Filtering stopped");
    }

    pub fn stats(&self) -> JsValue {
        let stats = self.runtime.borrow().engine.stats();
        let result = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&result, &"fullRescans".into(), &JsValue::from(stats.full_rescans as f64));
        let _ = js_sys::Reflect::set(&result, &"discoveryPasses".into(), &JsValue::from(stats.discovery_passes as f64));
        let _ = js_sys::Reflect::set(&result, &"itemsRegistered".into(), &JsValue::from(stats.items_registered as f64));
        let _ = js_sys::Reflect::set(&result, &"itemsEvaluated".into(), &JsValue::from(stats.items_evaluated as f64));
        let _ = js_sys::Reflect::set(&result, &"itemsHidden".into(), &JsValue::from(stats.items_hidden as f64));
        result.into()
    }
}

/// Route `log` output to the console. `verbose` enables debug output.
#[wasm_bindgen]
pub fn init_logging(verbose: bool) {
    logger::init(if verbose { LevelFilter::Debug } else { LevelFilter::Info });
}

/// Default settings as JSON, for the settings surface.
#[wasm_bindgen]
pub fn default_settings() -> String {
    serde_json::to_string(&Settings::default()).unwrap_or_default()
}

/// Should the background side inject into a tab with this status and URL?
#[wasm_bindgen]
pub fn should_inject(status: Option<String>, url: Option<String>) -> bool {
    inject::should_inject(&TabUpdate {
        tab_id: -1,
        status: status.as_deref(),
        url: url.as_deref(),
    })
}

/// Does the content engine run on this hostname?
#[wasm_bindgen]
pub fn is_target_host(hostname: &str) -> bool {
    inject::is_target_host(hostname)
}
