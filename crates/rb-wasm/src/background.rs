//! Background entry point
//!
//! The extension's background glue forwards every tab update here together
//! with two callbacks, `inject(tabId)` and `reload(tabId)`. Either may return
//! a promise; a rejection or a thrown exception counts as failure.

use js_sys::{Function, Promise};
use rb_core::inject::{handle_tab_update, TabControl, TabUpdate};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

struct JsTabs {
    inject: Function,
    reload: Function,
}

impl TabControl for JsTabs {
    async fn inject(&mut self, tab_id: i32) -> Result<(), String> {
        call(&self.inject, tab_id).await
    }

    async fn reload(&mut self, tab_id: i32) -> Result<(), String> {
        call(&self.reload, tab_id).await
    }
}

async fn call(callback: &Function, tab_id: i32) -> Result<(), String> {
    let value = callback
        .call1(&JsValue::NULL, &JsValue::from(tab_id))
        .map_err(describe)?;
    if let Some(promise) = value.dyn_ref::<Promise>() {
        JsFuture::from(promise.clone()).await.map_err(describe)?;
    }
    Ok(())
}

fn describe(error: JsValue) -> String {
    if let Some(message) = error.as_string() {
        return message;
    }
    match error.dyn_ref::<js_sys::Error>() {
        Some(error) => String::from(error.message()),
        None => format!("{:?}", error),
    }
}

/// Handle a tab update. Resolves to `"skipped"`, `"injected"`,
/// `"reloaded"` or `"failed"`.
#[wasm_bindgen(js_name = onTabUpdated)]
pub async fn on_tab_updated(
    tab_id: i32,
    status: Option<String>,
    url: Option<String>,
    inject: Function,
    reload: Function,
) -> String {
    let update = TabUpdate {
        tab_id,
        status: status.as_deref(),
        url: url.as_deref(),
    };
    let mut tabs = JsTabs { inject, reload };
    handle_tab_update(&mut tabs, &update).await.as_str().to_string()
}
