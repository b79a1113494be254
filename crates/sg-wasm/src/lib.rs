//! WebAssembly bindings for SweepGuard
//!
//! One engine per page, kept in a thread-local and driven from JS:
//!
//! ```js
//! init_logging("debug");
//! const report = start();          // built-in policy
//! classify("https://popads.net/"); // "block"
//! stop();
//! ```

use std::cell::RefCell;

use sg_core::engine::StartReport;
use sg_core::types::InterceptKind;
use sg_core::url::extract_host;
use sg_core::{Classifier, ContentFilterEngine, EngineConfig, PolicyStore};
use wasm_bindgen::prelude::*;

pub mod browser;
pub mod console;

pub use browser::BrowserHost;

thread_local! {
    static ENGINE: RefCell<Option<ContentFilterEngine<BrowserHost>>> = RefCell::new(None);
}

fn kind_names(kinds: InterceptKind) -> js_sys::Array {
    let names = js_sys::Array::new();
    for (_, kind) in kinds.iter_names() {
        names.push(&JsValue::from_str(kind.name()));
    }
    names
}

fn report_to_js(report: &StartReport) -> JsValue {
    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"removed".into(), &JsValue::from(report.initial_removed as u32));
    let _ = js_sys::Reflect::set(&result, &"installed".into(), &kind_names(report.installed));
    let _ = js_sys::Reflect::set(&result, &"skipped".into(), &kind_names(report.skipped));
    result.into()
}

/// Route `log` output to the console. Returns the active level name.
#[wasm_bindgen]
pub fn init_logging(level: Option<String>) -> String {
    console::install(level.as_deref()).to_string()
}

/// Start filtering this page. `policy_json` is an engine config; omitted
/// fields use the built-in policy. Calling again while running changes
/// nothing.
#[wasm_bindgen]
pub fn start(policy_json: Option<String>) -> Result<JsValue, JsValue> {
    ENGINE.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(engine) = slot.as_ref() {
            if engine.is_running() {
                return Ok(report_to_js(&StartReport::nothing()));
            }
        }

        let config = match policy_json.as_deref() {
            Some(text) => EngineConfig::from_json(text)
                .map_err(|e| JsValue::from_str(&format!("Invalid policy: {}", e)))?,
            None => EngineConfig::default(),
        };
        let host = BrowserHost::new().map_err(|e| JsValue::from_str(&e.to_string()))?;
        let mut engine = ContentFilterEngine::from_config(host, &config)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let report = engine
            .start()
            .map_err(|e| JsValue::from_str(&format!("Failed to start: {}", e)))?;
        *slot = Some(engine);
        Ok(report_to_js(&report))
    })
}

/// Stop filtering and restore every patched entry point. Returns whether
/// anything was running.
#[wasm_bindgen]
pub fn stop() -> bool {
    ENGINE.with(|slot| match slot.borrow_mut().take() {
        Some(mut engine) => !engine.stop().is_noop(),
        None => false,
    })
}

#[wasm_bindgen]
pub fn is_running() -> bool {
    ENGINE.with(|slot| slot.borrow().as_ref().map(|e| e.is_running()).unwrap_or(false))
}

/// Sweep the document once. Returns the number of elements removed.
#[wasm_bindgen]
pub fn sweep_now() -> u32 {
    ENGINE.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|e| e.sweep_now() as u32)
            .unwrap_or(0)
    })
}

fn with_classifier<T>(f: impl FnOnce(&Classifier) -> T) -> T {
    ENGINE.with(|slot| match slot.borrow().as_ref() {
        Some(engine) => f(engine.classifier()),
        None => f(&Classifier::new(std::rc::Rc::new(PolicyStore::default()))),
    })
}

/// `"allow"` or `"block"` under the running policy (built-in if stopped).
#[wasm_bindgen]
pub fn classify(url: &str) -> String {
    with_classifier(|c| c.classify(url).as_str().to_string())
}

/// `{ classification, reason }` for a URL.
#[wasm_bindgen]
pub fn explain(url: &str) -> JsValue {
    let verdict = with_classifier(|c| c.explain(url));
    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(
        &result,
        &"classification".into(),
        &JsValue::from_str(verdict.classification.as_str()),
    );
    let _ = js_sys::Reflect::set(&result, &"reason".into(), &JsValue::from_str(&verdict.reason.to_string()));
    result.into()
}

#[wasm_bindgen]
pub fn extract_host_js(url: &str) -> Option<String> {
    extract_host(url).map(|h| h.to_string())
}
