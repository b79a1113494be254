//! Live-DOM host
//!
//! [`BrowserHost`] implements the core host traits over `web-sys`. Entry
//! points are patched through `Reflect` so the originals can be put back
//! exactly as they were.

use std::time::Duration;

use js_sys::{Function, Object, Reflect};
use sg_core::host::{
    AttributeFilter, ClickFilter, Dom, EntryPoints, HostError, Scheduler, Teardown, UrlFilter,
};
use sg_core::types::{InterceptKind, MutationBatch};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, EventTarget, MutationObserver, MutationObserverInit, MutationRecord, Window};

/// The current window and document.
#[derive(Clone)]
pub struct BrowserHost {
    window: Window,
    document: Document,
}

impl BrowserHost {
    pub fn new() -> Result<Self, HostError> {
        let window = web_sys::window().ok_or(HostError::NoRoot)?;
        let document = window.document().ok_or(HostError::NoRoot)?;
        Ok(Self { window, document })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

fn platform(what: &str, err: JsValue) -> HostError {
    HostError::Platform(format!("{}: {:?}", what, err))
}

/// String form of a URL-ish argument (string, `URL`, `Location`).
fn url_arg(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    if value.is_undefined() || value.is_null() {
        return String::new();
    }
    value.unchecked_ref::<Object>().to_string().into()
}

/// Own or inherited function-valued property of `target`.
fn function_property(target: &JsValue, name: &str) -> Option<Function> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
}

/// Accessor descriptor for `name` somewhere on the prototype chain of `target`.
fn find_accessor(target: &JsValue, name: &str) -> Option<(Function, Function)> {
    let key = JsValue::from_str(name);
    let mut current = Object::get_prototype_of(target);
    while !current.is_null() {
        let descriptor = Object::get_own_property_descriptor(&current, &key);
        if !descriptor.is_undefined() {
            let getter = function_property(&descriptor, "get")?;
            let setter = function_property(&descriptor, "set")?;
            return Some((getter, setter));
        }
        current = Object::get_prototype_of(&current);
    }
    None
}

/// `event.destination.url` of a Navigation API `navigate` event.
fn navigate_destination(event: &Event) -> Option<String> {
    Reflect::get(event, &"destination".into())
        .and_then(|destination| Reflect::get(&destination, &"url".into()))
        .ok()
        .and_then(|url| url.as_string())
}

// =============================================================================
// Dom
// =============================================================================

impl Dom for BrowserHost {
    type Node = Element;

    fn elements_under(&self, root: &Element) -> Vec<Element> {
        // Snapshot of the live collection
        let all = root.get_elements_by_tag_name("*");
        (0..all.length()).filter_map(|i| all.item(i)).collect()
    }

    fn tag_name(&self, node: &Element) -> Option<String> {
        Some(node.tag_name().to_ascii_lowercase())
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn is_connected(&self, node: &Element) -> bool {
        node.is_connected()
    }

    fn detach(&self, node: &Element) -> bool {
        if node.parent_node().is_none() {
            return false;
        }
        node.remove();
        true
    }
}

// =============================================================================
// Scheduler
// =============================================================================

impl Scheduler for BrowserHost {
    fn observed_root(&self) -> Option<Element> {
        self.document.document_element()
    }

    fn observe(
        &self,
        root: &Element,
        mut callback: Box<dyn FnMut(MutationBatch)>,
    ) -> Result<Teardown, HostError> {
        let closure = Closure::wrap(Box::new(move |records: js_sys::Array, _observer: MutationObserver| {
            let mut batch = MutationBatch::default();
            for value in records.iter() {
                let record: MutationRecord = value.unchecked_into();
                batch.records += 1;
                batch.added += record.added_nodes().length() as usize;
                batch.removed += record.removed_nodes().length() as usize;
            }
            callback(batch);
        }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

        let observer = MutationObserver::new(closure.as_ref().unchecked_ref())
            .map_err(|e| platform("failed to create observer", e))?;

        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);
        observer
            .observe_with_options(root, &options)
            .map_err(|e| platform("failed to start observer", e))?;

        Ok(Box::new(move || {
            observer.disconnect();
            drop(closure);
        }))
    }

    fn set_interval(&self, period: Duration, mut callback: Box<dyn FnMut()>) -> Result<Teardown, HostError> {
        let millis = i32::try_from(period.as_millis())
            .map_err(|_| HostError::Platform(format!("interval too long: {:?}", period)))?;

        let closure = Closure::wrap(Box::new(move || callback()) as Box<dyn FnMut()>);
        let handle = self
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(closure.as_ref().unchecked_ref(), millis)
            .map_err(|e| platform("setInterval failed", e))?;

        let window = self.window.clone();
        Ok(Box::new(move || {
            window.clear_interval_with_handle(handle);
            drop(closure);
        }))
    }
}

// =============================================================================
// Entry points
// =============================================================================

impl BrowserHost {
    /// Replace `target[name]` with `replacement`; the teardown puts the
    /// original back, deleting the own property if there was none.
    fn patch_property(&self, target: &JsValue, name: &str, replacement: &JsValue) -> Result<Teardown, HostError> {
        let key = JsValue::from_str(name);
        let had_own = target
            .dyn_ref::<Object>()
            .map(|obj| obj.has_own_property(&key))
            .unwrap_or(false);
        let original = Reflect::get(target, &key).map_err(|e| platform(name, e))?;

        Reflect::set(target, &key, replacement).map_err(|e| platform(name, e))?;

        let target = target.clone();
        Ok(Box::new(move || {
            let restored = if had_own {
                Reflect::set(&target, &key, &original)
            } else {
                Reflect::delete_property(target.unchecked_ref::<Object>(), &key)
            };
            if restored.is_err() {
                log::warn!("could not restore {:?}", key.as_string());
            }
        }))
    }
}

/// Route `src` on one freshly created script/iframe through `filter`, both
/// as a property and through `setAttribute`.
fn guard_src(element: &Element, tag: &str, filter: &AttributeFilter) -> Result<(), JsValue> {
    let target: &JsValue = element.as_ref();

    if let Some((getter, setter)) = find_accessor(target, "src") {
        let get_el = element.clone();
        let get = Closure::wrap(Box::new(move || getter.call0(&get_el)) as Box<dyn Fn() -> Result<JsValue, JsValue>>);

        let set_el = element.clone();
        let set_filter = filter.clone();
        let set_tag = tag.to_string();
        let set = Closure::wrap(Box::new(move |value: JsValue| -> Result<(), JsValue> {
            if set_filter(&set_tag, "src", &url_arg(&value)) {
                setter.call1(&set_el, &value)?;
            }
            Ok(())
        }) as Box<dyn Fn(JsValue) -> Result<(), JsValue>>);

        let descriptor = Object::new();
        Reflect::set(&descriptor, &"get".into(), &get.into_js_value())?;
        Reflect::set(&descriptor, &"set".into(), &set.into_js_value())?;
        Reflect::set(&descriptor, &"configurable".into(), &JsValue::TRUE)?;
        Reflect::set(&descriptor, &"enumerable".into(), &JsValue::TRUE)?;
        Object::define_property(element.unchecked_ref::<Object>(), &"src".into(), &descriptor);
    }

    if let Some(native) = function_property(target, "setAttribute") {
        let el = element.clone();
        let attr_filter = filter.clone();
        let attr_tag = tag.to_string();
        let set_attribute = Closure::wrap(Box::new(move |name: JsValue, value: JsValue| -> Result<(), JsValue> {
            let attr = url_arg(&name).to_ascii_lowercase();
            if attr_filter(&attr_tag, &attr, &url_arg(&value)) {
                native.call2(&el, &name, &value)?;
            }
            Ok(())
        }) as Box<dyn Fn(JsValue, JsValue) -> Result<(), JsValue>>);
        Reflect::set(target, &"setAttribute".into(), &set_attribute.into_js_value())?;
    }

    Ok(())
}

impl EntryPoints for BrowserHost {
    fn wrap_element_creation(&self, filter: AttributeFilter) -> Result<Teardown, HostError> {
        let document: JsValue = self.document.clone().into();
        let native = function_property(&document, "createElement")
            .ok_or(HostError::Unsupported(InterceptKind::CREATE_ELEMENT))?;

        let this = document.clone();
        let replacement = Closure::wrap(Box::new(move |tag: JsValue, options: JsValue| -> Result<JsValue, JsValue> {
            let created = native.call2(&this, &tag, &options)?;
            let name = url_arg(&tag).to_ascii_lowercase();
            if name == "script" || name == "iframe" {
                if let Some(element) = created.dyn_ref::<Element>() {
                    guard_src(element, &name, &filter)?;
                }
            }
            Ok(created)
        }) as Box<dyn Fn(JsValue, JsValue) -> Result<JsValue, JsValue>>);

        let restore = self.patch_property(&document, "createElement", replacement.as_ref())?;
        Ok(Box::new(move || {
            restore();
            drop(replacement);
        }))
    }

    fn wrap_window_open(&self, filter: UrlFilter) -> Result<Teardown, HostError> {
        let window: JsValue = self.window.clone().into();
        let native = function_property(&window, "open")
            .ok_or(HostError::Unsupported(InterceptKind::WINDOW_OPEN))?;

        let this = window.clone();
        let replacement = Closure::wrap(Box::new(
            move |url: JsValue, target: JsValue, features: JsValue| -> Result<JsValue, JsValue> {
                if !filter(&url_arg(&url)) {
                    return Ok(JsValue::NULL);
                }
                native.call3(&this, &url, &target, &features)
            },
        ) as Box<dyn Fn(JsValue, JsValue, JsValue) -> Result<JsValue, JsValue>>);

        let restore = self.patch_property(&window, "open", replacement.as_ref())?;
        Ok(Box::new(move || {
            restore();
            drop(replacement);
        }))
    }

    fn wrap_navigation(&self, filter: UrlFilter) -> Result<Teardown, HostError> {
        // `location` is unforgeable; the Navigation API is the only hook
        let navigation = Reflect::get(&self.window, &"navigation".into())
            .ok()
            .filter(|value| value.is_object())
            .ok_or(HostError::Unsupported(InterceptKind::NAVIGATION))?;
        let target: EventTarget = navigation.unchecked_into();

        let listener = Closure::wrap(Box::new(move |event: Event| {
            let url = match navigate_destination(&event) {
                Some(url) => url,
                None => return,
            };
            // Traversals and some cross-document navigations cannot be cancelled
            if !event.cancelable() {
                log::debug!("navigation to {} is not cancelable, letting it through", url);
                return;
            }
            if !filter(&url) {
                event.prevent_default();
            }
        }) as Box<dyn FnMut(Event)>);

        target
            .add_event_listener_with_callback("navigate", listener.as_ref().unchecked_ref())
            .map_err(|e| platform("navigate listener", e))?;

        Ok(Box::new(move || {
            let _ = target.remove_event_listener_with_callback("navigate", listener.as_ref().unchecked_ref());
            drop(listener);
        }))
    }

    fn capture_clicks(&self, filter: ClickFilter<Element>) -> Result<Teardown, HostError> {
        let listener = Closure::wrap(Box::new(move |event: Event| {
            let target = match event.target().and_then(|t| t.dyn_into::<Element>().ok()) {
                Some(target) => target,
                None => return,
            };
            if !filter(&target) {
                event.prevent_default();
                event.stop_propagation();
            }
        }) as Box<dyn FnMut(Event)>);

        self.document
            .add_event_listener_with_callback_and_bool("click", listener.as_ref().unchecked_ref(), true)
            .map_err(|e| platform("click listener", e))?;

        let document = self.document.clone();
        Ok(Box::new(move || {
            let _ = document.remove_event_listener_with_callback_and_bool(
                "click",
                listener.as_ref().unchecked_ref(),
                true,
            );
            drop(listener);
        }))
    }
}
