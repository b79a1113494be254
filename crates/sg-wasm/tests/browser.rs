#![cfg(target_arch = "wasm32")]

use std::cell::Cell;
use std::rc::Rc;

use js_sys::{Object, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::{Document, Element, Event, EventInit, EventTarget};

wasm_bindgen_test_configure!(run_in_browser);

fn window_open() -> JsValue {
    let window = web_sys::window().unwrap();
    Reflect::get(&window, &"open".into()).unwrap()
}

fn document() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

fn create_element() -> JsValue {
    Reflect::get(&document(), &"createElement".into()).unwrap()
}

fn element(tag: &str, attributes: &[(&str, &str)]) -> Element {
    let el = document().create_element(tag).unwrap();
    for (name, value) in attributes {
        el.set_attribute(name, value).unwrap();
    }
    el
}

fn cancelable_click() -> Event {
    let init = EventInit::new();
    init.set_bubbles(true);
    init.set_cancelable(true);
    Event::new_with_event_init_dict("click", &init).unwrap()
}

fn navigate_event(url: &str, cancelable: bool) -> Event {
    let init = EventInit::new();
    init.set_cancelable(cancelable);
    let event = Event::new_with_event_init_dict("navigate", &init).unwrap();
    let destination = Object::new();
    Reflect::set(&destination, &"url".into(), &url.into()).unwrap();
    Reflect::set(&event, &"destination".into(), &destination).unwrap();
    event
}

/// Resolve after the current task, so pending observer callbacks have run.
async fn next_task() {
    let promise = Promise::new(&mut |resolve, _reject| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, 0)
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

#[wasm_bindgen_test]
fn test_classify_exports() {
    assert_eq!(sg_wasm::classify("https://popads.net/x.js"), "block");
    assert_eq!(sg_wasm::classify("https://admaven.com/x.js"), "allow");
    assert_eq!(sg_wasm::extract_host_js("https://Ads.Example.com:8080/"), Some("Ads.Example.com".to_string()));

    let verdict = sg_wasm::explain("https://tracker.click/");
    let reason = Reflect::get(&verdict, &"reason".into()).unwrap();
    assert!(reason.as_string().unwrap().contains(".click"));
}

#[wasm_bindgen_test]
fn test_start_stop_restores_window_open() {
    let native = window_open();
    sg_wasm::start(None).unwrap();
    assert!(sg_wasm::is_running());
    assert!(!Object::is(&window_open(), &native));

    let window = web_sys::window().unwrap();
    assert!(window.open_with_url("https://popads.net/").unwrap().is_none());

    assert!(sg_wasm::stop());
    assert!(!sg_wasm::stop());
    assert!(Object::is(&window_open(), &native));
}

#[wasm_bindgen_test]
fn test_initial_sweep_removes_container() {
    let document = web_sys::window().unwrap().document().unwrap();
    let root = document.document_element().unwrap();
    let ad = document.create_element("div").unwrap();
    ad.set_attribute("class", "adsbygoogle").unwrap();
    root.append_child(&ad).unwrap();

    sg_wasm::start(None).unwrap();
    assert!(!ad.is_connected());
    sg_wasm::stop();
}

#[wasm_bindgen_test]
fn test_created_script_src_is_guarded() {
    let document = web_sys::window().unwrap().document().unwrap();
    sg_wasm::start(None).unwrap();

    let blocked = document.create_element("script").unwrap();
    blocked.set_attribute("src", "https://popads.net/x.js").unwrap();
    assert_eq!(blocked.get_attribute("src"), None);

    let allowed = document.create_element("script").unwrap();
    allowed.set_attribute("src", "https://admaven.com/x.js").unwrap();
    assert_eq!(allowed.get_attribute("src").as_deref(), Some("https://admaven.com/x.js"));

    sg_wasm::stop();
    let after = document.create_element("script").unwrap();
    after.set_attribute("src", "https://popads.net/x.js").unwrap();
    assert!(after.get_attribute("src").is_some());
}

#[wasm_bindgen_test]
fn test_created_script_src_property_is_guarded() {
    sg_wasm::start(None).unwrap();

    let blocked = document().create_element("script").unwrap();
    Reflect::set(&blocked, &"src".into(), &"https://popads.net/x.js".into()).unwrap();
    assert_eq!(blocked.get_attribute("src"), None);

    let allowed = document().create_element("script").unwrap();
    Reflect::set(&allowed, &"src".into(), &"https://admaven.com/x.js".into()).unwrap();
    assert_eq!(allowed.get_attribute("src").as_deref(), Some("https://admaven.com/x.js"));
    let read_back = Reflect::get(&allowed, &"src".into()).unwrap().as_string().unwrap();
    assert_eq!(read_back, "https://admaven.com/x.js");

    sg_wasm::stop();
}

#[wasm_bindgen_test]
fn test_created_iframe_player_keyword_override() {
    sg_wasm::start(None).unwrap();

    let player = document().create_element("iframe").unwrap();
    Reflect::set(&player, &"src".into(), &"https://cdn.top/embed/42".into()).unwrap();
    assert_eq!(player.get_attribute("src").as_deref(), Some("https://cdn.top/embed/42"));

    let ad = document().create_element("iframe").unwrap();
    Reflect::set(&ad, &"src".into(), &"https://cdn.top/ad".into()).unwrap();
    assert_eq!(ad.get_attribute("src"), None);
    ad.set_attribute("src", "https://cdn.top/ad").unwrap();
    assert_eq!(ad.get_attribute("src"), None);

    sg_wasm::stop();
}

#[wasm_bindgen_test]
fn test_stop_restores_create_element() {
    let native = create_element();
    sg_wasm::start(None).unwrap();
    assert!(!Object::is(&create_element(), &native));
    assert!(document().has_own_property(&"createElement".into()));

    sg_wasm::stop();
    assert!(Object::is(&create_element(), &native));
    assert!(!document().has_own_property(&"createElement".into()));
}

#[wasm_bindgen_test]
fn test_click_on_blocked_link_is_cancelled() {
    let root = document().document_element().unwrap();
    let bad = element("a", &[("href", "https://exoclick.com/click")]);
    let label = element("span", &[]);
    bad.append_child(&label).unwrap();
    let good = element("a", &[("href", "#sweepguard-click")]);
    root.append_child(&bad).unwrap();
    root.append_child(&good).unwrap();

    let reached = Rc::new(Cell::new(0u32));
    let counter = reached.clone();
    let on_link = Closure::wrap(Box::new(move |_event: Event| counter.set(counter.get() + 1)) as Box<dyn FnMut(Event)>);
    bad.add_event_listener_with_callback("click", on_link.as_ref().unchecked_ref()).unwrap();
    good.add_event_listener_with_callback("click", on_link.as_ref().unchecked_ref()).unwrap();

    sg_wasm::start(None).unwrap();

    // Cancelled in the capture phase: default prevented, link listener never runs
    assert!(!label.dispatch_event(&cancelable_click()).unwrap());
    assert_eq!(reached.get(), 0);

    assert!(good.dispatch_event(&cancelable_click()).unwrap());
    assert_eq!(reached.get(), 1);

    sg_wasm::stop();
    bad.remove();
    good.remove();
}

#[wasm_bindgen_test]
async fn test_observer_removes_inserted_iframe() {
    let root = document().document_element().unwrap();
    // data-src keeps the browser from fetching the ad host
    let frame = element("iframe", &[("data-src", "https://exoclick.com/ad")]);
    let late = element("iframe", &[("data-src", "https://exoclick.com/late")]);

    sg_wasm::start(None).unwrap();
    root.append_child(&frame).unwrap();
    assert!(frame.is_connected());
    next_task().await;
    assert!(!frame.is_connected());

    sg_wasm::stop();
    root.append_child(&late).unwrap();
    next_task().await;
    assert!(late.is_connected());
    late.remove();
}

#[wasm_bindgen_test]
fn test_navigate_listener_respects_cancelable() {
    let navigation = Reflect::get(&web_sys::window().unwrap(), &"navigation".into()).unwrap();
    if !navigation.is_object() {
        // No Navigation API: the interceptor is skipped
        return;
    }
    let navigation: EventTarget = navigation.unchecked_into();
    sg_wasm::start(None).unwrap();

    let blocked = navigate_event("https://clickadu.com/r", true);
    assert!(!navigation.dispatch_event(&blocked).unwrap());
    assert!(blocked.default_prevented());

    let traversal = navigate_event("https://clickadu.com/r", false);
    assert!(navigation.dispatch_event(&traversal).unwrap());
    assert!(!traversal.default_prevented());

    let allowed = navigate_event("https://example.com/", true);
    assert!(navigation.dispatch_event(&allowed).unwrap());

    sg_wasm::stop();
}
