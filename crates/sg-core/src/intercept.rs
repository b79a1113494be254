//! API Interceptors
//!
//! Each interceptor wraps exactly one host entry point with a classifier
//! check and hands back an [`InterceptorHandle`] that undoes the wrap. The
//! policy decisions live here; the mechanics of wrapping live in the host.

use std::rc::Rc;

use crate::classifier::Classifier;
use crate::host::{AttributeFilter, ClickFilter, Host, HostError, Teardown, UrlFilter};
use crate::types::InterceptKind;

// =============================================================================
// Handle
// =============================================================================

/// One installed interception. Restoring is idempotent.
pub struct InterceptorHandle {
    kind: InterceptKind,
    teardown: Option<Teardown>,
}

impl InterceptorHandle {
    pub fn new(kind: InterceptKind, teardown: Teardown) -> Self {
        Self {
            kind,
            teardown: Some(teardown),
        }
    }

    pub fn kind(&self) -> InterceptKind {
        self.kind
    }

    /// Whether the wrapped entry point is still patched.
    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }

    /// Put the original entry point back. Returns `false` if already restored.
    pub fn restore(&mut self) -> bool {
        match self.teardown.take() {
            Some(teardown) => {
                teardown();
                log::debug!("restored {} entry point", self.kind.name());
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for InterceptorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorHandle")
            .field("kind", &self.kind)
            .field("active", &self.is_active())
            .finish()
    }
}

// =============================================================================
// Interceptor trait
// =============================================================================

/// A reversible wrapper around one host entry point.
pub trait Interceptor<H: Host> {
    fn kind(&self) -> InterceptKind;

    fn install(&self, host: &H, classifier: &Classifier) -> Result<InterceptorHandle, HostError>;
}

/// Guards `src` on script/iframe elements created through the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateElementInterceptor;

/// Returns a null handle for blocked popups.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowOpenInterceptor;

/// Drops navigation to blocked targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigationInterceptor;

/// Cancels clicks on links to blocked targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickInterceptor;

impl<H: Host> Interceptor<H> for CreateElementInterceptor {
    fn kind(&self) -> InterceptKind {
        InterceptKind::CREATE_ELEMENT
    }

    fn install(&self, host: &H, classifier: &Classifier) -> Result<InterceptorHandle, HostError> {
        let teardown = host.wrap_element_creation(src_filter(classifier.clone()))?;
        Ok(InterceptorHandle::new(InterceptKind::CREATE_ELEMENT, teardown))
    }
}

impl<H: Host> Interceptor<H> for WindowOpenInterceptor {
    fn kind(&self) -> InterceptKind {
        InterceptKind::WINDOW_OPEN
    }

    fn install(&self, host: &H, classifier: &Classifier) -> Result<InterceptorHandle, HostError> {
        let teardown = host.wrap_window_open(url_filter(classifier.clone(), "popup"))?;
        Ok(InterceptorHandle::new(InterceptKind::WINDOW_OPEN, teardown))
    }
}

impl<H: Host> Interceptor<H> for NavigationInterceptor {
    fn kind(&self) -> InterceptKind {
        InterceptKind::NAVIGATION
    }

    fn install(&self, host: &H, classifier: &Classifier) -> Result<InterceptorHandle, HostError> {
        let teardown = host.wrap_navigation(url_filter(classifier.clone(), "navigation"))?;
        Ok(InterceptorHandle::new(InterceptKind::NAVIGATION, teardown))
    }
}

impl<H: Host> Interceptor<H> for ClickInterceptor {
    fn kind(&self) -> InterceptKind {
        InterceptKind::CLICK
    }

    fn install(&self, host: &H, classifier: &Classifier) -> Result<InterceptorHandle, HostError> {
        let teardown = host.capture_clicks(click_filter(host.clone(), classifier.clone()))?;
        Ok(InterceptorHandle::new(InterceptKind::CLICK, teardown))
    }
}

/// Interceptors for `kinds`, in install order: creation, open, navigation, click.
pub fn interceptors_for<H: Host>(kinds: InterceptKind) -> Vec<Box<dyn Interceptor<H>>> {
    let mut out: Vec<Box<dyn Interceptor<H>>> = Vec::new();
    if kinds.contains(InterceptKind::CREATE_ELEMENT) {
        out.push(Box::new(CreateElementInterceptor));
    }
    if kinds.contains(InterceptKind::WINDOW_OPEN) {
        out.push(Box::new(WindowOpenInterceptor));
    }
    if kinds.contains(InterceptKind::NAVIGATION) {
        out.push(Box::new(NavigationInterceptor));
    }
    if kinds.contains(InterceptKind::CLICK) {
        out.push(Box::new(ClickInterceptor));
    }
    out
}

// =============================================================================
// Filters
// =============================================================================

/// Allow-decision for a `src` assignment on a freshly created element.
pub fn allows_src(classifier: &Classifier, tag: &str, attribute: &str, value: &str) -> bool {
    if !attribute.eq_ignore_ascii_case("src") {
        return true;
    }

    let is_iframe = tag.eq_ignore_ascii_case("iframe");
    if !is_iframe && !tag.eq_ignore_ascii_case("script") {
        return true;
    }

    if is_iframe && classifier.policy().is_player_embed(&[value]) {
        return true;
    }

    if classifier.should_block(value) {
        log::debug!("suppressed {} src: {}", tag, value);
        return false;
    }
    true
}

fn src_filter(classifier: Classifier) -> AttributeFilter {
    Rc::new(move |tag: &str, attribute: &str, value: &str| {
        allows_src(&classifier, tag, attribute, value)
    })
}

fn url_filter(classifier: Classifier, what: &'static str) -> UrlFilter {
    Rc::new(move |url: &str| {
        if classifier.should_block(url) {
            log::debug!("suppressed {}: {}", what, url);
            false
        } else {
            true
        }
    })
}

/// Allow-decision for a click: classify the nearest enclosing link.
pub fn allows_click<H: Host>(host: &H, classifier: &Classifier, target: &H::Node) -> bool {
    let mut current = Some(target.clone());
    while let Some(node) = current {
        if host.tag_name(&node).as_deref() == Some("a") {
            if let Some(href) = host.attribute(&node, "href") {
                if classifier.should_block(&href) {
                    log::debug!("suppressed click to {}", href);
                    return false;
                }
                return true;
            }
        }
        current = host.parent(&node);
    }
    true
}

fn click_filter<H: Host>(host: H, classifier: Classifier) -> ClickFilter<H::Node> {
    Rc::new(move |target: &H::Node| allows_click(&host, &classifier, target))
}
