//! In-memory page host
//!
//! [`MemoryPage`] models the parts of a browser page the engine interacts
//! with: an element tree with batched `childList` mutation delivery, a
//! virtual clock driving interval timers, and the four hookable entry points
//! (element creation with `src` assignment, `open`, `navigate`, and link
//! clicks). It backs headless embedding and every engine test.
//!
//! Mutation records are queued per observer and delivered only by
//! [`MemoryPage::flush_mutations`], mirroring the microtask delivery of a
//! real `MutationObserver`. Timers only fire from [`MemoryPage::advance`].

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::host::{
    AttributeFilter, ClickFilter, Dom, EntryPoints, HostError, Scheduler, Teardown, UrlFilter,
};
use crate::types::{InterceptKind, MutationBatch};

/// Handle of one element in a [`MemoryPage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Handle of a window opened through [`MemoryPage::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRef(pub usize);

/// What happened to a dispatched click.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickOutcome {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
    /// Link target followed by the default action
    pub navigated_to: Option<String>,
}

type CreateFn = Rc<dyn Fn(&MemoryPage, &str) -> NodeId>;
type OpenFn = Rc<dyn Fn(&MemoryPage, &str) -> Option<WindowRef>>;
type NavigateFn = Rc<dyn Fn(&MemoryPage, &str) -> bool>;
type SharedCallback<T> = Rc<RefCell<T>>;

#[derive(Clone)]
struct EntryImpls {
    create: CreateFn,
    open: OpenFn,
    navigate: NavigateFn,
}

impl EntryImpls {
    fn native() -> Self {
        Self {
            create: Rc::new(native_create),
            open: Rc::new(native_open),
            navigate: Rc::new(native_navigate),
        }
    }
}

struct NodeData {
    tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    src_guard: Option<AttributeFilter>,
}

struct ObserverSlot {
    id: u64,
    root: NodeId,
    pending: MutationBatch,
    callback: SharedCallback<Box<dyn FnMut(MutationBatch)>>,
}

struct TimerSlot {
    id: u64,
    period: Duration,
    next_due: Duration,
    callback: SharedCallback<Box<dyn FnMut()>>,
}

struct ClickListener {
    id: u64,
    filter: ClickFilter<NodeId>,
}

struct PageState {
    nodes: Vec<NodeData>,
    document_element: NodeId,
    body: NodeId,
    observers: Vec<ObserverSlot>,
    timers: Vec<TimerSlot>,
    click_listeners: Vec<ClickListener>,
    next_id: u64,
    now: Duration,
    entry: EntryImpls,
    native: EntryImpls,
    unsupported: InterceptKind,
    rejected: InterceptKind,
    opened: Vec<String>,
    location: String,
    history: Vec<String>,
}

impl PageState {
    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).and_then(|n| n.parent);
        }
        false
    }

    /// Queue a childList record on every observer whose root contains `target`.
    fn record(&mut self, target: NodeId, added: usize, removed: usize) {
        let roots: Vec<(usize, NodeId)> = self
            .observers
            .iter()
            .enumerate()
            .map(|(i, o)| (i, o.root))
            .collect();
        for (i, root) in roots {
            if self.is_inclusive_ancestor(root, target) {
                let pending = &mut self.observers[i].pending;
                pending.records += 1;
                pending.added += added;
                pending.removed += removed;
            }
        }
    }

    fn check_entry_point(&self, kind: InterceptKind) -> Result<(), HostError> {
        if self.unsupported.intersects(kind) {
            return Err(HostError::Unsupported(kind));
        }
        if self.rejected.intersects(kind) {
            return Err(HostError::Platform(format!("page rejected {} hook", kind.name())));
        }
        Ok(())
    }
}

/// A single-threaded in-memory page. Cloning yields another handle to the
/// same page.
#[derive(Clone)]
pub struct MemoryPage {
    state: Rc<RefCell<PageState>>,
}

impl MemoryPage {
    /// A page containing `<html><body></body></html>` at `about:blank`.
    pub fn new() -> Self {
        let html = NodeData {
            tag: "html".to_string(),
            attributes: Vec::new(),
            parent: None,
            children: vec![NodeId(1)],
            src_guard: None,
        };
        let body = NodeData {
            tag: "body".to_string(),
            attributes: Vec::new(),
            parent: Some(NodeId(0)),
            children: Vec::new(),
            src_guard: None,
        };
        let native = EntryImpls::native();

        Self {
            state: Rc::new(RefCell::new(PageState {
                nodes: vec![html, body],
                document_element: NodeId(0),
                body: NodeId(1),
                observers: Vec::new(),
                timers: Vec::new(),
                click_listeners: Vec::new(),
                next_id: 0,
                now: Duration::ZERO,
                entry: native.clone(),
                native,
                unsupported: InterceptKind::empty(),
                rejected: InterceptKind::empty(),
                opened: Vec::new(),
                location: "about:blank".to_string(),
                history: Vec::new(),
            })),
        }
    }

    /// Pretend the page has no hookable implementation of these entry points.
    pub fn set_unsupported(&self, kinds: InterceptKind) {
        self.state.borrow_mut().unsupported = kinds;
    }

    /// Make hooking these entry points fail with a platform error.
    pub fn set_rejected(&self, kinds: InterceptKind) {
        self.state.borrow_mut().rejected = kinds;
    }

    pub fn document_element(&self) -> NodeId {
        self.state.borrow().document_element
    }

    pub fn body(&self) -> NodeId {
        self.state.borrow().body
    }

    // -------------------------------------------------------------------------
    // Tree construction
    // -------------------------------------------------------------------------

    /// Create a detached element bypassing any hooks, as the HTML parser does.
    pub fn parse_element(&self, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let id = self.new_node(tag);
        let mut state = self.state.borrow_mut();
        if let Some(node) = state.nodes.get_mut(id.0) {
            for (name, value) in attributes {
                node.attributes.push((name.to_ascii_lowercase(), value.to_string()));
            }
        }
        id
    }

    /// Parse an element with attributes and insert it as the last child of `parent`.
    pub fn append(&self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let id = self.parse_element(tag, attributes);
        self.append_child(parent, id);
        id
    }

    /// Insert `child` as the last child of `parent`, moving it if attached.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> bool {
        let mut state = self.state.borrow_mut();
        if state.node(parent).is_none() || state.node(child).is_none() {
            return false;
        }
        // No cycles
        if state.is_inclusive_ancestor(child, parent) {
            return false;
        }

        if let Some(old_parent) = state.nodes[child.0].parent {
            state.record(old_parent, 0, 1);
            state.nodes[old_parent.0].children.retain(|c| *c != child);
        }

        state.nodes[child.0].parent = Some(parent);
        state.nodes[parent.0].children.push(child);
        state.record(parent, 1, 0);
        true
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.state
            .borrow()
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn new_node(&self, tag: &str) -> NodeId {
        let mut state = self.state.borrow_mut();
        let id = NodeId(state.nodes.len());
        state.nodes.push(NodeData {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
            src_guard: None,
        });
        id
    }

    // -------------------------------------------------------------------------
    // Scripted entry points
    // -------------------------------------------------------------------------

    /// `document.createElement(tag)` through the current (possibly wrapped)
    /// implementation.
    pub fn create_element(&self, tag: &str) -> NodeId {
        let create = self.state.borrow().entry.create.clone();
        create(self, tag)
    }

    /// `element.setAttribute(name, value)`. Returns `false` if a guard
    /// installed at creation time dropped the assignment.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> bool {
        let (tag, guard) = match self.state.borrow().node(node) {
            Some(data) => (data.tag.clone(), data.src_guard.clone()),
            None => return false,
        };

        let name = name.to_ascii_lowercase();
        if let Some(guard) = guard {
            if !guard(&tag, &name, value) {
                return false;
            }
        }

        let mut state = self.state.borrow_mut();
        let attributes = &mut state.nodes[node.0].attributes;
        match attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => attributes.push((name, value.to_string())),
        }
        true
    }

    /// `window.open(url)` through the current implementation.
    pub fn open(&self, url: &str) -> Option<WindowRef> {
        let open = self.state.borrow().entry.open.clone();
        open(self, url)
    }

    /// `location.href = url` through the current implementation. Returns
    /// whether the page navigated.
    pub fn navigate(&self, url: &str) -> bool {
        let navigate = self.state.borrow().entry.navigate.clone();
        navigate(self, url)
    }

    /// Dispatch a click on `target`: capturing listeners first, then the
    /// default action of the nearest enclosing link.
    pub fn click(&self, target: NodeId) -> ClickOutcome {
        let filters: Vec<ClickFilter<NodeId>> = self
            .state
            .borrow()
            .click_listeners
            .iter()
            .map(|l| l.filter.clone())
            .collect();

        for filter in filters {
            if !filter(&target) {
                return ClickOutcome {
                    default_prevented: true,
                    propagation_stopped: true,
                    navigated_to: None,
                };
            }
        }

        let href = self.closest_link(target);
        if let Some(href) = &href {
            let mut state = self.state.borrow_mut();
            state.location = href.clone();
            state.history.push(href.clone());
        }

        ClickOutcome {
            navigated_to: href,
            ..ClickOutcome::default()
        }
    }

    /// `href` of the nearest `<a href>` enclosing `node` (inclusive).
    pub fn closest_link(&self, node: NodeId) -> Option<String> {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.tag_name(&id).as_deref() == Some("a") {
                if let Some(href) = self.attribute(&id, "href") {
                    return Some(href);
                }
            }
            current = self.parent(&id);
        }
        None
    }

    // -------------------------------------------------------------------------
    // Event loop
    // -------------------------------------------------------------------------

    /// Deliver pending mutation batches, one callback per observer.
    /// Returns the number of callbacks invoked.
    pub fn flush_mutations(&self) -> usize {
        let deliveries: Vec<(u64, MutationBatch, SharedCallback<Box<dyn FnMut(MutationBatch)>>)> = {
            let mut state = self.state.borrow_mut();
            state
                .observers
                .iter_mut()
                .filter(|o| !o.pending.is_empty())
                .map(|o| (o.id, std::mem::take(&mut o.pending), o.callback.clone()))
                .collect()
        };

        let mut delivered = 0usize;
        for (id, batch, callback) in deliveries {
            // Disconnected by an earlier callback in this flush
            if !self.state.borrow().observers.iter().any(|o| o.id == id) {
                continue;
            }
            (&mut *callback.borrow_mut())(batch);
            delivered += 1;
        }
        delivered
    }

    /// Move the virtual clock forward, firing due timers in order.
    /// Returns the number of timer callbacks invoked.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.borrow().now + by;
        let mut fired = 0usize;

        loop {
            let callback = {
                let mut state = self.state.borrow_mut();
                let next = state
                    .timers
                    .iter_mut()
                    .filter(|t| t.next_due <= target)
                    .min_by_key(|t| t.next_due);
                let (due, callback) = match next {
                    Some(timer) => {
                        let due = timer.next_due;
                        timer.next_due += timer.period;
                        (due, timer.callback.clone())
                    }
                    None => break,
                };
                state.now = due;
                callback
            };
            (&mut *callback.borrow_mut())();
            fired += 1;
        }

        self.state.borrow_mut().now = target;
        fired
    }

    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn active_observers(&self) -> usize {
        self.state.borrow().observers.len()
    }

    pub fn active_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    pub fn click_listeners(&self) -> usize {
        self.state.borrow().click_listeners.len()
    }

    /// URLs of every window actually opened.
    pub fn opened_windows(&self) -> Vec<String> {
        self.state.borrow().opened.clone()
    }

    pub fn location(&self) -> String {
        self.state.borrow().location.clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.state.borrow().history.clone()
    }

    /// Whether every entry point runs its native implementation and no
    /// click listener is attached.
    pub fn entry_points_pristine(&self) -> bool {
        let state = self.state.borrow();
        Rc::ptr_eq(&state.entry.create, &state.native.create)
            && Rc::ptr_eq(&state.entry.open, &state.native.open)
            && Rc::ptr_eq(&state.entry.navigate, &state.native.navigate)
            && state.click_listeners.is_empty()
    }

    fn remove_observer(&self, id: u64) {
        self.state.borrow_mut().observers.retain(|o| o.id != id);
    }

    fn remove_timer(&self, id: u64) {
        self.state.borrow_mut().timers.retain(|t| t.id != id);
    }

    fn remove_click_listener(&self, id: u64) {
        self.state.borrow_mut().click_listeners.retain(|l| l.id != id);
    }

    fn guard_node(&self, node: NodeId, filter: AttributeFilter) {
        if let Some(data) = self.state.borrow_mut().nodes.get_mut(node.0) {
            data.src_guard = Some(filter);
        }
    }
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

fn native_create(page: &MemoryPage, tag: &str) -> NodeId {
    page.new_node(tag)
}

fn native_open(page: &MemoryPage, url: &str) -> Option<WindowRef> {
    let mut state = page.state.borrow_mut();
    state.opened.push(url.to_string());
    Some(WindowRef(state.opened.len() - 1))
}

fn native_navigate(page: &MemoryPage, url: &str) -> bool {
    let mut state = page.state.borrow_mut();
    state.location = url.to_string();
    state.history.push(url.to_string());
    true
}

// =============================================================================
// Host capabilities
// =============================================================================

impl Dom for MemoryPage {
    type Node = NodeId;

    fn elements_under(&self, root: &NodeId) -> Vec<NodeId> {
        let state = self.state.borrow();
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match state.node(*root) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };

        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = state.node(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        self.state.borrow().node(*node).map(|n| n.tag.clone())
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        let state = self.state.borrow();
        state.node(*node).and_then(|n| {
            n.attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        })
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.state.borrow().node(*node).and_then(|n| n.parent)
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        let state = self.state.borrow();
        let root = state.document_element;
        state.node(*node).is_some() && state.is_inclusive_ancestor(root, *node)
    }

    fn detach(&self, node: &NodeId) -> bool {
        let mut state = self.state.borrow_mut();
        let parent = match state.node(*node).and_then(|n| n.parent) {
            Some(parent) => parent,
            None => return false,
        };

        state.record(parent, 0, 1);
        state.nodes[parent.0].children.retain(|c| c != node);
        state.nodes[node.0].parent = None;
        true
    }
}

impl Scheduler for MemoryPage {
    fn observed_root(&self) -> Option<NodeId> {
        Some(self.body())
    }

    fn observe(
        &self,
        root: &NodeId,
        callback: Box<dyn FnMut(MutationBatch)>,
    ) -> Result<Teardown, HostError> {
        let id = {
            let mut state = self.state.borrow_mut();
            if state.node(*root).is_none() {
                return Err(HostError::NoRoot);
            }
            let id = state.alloc_id();
            state.observers.push(ObserverSlot {
                id,
                root: *root,
                pending: MutationBatch::default(),
                callback: Rc::new(RefCell::new(callback)),
            });
            id
        };

        let page = self.clone();
        Ok(Box::new(move || page.remove_observer(id)))
    }

    fn set_interval(&self, period: Duration, callback: Box<dyn FnMut()>) -> Result<Teardown, HostError> {
        if period.is_zero() {
            return Err(HostError::Platform("interval period must be non-zero".to_string()));
        }

        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.alloc_id();
            let next_due = state.now + period;
            state.timers.push(TimerSlot {
                id,
                period,
                next_due,
                callback: Rc::new(RefCell::new(callback)),
            });
            id
        };

        let page = self.clone();
        Ok(Box::new(move || page.remove_timer(id)))
    }
}

impl EntryPoints for MemoryPage {
    fn wrap_element_creation(&self, filter: AttributeFilter) -> Result<Teardown, HostError> {
        let mut state = self.state.borrow_mut();
        state.check_entry_point(InterceptKind::CREATE_ELEMENT)?;

        let original = state.entry.create.clone();
        let inner = original.clone();
        state.entry.create = Rc::new(move |page: &MemoryPage, tag: &str| {
            let id = inner(page, tag);
            if tag.eq_ignore_ascii_case("script") || tag.eq_ignore_ascii_case("iframe") {
                page.guard_node(id, filter.clone());
            }
            id
        });

        let page = self.clone();
        Ok(Box::new(move || page.state.borrow_mut().entry.create = original))
    }

    fn wrap_window_open(&self, filter: UrlFilter) -> Result<Teardown, HostError> {
        let mut state = self.state.borrow_mut();
        state.check_entry_point(InterceptKind::WINDOW_OPEN)?;

        let original = state.entry.open.clone();
        let inner = original.clone();
        state.entry.open = Rc::new(move |page: &MemoryPage, url: &str| {
            if filter(url) {
                inner(page, url)
            } else {
                None
            }
        });

        let page = self.clone();
        Ok(Box::new(move || page.state.borrow_mut().entry.open = original))
    }

    fn wrap_navigation(&self, filter: UrlFilter) -> Result<Teardown, HostError> {
        let mut state = self.state.borrow_mut();
        state.check_entry_point(InterceptKind::NAVIGATION)?;

        let original = state.entry.navigate.clone();
        let inner = original.clone();
        state.entry.navigate = Rc::new(move |page: &MemoryPage, url: &str| {
            if filter(url) {
                inner(page, url)
            } else {
                false
            }
        });

        let page = self.clone();
        Ok(Box::new(move || page.state.borrow_mut().entry.navigate = original))
    }

    fn capture_clicks(&self, filter: ClickFilter<NodeId>) -> Result<Teardown, HostError> {
        let mut state = self.state.borrow_mut();
        state.check_entry_point(InterceptKind::CLICK)?;

        let id = state.alloc_id();
        state.click_listeners.push(ClickListener { id, filter });

        let page = self.clone();
        Ok(Box::new(move || page.remove_click_listener(id)))
    }
}
