//! Host abstraction
//!
//! The engine never touches a concrete document. It talks to a [`Host`],
//! which bundles three capabilities:
//!
//! - [`Dom`]: read and detach elements of the live tree
//! - [`Scheduler`]: subtree observation and interval timers
//! - [`EntryPoints`]: wrap the imperative entry points that can trigger a
//!   network load or a navigation
//!
//! Every subscription or wrap hands back a [`Teardown`] that reverses it.
//! Hosts are single-threaded; callbacks are plain `'static` closures.

use std::rc::Rc;
use std::time::Duration;

use crate::types::{InterceptKind, MutationBatch};

/// Reverses one subscription or patch.
pub type Teardown = Box<dyn FnOnce()>;

/// Decides whether a navigation or popup target may proceed.
pub type UrlFilter = Rc<dyn Fn(&str) -> bool>;

/// Decides whether `(tag, attribute, value)` may be assigned.
pub type AttributeFilter = Rc<dyn Fn(&str, &str, &str) -> bool>;

/// Decides whether a click on the given node may proceed.
pub type ClickFilter<N> = Rc<dyn Fn(&N) -> bool>;

/// Error type for host operations.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The host has no way to hook this entry point. Nothing was patched.
    #[error("Entry point not supported by host: {}", .0.name())]
    Unsupported(InterceptKind),
    /// The document has no element to observe.
    #[error("Document has no observable root")]
    NoRoot,
    /// The underlying platform rejected the operation.
    #[error("Host operation failed: {0}")]
    Platform(String),
}

// =============================================================================
// Dom
// =============================================================================

/// Read/detach access to a document tree.
///
/// Accessors return `None`/`false` instead of failing: a node that vanished
/// or lacks an attribute is simply skipped by callers.
pub trait Dom {
    type Node: Clone + 'static;

    /// All element descendants of `root` (excluding `root`), in document order.
    fn elements_under(&self, root: &Self::Node) -> Vec<Self::Node>;

    /// Lower-cased tag name.
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    /// Attribute value, if present.
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Parent element, if any.
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Whether the node is still attached to the document.
    fn is_connected(&self, node: &Self::Node) -> bool;

    /// Detach the node from its parent. Returns `false` if it was not attached.
    fn detach(&self, node: &Self::Node) -> bool;
}

// =============================================================================
// Scheduler
// =============================================================================

/// Observation and timers.
pub trait Scheduler: Dom {
    /// Default root to observe and sweep (usually `document.body`).
    fn observed_root(&self) -> Option<Self::Node>;

    /// Observe `childList` + `subtree` mutations under `root`. The callback
    /// receives one coalesced batch per delivery.
    fn observe(
        &self,
        root: &Self::Node,
        callback: Box<dyn FnMut(MutationBatch)>,
    ) -> Result<Teardown, HostError>;

    /// Call `callback` every `period` until torn down.
    fn set_interval(&self, period: Duration, callback: Box<dyn FnMut()>) -> Result<Teardown, HostError>;
}

// =============================================================================
// Entry Points
// =============================================================================

/// Wrappable imperative entry points.
///
/// Each method captures the current implementation, installs a wrapper that
/// consults the filter first, and returns a teardown that puts the captured
/// implementation back.
pub trait EntryPoints: Dom {
    /// Guard `src` assignment on elements created after this call.
    fn wrap_element_creation(&self, filter: AttributeFilter) -> Result<Teardown, HostError>;

    /// Guard programmatic popups; a rejected target yields a null handle.
    fn wrap_window_open(&self, filter: UrlFilter) -> Result<Teardown, HostError>;

    /// Guard programmatic navigation; a rejected target is dropped.
    fn wrap_navigation(&self, filter: UrlFilter) -> Result<Teardown, HostError>;

    /// Capturing click listener; a rejected click has its default action
    /// prevented and its propagation stopped.
    fn capture_clicks(&self, filter: ClickFilter<Self::Node>) -> Result<Teardown, HostError>;
}

/// Everything the engine needs from its environment.
pub trait Host: Scheduler + EntryPoints + Clone + 'static {}

impl<T> Host for T where T: Scheduler + EntryPoints + Clone + 'static {}
