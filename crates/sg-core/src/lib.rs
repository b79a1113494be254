//! SweepGuard Core Library
//!
//! Client-side content filtering for a single page: a URL classifier over an
//! immutable policy, a DOM sweeper that detaches ad elements, and an engine
//! that keeps the page clean through a mutation watcher, a periodic
//! reconciler and four reversible API interceptors.
//!
//! # Architecture
//!
//! Everything page-facing goes through the [`host::Host`] capability traits,
//! so the same engine drives the in-memory [`page::MemoryPage`] (headless use
//! and tests) and the browser host in `sg-wasm`. All state is single-threaded.
//!
//! # Modules
//!
//! - `policy`: allow/block lists, heuristics, selectors, filter-list parsing
//! - `url`: host extraction without allocations
//! - `classifier`: URL → Allow/Block with reason
//! - `sweeper`: one idempotent pass over a subtree
//! - `watcher` / `reconciler`: mutation-driven and timed sweeps
//! - `intercept`: element creation, popup, navigation and click guards
//! - `engine`: start/stop lifecycle and configuration
//! - `host` / `page`: host capabilities and the in-memory page
//! - `types`: shared type definitions

pub mod classifier;
pub mod engine;
pub mod host;
pub mod intercept;
pub mod page;
pub mod policy;
pub mod reconciler;
pub mod sweeper;
pub mod types;
pub mod url;
pub mod watcher;

// Re-export commonly used types
pub use classifier::Classifier;
pub use engine::{ContentFilterEngine, EngineConfig, EngineError, StartReport, StopReport};
pub use host::{Dom, EntryPoints, Host, HostError, Scheduler, Teardown};
pub use intercept::{Interceptor, InterceptorHandle};
pub use page::MemoryPage;
pub use policy::{PolicyConfig, PolicyError, PolicyStore};
pub use sweeper::Sweeper;
pub use types::{Classification, InterceptKind, MutationBatch, Reason, SweepTargets, Verdict};
