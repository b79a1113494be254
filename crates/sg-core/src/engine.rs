//! Engine Lifecycle
//!
//! [`ContentFilterEngine`] owns every moving part for the lifetime of a
//! page: the initial sweep, the interceptors, the mutation watcher and the
//! periodic reconciler. `start()` installs them; `stop()` tears them down in
//! the fixed order watcher, reconciler, interceptors (reverse install order).
//! Both are idempotent, and dropping a running engine stops it.

use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::host::{Host, HostError};
use crate::intercept::{interceptors_for, Interceptor, InterceptorHandle};
use crate::policy::{PolicyConfig, PolicyError, PolicyStore};
use crate::reconciler::{PeriodicReconciler, DEFAULT_SWEEP_INTERVAL};
use crate::sweeper::Sweeper;
use crate::types::{InterceptKind, SweepTargets};
use crate::watcher::MutationWatcher;

/// Error type for engine start-up.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

// =============================================================================
// Engine Config
// =============================================================================

/// Engine configuration, as loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub policy: PolicyConfig,
    pub sweep_interval_ms: u64,
    pub sweep_targets: SweepTargets,
    pub interceptors: InterceptKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL.as_millis() as u64,
            sweep_targets: SweepTargets::ALL,
            interceptors: InterceptKind::ALL,
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, PolicyError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, PolicyError> {
        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, PolicyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.sweep_interval_ms == 0 {
            return Err(PolicyError::InvalidInterval);
        }
        PolicyStore::from_config(&self.policy).map(|_| ())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

// =============================================================================
// Engine
// =============================================================================

/// What `start()` actually installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    /// Elements removed by the initial sweep
    pub initial_removed: usize,
    /// Interceptors now active
    pub installed: InterceptKind,
    /// Interceptors the host cannot support
    pub skipped: InterceptKind,
}

impl StartReport {
    /// Report for a call that installed nothing.
    pub fn nothing() -> Self {
        Self {
            initial_removed: 0,
            installed: InterceptKind::empty(),
            skipped: InterceptKind::empty(),
        }
    }
}

/// What `stop()` actually tore down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopReport {
    pub watcher_disconnected: bool,
    pub reconciler_cancelled: bool,
    pub interceptors_restored: usize,
}

impl StopReport {
    pub fn is_noop(&self) -> bool {
        !self.watcher_disconnected && !self.reconciler_cancelled && self.interceptors_restored == 0
    }
}

#[derive(Default)]
struct Running {
    watcher: Option<MutationWatcher>,
    reconciler: Option<PeriodicReconciler>,
    handles: Vec<InterceptorHandle>,
}

/// The content-filtering engine for one page.
pub struct ContentFilterEngine<H: Host> {
    host: H,
    classifier: Classifier,
    sweeper: Rc<Sweeper>,
    interceptors: Vec<Box<dyn Interceptor<H>>>,
    sweep_interval: Duration,
    running: Option<Running>,
}

impl<H: Host> ContentFilterEngine<H> {
    /// Engine with the built-in policy and defaults.
    pub fn new(host: H) -> Self {
        Self::with_policy(host, Rc::new(PolicyStore::default()), &EngineConfig::default())
    }

    /// Engine from a full configuration.
    pub fn from_config(host: H, config: &EngineConfig) -> Result<Self, EngineError> {
        if config.sweep_interval_ms == 0 {
            return Err(PolicyError::InvalidInterval.into());
        }
        let policy = PolicyStore::from_config(&config.policy)?;
        Ok(Self::with_policy(host, Rc::new(policy), config))
    }

    /// Engine over an already-built policy. The policy part of `config` is
    /// ignored.
    pub fn with_policy(host: H, policy: Rc<PolicyStore>, config: &EngineConfig) -> Self {
        let classifier = Classifier::new(policy);
        let sweeper = Rc::new(Sweeper::new(classifier.clone(), config.sweep_targets));
        let sweep_interval = if config.sweep_interval_ms == 0 {
            DEFAULT_SWEEP_INTERVAL
        } else {
            config.sweep_interval()
        };

        Self {
            host,
            classifier,
            sweeper,
            interceptors: interceptors_for(config.interceptors),
            sweep_interval,
            running: None,
        }
    }

    /// Replace the interceptor set. Takes effect on the next `start()`.
    pub fn set_interceptors(&mut self, interceptors: Vec<Box<dyn Interceptor<H>>>) {
        self.interceptors = interceptors;
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Interceptors currently installed.
    pub fn installed_interceptors(&self) -> InterceptKind {
        self.running
            .as_ref()
            .map(|r| {
                r.handles
                    .iter()
                    .filter(|h| h.is_active())
                    .fold(InterceptKind::empty(), |acc, h| acc | h.kind())
            })
            .unwrap_or_else(InterceptKind::empty)
    }

    /// One sweep of the observed root, outside the watcher/reconciler schedule.
    pub fn sweep_now(&self) -> usize {
        match self.host.observed_root() {
            Some(root) => self.sweeper.sweep(&self.host, &root),
            None => 0,
        }
    }

    /// Install everything. A second call while running is a no-op that
    /// returns an empty report.
    ///
    /// An interceptor the host reports as unsupported is skipped. Any other
    /// failure rolls back what was installed so far and returns the error.
    pub fn start(&mut self) -> Result<StartReport, EngineError> {
        if self.running.is_some() {
            log::debug!("engine already running");
            return Ok(StartReport::nothing());
        }

        let root = self.host.observed_root().ok_or(HostError::NoRoot)?;
        let mut running = Running::default();
        let mut report = StartReport {
            initial_removed: self.sweeper.sweep(&self.host, &root),
            ..StartReport::nothing()
        };

        for interceptor in &self.interceptors {
            let kind = interceptor.kind();
            if report.installed.intersects(kind) {
                continue;
            }
            match interceptor.install(&self.host, &self.classifier) {
                Ok(handle) => {
                    report.installed |= kind;
                    running.handles.push(handle);
                }
                Err(HostError::Unsupported(_)) => {
                    log::warn!("{} interception not supported by host, skipping", kind.name());
                    report.skipped |= kind;
                }
                Err(e) => {
                    log::warn!("failed to install {} interceptor: {}", kind.name(), e);
                    teardown(&mut running);
                    return Err(e.into());
                }
            }
        }

        match MutationWatcher::observe(&self.host, &root, self.sweeper.clone()) {
            Ok(watcher) => running.watcher = Some(watcher),
            Err(e) => {
                log::warn!("failed to observe document: {}", e);
                teardown(&mut running);
                return Err(e.into());
            }
        }

        match PeriodicReconciler::start(&self.host, &root, self.sweeper.clone(), self.sweep_interval) {
            Ok(reconciler) => running.reconciler = Some(reconciler),
            Err(e) => {
                log::warn!("failed to schedule reconciler: {}", e);
                teardown(&mut running);
                return Err(e.into());
            }
        }

        log::info!(
            "content filter started ({} interceptor(s), sweep every {:?})",
            running.handles.len(),
            self.sweep_interval
        );
        self.running = Some(running);
        Ok(report)
    }

    /// Tear everything down. Safe to call any number of times.
    pub fn stop(&mut self) -> StopReport {
        match self.running.take() {
            Some(mut running) => {
                let report = teardown(&mut running);
                log::info!("content filter stopped");
                report
            }
            None => StopReport::default(),
        }
    }
}

impl<H: Host> Drop for ContentFilterEngine<H> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Disconnect watcher, cancel reconciler, restore handles newest first.
fn teardown(running: &mut Running) -> StopReport {
    let mut report = StopReport::default();

    if let Some(watcher) = running.watcher.as_mut() {
        report.watcher_disconnected = watcher.disconnect();
    }
    if let Some(reconciler) = running.reconciler.as_mut() {
        report.reconciler_cancelled = reconciler.cancel();
    }
    for handle in running.handles.iter_mut().rev() {
        if handle.restore() {
            report.interceptors_restored += 1;
        }
    }

    report
}
